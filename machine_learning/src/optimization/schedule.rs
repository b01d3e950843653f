use std::f32::consts::PI;

/// Scales the base learning rate of an optimizer as training advances.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum LrSchedule {
    /// The learning rate never changes.
    #[default]
    Constant,
    /// Linear warmup from 0 to the base learning rate during `warmup_steps`, then a cosine decay
    /// towards 0 at `total_steps`. `cycles` is the amount of cosine waves over the decay, 0.5
    /// being a single half-wave.
    CosineWarmup {
        warmup_steps: usize,
        total_steps: usize,
        cycles: f32,
    },
}

impl LrSchedule {
    /// The multiplier applied to the base learning rate at `step` (zero based).
    pub fn factor(&self, step: usize) -> f32 {
        match *self {
            Self::Constant => 1.,
            Self::CosineWarmup {
                warmup_steps,
                total_steps,
                cycles,
            } => {
                if step < warmup_steps {
                    return step as f32 / warmup_steps.max(1) as f32;
                }

                let progress = (step - warmup_steps) as f32
                    / total_steps.saturating_sub(warmup_steps).max(1) as f32;

                (0.5 * (1. + (PI * cycles * 2. * progress).cos())).max(0.)
            }
        }
    }
}
