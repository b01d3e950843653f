/// Rectified linear unit, `max(0, z)`.
#[derive(Clone, Debug, Default)]
pub struct Relu;

impl Relu {
    pub fn f(&self, z: f32) -> f32 {
        z.max(0.)
    }

    pub fn df(&self, z: f32) -> f32 {
        if z > 0. { 1. } else { 0. }
    }
}

/// A rectifier that lets a small `slope` of the negative half through.
#[derive(Clone, Debug, Default)]
pub struct LeakyRelu {
    slope: f32,
}

impl LeakyRelu {
    pub fn new(slope: f32) -> Self {
        Self { slope }
    }

    pub fn f(&self, z: f32) -> f32 {
        if z > 0. { z } else { self.slope * z }
    }

    pub fn df(&self, z: f32) -> f32 {
        if z > 0. { 1. } else { self.slope }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_clamps_negatives() {
        assert_eq!(Relu.f(-3.), 0.);
        assert_eq!(Relu.f(2.5), 2.5);
        assert_eq!(Relu.df(-1.), 0.);
        assert_eq!(Relu.df(1.), 1.);
    }

    #[test]
    fn leaky_relu_keeps_slope() {
        let act = LeakyRelu::new(0.1);
        assert_eq!(act.f(-2.), -0.2);
        assert_eq!(act.df(-2.), 0.1);
        assert_eq!(act.f(3.), 3.);
    }
}
