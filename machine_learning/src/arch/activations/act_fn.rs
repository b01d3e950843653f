use super::{LeakyRelu, Relu, Sigmoid};

/// An activation function applied element-wise after a layer's affine transformation.
#[derive(Clone, Debug)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Relu(Relu),
    LeakyRelu(LeakyRelu),
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid(Sigmoid::new(amp))
    }

    pub fn relu() -> Self {
        Self::Relu(Relu)
    }

    pub fn leaky_relu(slope: f32) -> Self {
        Self::LeakyRelu(LeakyRelu::new(slope))
    }

    pub fn f(&self, z: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.f(z),
            Self::Relu(a) => a.f(z),
            Self::LeakyRelu(a) => a.f(z),
        }
    }

    pub fn df(&self, z: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.df(z),
            Self::Relu(a) => a.df(z),
            Self::LeakyRelu(a) => a.df(z),
        }
    }
}
