mod act_fn;
mod relu;
mod sigmoid;

pub use act_fn::ActFn;
pub use relu::{LeakyRelu, Relu};
pub use sigmoid::Sigmoid;
