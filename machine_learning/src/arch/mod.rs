pub mod activations;
pub mod layers;
pub mod loss;
mod model;
mod regularization;
mod sequential;

pub use model::Model;
pub use regularization::Regularization;
pub use sequential::Sequential;
