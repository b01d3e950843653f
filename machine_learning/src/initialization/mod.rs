mod chained;
mod constant;
mod init;
mod param_gen;
mod random;

pub use chained::ChainedParamGen;
pub use constant::ConstParamGen;
pub use init::{Init, init_dense_params};
pub use param_gen::ParamGen;
pub use random::RandParamGen;
