pub mod features;
pub mod normalize;
pub mod table;

pub use features::{FeatureSelection, POSITIVE_PREFIX, STATE_COLUMNS};
pub use normalize::Standardizer;
pub use table::CovidTable;
