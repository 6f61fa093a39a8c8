pub mod fields;
pub mod types;

pub use fields::SnapshotField;
pub use types::*;
