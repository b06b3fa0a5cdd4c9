pub mod manager;

pub use manager::{DatasetManager, DatasetSummary};
