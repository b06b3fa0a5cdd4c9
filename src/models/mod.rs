pub mod dataset_config;
pub mod frame;
pub mod kind;
pub mod matrix;
pub mod metadata;
pub mod model;

pub use dataset_config::{Cadence, DatasetConfig, Geometry, GridResolution, ResolvedConfig};
pub use frame::{Dataset, Feature, FeatureSet, GridFrame, GridLayer};
pub use kind::{Layout, ModelKind};
pub use matrix::Matrix;
pub use metadata::DatasetMetadata;
pub use model::{Model, ModelOptions};
