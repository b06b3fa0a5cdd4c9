pub mod constants;
pub mod filename;
pub mod progress;

pub use constants::*;
pub use filename::{default_sidecar_path, format_timestamp, parse_timestamp, timestamp_from_filename};
pub use progress::ProgressReporter;
