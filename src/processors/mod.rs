pub mod audit;
pub mod bbox;
pub mod statistics;
pub mod timeline;
pub mod transform;

pub use audit::{AuditChecker, AuditFinding, AuditReport, FindingType};
pub use bbox::BoundingBox;
pub use statistics::{StatisticsCollector, SummaryStats};
pub use transform::ColumnTransform;
