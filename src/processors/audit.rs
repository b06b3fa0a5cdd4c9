use crate::catalog::DatasetManager;
use crate::error::Result;
use crate::store::DocumentStore;
use crate::utils::constants::METADATA_COLLECTION;
use bson::Bson;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FindingType {
    /// Metadata entry with no data collection
    OrphanedMetadata,
    /// Coordinate index with no data collection
    OrphanedCoordIndex,
    /// Data collection with no metadata entry
    MissingMetadata,
    /// Gridded dataset with no coordinate index
    MissingCoordIndex,
}

impl fmt::Display for FindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FindingType::OrphanedMetadata => "orphaned metadata",
            FindingType::OrphanedCoordIndex => "orphaned coordinate index",
            FindingType::MissingMetadata => "missing metadata",
            FindingType::MissingCoordIndex => "missing coordinate index",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditFinding {
    pub dataset: String,
    pub finding_type: FindingType,
    pub details: String,
}

#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub datasets: usize,
    pub metadata_entries: usize,
    pub coord_indexes: usize,
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn findings_of(&self, finding_type: FindingType) -> Vec<&AuditFinding> {
        self.findings
            .iter()
            .filter(|f| f.finding_type == finding_type)
            .collect()
    }
}

/// Cross-checks data collections against metadata and coordinate indexes.
pub struct AuditChecker {
    store: Arc<dyn DocumentStore>,
    manager: DatasetManager,
}

impl AuditChecker {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            manager: DatasetManager::new(store.clone()),
            store,
        }
    }

    pub async fn audit(&self) -> Result<AuditReport> {
        let datasets: BTreeSet<String> = self.manager.datasets().await?.into_iter().collect();
        let metadata: BTreeSet<String> = self.manager.metadata_ids().await?.into_iter().collect();
        let coord_indexes: BTreeSet<String> =
            self.manager.coord_index_ids().await?.into_iter().collect();

        let mut report = AuditReport {
            datasets: datasets.len(),
            metadata_entries: metadata.len(),
            coord_indexes: coord_indexes.len(),
            findings: Vec::new(),
        };

        for name in metadata.difference(&datasets) {
            report.findings.push(AuditFinding {
                dataset: name.clone(),
                finding_type: FindingType::OrphanedMetadata,
                details: "metadata entry has no data collection".to_string(),
            });
        }

        for name in coord_indexes.difference(&datasets) {
            report.findings.push(AuditFinding {
                dataset: name.clone(),
                finding_type: FindingType::OrphanedCoordIndex,
                details: "coordinate index has no data collection".to_string(),
            });
        }

        for name in &datasets {
            if !metadata.contains(name) {
                report.findings.push(AuditFinding {
                    dataset: name.clone(),
                    finding_type: FindingType::MissingMetadata,
                    details: "data collection has no metadata entry".to_string(),
                });
                continue;
            }

            let gridded = self
                .store
                .find_by_id(METADATA_COLLECTION, &Bson::String(name.clone()))
                .await?
                .and_then(|m| m.get_bool("gridded").ok())
                .unwrap_or(false);
            if gridded && !coord_indexes.contains(name) {
                report.findings.push(AuditFinding {
                    dataset: name.clone(),
                    finding_type: FindingType::MissingCoordIndex,
                    details: "gridded dataset has no coordinate index".to_string(),
                });
            }
        }

        debug!("Audit found {} problems", report.findings.len());
        Ok(report)
    }

    /// Generate a summary report
    pub fn generate_summary(&self, report: &AuditReport) -> String {
        let mut summary = String::new();

        summary.push_str("=== Dataset Audit Report ===\n");
        summary.push_str(&format!("Data Collections: {}\n", report.datasets));
        summary.push_str(&format!("Metadata Entries: {}\n", report.metadata_entries));
        summary.push_str(&format!("Coordinate Indexes: {}\n", report.coord_indexes));
        summary.push_str(&format!("\nProblems Found: {}\n", report.findings.len()));

        if !report.findings.is_empty() {
            summary.push('\n');
            for (i, finding) in report.findings.iter().enumerate() {
                summary.push_str(&format!(
                    "  {}. {} [{}]: {}\n",
                    i + 1,
                    finding.dataset,
                    finding.finding_type,
                    finding.details
                ));
            }
        }

        summary.push_str("\naudit complete");
        summary
    }
}
