use crate::error::{ProcessingError, Result};
use crate::mediators::{check_collection_name, read_coord_index, read_metadata, timestamp_from_bson};
use crate::models::DatasetMetadata;
use crate::store::DocumentStore;
use crate::utils::constants::{
    is_reserved_collection, COORD_INDEX_COLLECTION, ID_FIELD, METADATA_COLLECTION,
};
use crate::utils::filename::format_timestamp;
use bson::{Bson, Document};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// A dataset name and, when asked for, its record count.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub name: String,
    pub records: Option<u64>,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.records {
            Some(n) => write!(f, "{} ({} records)", self.name, n),
            None => write!(f, "{}", self.name),
        }
    }
}

/// The parts of a dataset that move together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Artifact {
    Data,
    Metadata,
    CoordIndex,
}

impl Artifact {
    const ALL: [Artifact; 3] = [Artifact::Data, Artifact::Metadata, Artifact::CoordIndex];

    fn describe(&self, verb: &str) -> String {
        match self {
            Artifact::Data => format!("{} data collection", verb),
            Artifact::Metadata => format!("{} metadata entry", verb),
            Artifact::CoordIndex => format!("{} coordinate index", verb),
        }
    }

    fn side_collection(&self) -> Option<&'static str> {
        match self {
            Artifact::Data => None,
            Artifact::Metadata => Some(METADATA_COLLECTION),
            Artifact::CoordIndex => Some(COORD_INDEX_COLLECTION),
        }
    }
}

/// Administration of stored datasets: each dataset is its data collection,
/// its metadata entry and, for grids, its coordinate index.
pub struct DatasetManager {
    store: Arc<dyn DocumentStore>,
}

impl DatasetManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Data collections, without reserved ones.
    pub async fn datasets(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .list_collections()
            .await?
            .into_iter()
            .filter(|name| !is_reserved_collection(name))
            .collect())
    }

    pub async fn list(&self, include_counts: bool) -> Result<Vec<DatasetSummary>> {
        let mut summaries = Vec::new();
        for name in self.datasets().await? {
            let records = if include_counts {
                Some(self.store.count(&name).await?)
            } else {
                None
            };
            summaries.push(DatasetSummary { name, records });
        }
        Ok(summaries)
    }

    async fn has_artifact(&self, artifact: Artifact, name: &str) -> Result<bool> {
        match artifact.side_collection() {
            None => self.store.collection_exists(name).await,
            Some(collection) => Ok(self
                .store
                .find_by_id(collection, &Bson::String(name.to_string()))
                .await?
                .is_some()),
        }
    }

    /// Whether any part of the dataset is stored.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        for artifact in Artifact::ALL {
            if self.has_artifact(artifact, name).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn not_found(&self, name: &str) -> ProcessingError {
        ProcessingError::DatasetNotFound {
            name: name.to_string(),
            existing: self.datasets().await.unwrap_or_default(),
        }
    }

    /// Drop the data collection and delete its metadata and coordinate index.
    pub async fn remove(&self, name: &str) -> Result<()> {
        if is_reserved_collection(name) {
            return Err(ProcessingError::ReservedName(name.to_string()));
        }
        if !self.exists(name).await? {
            return Err(self.not_found(name).await);
        }

        let mut completed = Vec::new();
        for artifact in Artifact::ALL {
            let outcome = match artifact.side_collection() {
                None => self.store.drop_collection(name).await,
                Some(collection) => self
                    .store
                    .delete_by_id(collection, &Bson::String(name.to_string()))
                    .await
                    .map(|_| ()),
            };

            match outcome {
                Ok(()) => completed.push(artifact.describe("removed")),
                Err(e) if completed.is_empty() => return Err(e),
                Err(e) => {
                    return Err(ProcessingError::PartialOperation {
                        operation: format!("Removing \"{}\"", name),
                        completed,
                        cause: e.to_string(),
                    })
                }
            }
        }

        info!("Removed dataset {}", name);
        Ok(())
    }

    /// Move a side document (metadata or coordinate index) to a new `_id`.
    async fn move_document(&self, collection: &str, from: &str, to: &str) -> Result<bool> {
        let Some(mut document) = self
            .store
            .find_by_id(collection, &Bson::String(from.to_string()))
            .await?
        else {
            return Ok(false);
        };

        document.insert(ID_FIELD, to);
        self.store.replace_by_id(collection, document).await?;

        // The copy under `to` must not outlive a failed move
        if let Err(e) = self
            .store
            .delete_by_id(collection, &Bson::String(from.to_string()))
            .await
        {
            return match self
                .store
                .delete_by_id(collection, &Bson::String(to.to_string()))
                .await
            {
                Ok(_) => Err(e),
                Err(cleanup) => Err(ProcessingError::PartialOperation {
                    operation: format!("Moving \"{}\" to \"{}\" in {}", from, to, collection),
                    completed: vec![format!("copied {} entry to \"{}\"", collection, to)],
                    cause: format!("{}; removing the copy failed: {}", e, cleanup),
                }),
            };
        }
        Ok(true)
    }

    async fn move_artifact(&self, artifact: Artifact, from: &str, to: &str) -> Result<bool> {
        match artifact.side_collection() {
            None => {
                if !self.store.collection_exists(from).await? {
                    return Ok(false);
                }
                self.store.rename_collection(from, to).await?;
                Ok(true)
            }
            Some(collection) => self.move_document(collection, from, to).await,
        }
    }

    /// Rename a dataset, moving all of its parts.
    ///
    /// On failure, parts already moved are moved back. If that fails as
    /// well the error lists what was left renamed.
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        check_collection_name(to)?;
        if is_reserved_collection(from) {
            return Err(ProcessingError::ReservedName(from.to_string()));
        }
        if !self.exists(from).await? {
            return Err(self.not_found(from).await);
        }
        if self.exists(to).await? {
            return Err(ProcessingError::DatasetExists(to.to_string()));
        }

        let mut moved: Vec<Artifact> = Vec::new();
        for artifact in Artifact::ALL {
            match self.move_artifact(artifact, from, to).await {
                Ok(true) => moved.push(artifact),
                Ok(false) => {}
                Err(e) => return Err(self.roll_back(from, to, moved, e).await),
            }
        }

        info!("Renamed dataset {} to {}", from, to);
        Ok(())
    }

    async fn roll_back(
        &self,
        from: &str,
        to: &str,
        mut moved: Vec<Artifact>,
        cause: ProcessingError,
    ) -> ProcessingError {
        warn!("Renaming {} failed ({}); rolling back", from, cause);

        while let Some(artifact) = moved.last().copied() {
            if let Err(e) = self.move_artifact(artifact, to, from).await {
                warn!("Rollback of {} failed: {}", artifact.describe("renamed"), e);
                return ProcessingError::PartialOperation {
                    operation: format!("Renaming \"{}\" to \"{}\"", from, to),
                    completed: moved.iter().map(|a| a.describe("renamed")).collect(),
                    cause: cause.to_string(),
                };
            }
            moved.pop();
        }

        cause
    }

    pub async fn metadata(&self, name: &str) -> Result<DatasetMetadata> {
        match read_metadata(self.store.as_ref(), name).await? {
            Some(metadata) => Ok(metadata),
            None => Err(self.not_found(name).await),
        }
    }

    /// `_id`s of the metadata entries.
    pub async fn metadata_ids(&self) -> Result<Vec<String>> {
        self.ids(METADATA_COLLECTION).await
    }

    /// `_id`s of the coordinate indexes.
    pub async fn coord_index_ids(&self) -> Result<Vec<String>> {
        self.ids(COORD_INDEX_COLLECTION).await
    }

    /// `_id`s of a dataset's records; timestamps in ISO 8601.
    pub async fn record_ids(&self, name: &str) -> Result<Vec<String>> {
        if !self.store.collection_exists(name).await? {
            return Err(self.not_found(name).await);
        }
        self.ids(name).await
    }

    pub async fn coordinates(&self, name: &str) -> Result<Vec<[f64; 2]>> {
        match read_coord_index(self.store.as_ref(), name).await? {
            Some(coords) => Ok(coords),
            None => Err(self.not_found(name).await),
        }
    }

    async fn ids(&self, collection: &str) -> Result<Vec<String>> {
        Ok(self
            .store
            .find_all(collection)
            .await?
            .iter()
            .filter_map(document_id)
            .collect())
    }
}

fn document_id(document: &Document) -> Option<String> {
    let id = document.get(ID_FIELD)?;
    Some(match id {
        Bson::String(s) => s.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        other => timestamp_from_bson(other)
            .map(|ts| format_timestamp(&ts))
            .unwrap_or_else(|| other.to_string()),
    })
}
