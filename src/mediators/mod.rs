//! Mediators move extracted datasets between models and the document store.

pub mod grid;
pub mod unstructured;

pub use grid::GridMediator;
pub use unstructured::UnstructuredMediator;

use crate::error::{ProcessingError, Result};
use crate::models::{Dataset, DatasetMetadata, Model};
use crate::processors::statistics::SummaryStats;
use crate::store::DocumentStore;
use crate::utils::constants::{
    is_reserved_collection, COORD_INDEX_COLLECTION, COORD_INDEX_FIELD, DEFAULT_BATCH_SIZE,
    METADATA_COLLECTION,
};
use crate::utils::progress::ProgressReporter;
use async_trait::async_trait;
use bson::{Bson, Document};
use chrono::{NaiveDateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Reorder the grid onto another dataset's coordinate index
    pub align_to: Option<String>,
    /// Replace existing metadata instead of merging into it
    pub force: bool,
    pub batch_size: usize,
    pub quiet: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            align_to: None,
            force: false,
            batch_size: DEFAULT_BATCH_SIZE,
            quiet: true,
        }
    }
}

#[async_trait]
pub trait Mediator: Send + Sync {
    /// Store the model's data in `collection` and record its metadata.
    async fn save(
        &self,
        collection: &str,
        model: &Model,
        options: &SaveOptions,
    ) -> Result<DatasetMetadata>;

    /// Read a stored dataset back.
    async fn load(&self, collection: &str) -> Result<Dataset>;

    /// Statistics per parameter over everything stored in `collection`.
    async fn summarize(&self, collection: &str) -> Result<BTreeMap<String, SummaryStats>>;
}

/// Mediator matching a model's layout.
pub fn mediator_for(model: &Model, store: Arc<dyn DocumentStore>) -> Box<dyn Mediator> {
    mediator_for_gridded(model.is_gridded(), store)
}

pub fn mediator_for_gridded(gridded: bool, store: Arc<dyn DocumentStore>) -> Box<dyn Mediator> {
    if gridded {
        Box::new(GridMediator::new(store))
    } else {
        Box::new(UnstructuredMediator::new(store))
    }
}

pub fn check_collection_name(collection: &str) -> Result<()> {
    if collection.trim().is_empty() || is_reserved_collection(collection) {
        return Err(ProcessingError::ReservedName(collection.to_string()));
    }
    Ok(())
}

/// Insert documents `batch_size` at a time, reporting progress.
pub async fn insert_batched(
    store: &dyn DocumentStore,
    collection: &str,
    documents: Vec<Document>,
    options: &SaveOptions,
) -> Result<()> {
    let total = documents.len();
    let progress = ProgressReporter::new(total as u64, &format!("Loading {}", collection), options.quiet);

    let batch_size = options.batch_size.max(1);
    let mut remaining = documents.into_iter().peekable();
    while remaining.peek().is_some() {
        let batch: Vec<Document> = remaining.by_ref().take(batch_size).collect();
        let n = batch.len();
        store.insert_many(collection, batch).await?;
        progress.increment(n as u64);
    }

    progress.finish_with_message(&format!("Inserted {} records", total));
    debug!("Inserted {} records into {}", total, collection);
    Ok(())
}

pub async fn read_metadata(
    store: &dyn DocumentStore,
    collection: &str,
) -> Result<Option<DatasetMetadata>> {
    match store
        .find_by_id(METADATA_COLLECTION, &Bson::String(collection.to_string()))
        .await?
    {
        Some(document) => Ok(Some(bson::from_document(document)?)),
        None => Ok(None),
    }
}

/// Create the metadata entry, replace it when forced, or fold the new load
/// into the existing entry.
pub async fn generate_metadata(
    store: &dyn DocumentStore,
    metadata: DatasetMetadata,
    force: bool,
) -> Result<DatasetMetadata> {
    let stored = match read_metadata(store, &metadata.id).await? {
        None => {
            info!("Creating metadata for {}", metadata.id);
            metadata
        }
        Some(_) if force => {
            info!("Replacing metadata for {}", metadata.id);
            metadata
        }
        Some(existing) => {
            info!("Updating metadata for {}", metadata.id);
            existing.merge(&metadata)?
        }
    };

    store
        .replace_by_id(METADATA_COLLECTION, bson::to_document(&stored)?)
        .await?;
    Ok(stored)
}

/// Coordinates of a dataset's grid cells, if it has an index.
pub async fn read_coord_index(
    store: &dyn DocumentStore,
    collection: &str,
) -> Result<Option<Vec<[f64; 2]>>> {
    let Some(document) = store
        .find_by_id(COORD_INDEX_COLLECTION, &Bson::String(collection.to_string()))
        .await?
    else {
        return Ok(None);
    };

    let cells = document.get_array(COORD_INDEX_FIELD).map_err(|_| {
        ProcessingError::InvalidFormat(format!("Coordinate index of {} has no cells", collection))
    })?;

    let mut coords = Vec::with_capacity(cells.len());
    for cell in cells {
        let pair = match cell {
            Bson::Array(pair) if pair.len() == 2 => [as_f64(&pair[0]), as_f64(&pair[1])],
            _ => [None, None],
        };
        match pair {
            [Some(x), Some(y)] => coords.push([x, y]),
            _ => {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Malformed cell {} in coordinate index of {}",
                    cell, collection
                )))
            }
        }
    }

    Ok(Some(coords))
}

pub fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}

pub fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(*v as i64),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) => Some(*v as i64),
        _ => None,
    }
}

pub fn values_to_bson(values: &[Option<f64>]) -> Bson {
    Bson::Array(
        values
            .iter()
            .map(|v| v.map_or(Bson::Null, Bson::Double))
            .collect(),
    )
}

pub fn timestamp_to_bson(timestamp: &NaiveDateTime) -> Bson {
    Bson::DateTime(bson::DateTime::from_chrono(Utc.from_utc_datetime(timestamp)))
}

pub fn timestamp_from_bson(value: &Bson) -> Option<NaiveDateTime> {
    match value {
        Bson::DateTime(dt) => Some(dt.to_chrono().naive_utc()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    #[test]
    fn test_reserved_names() {
        assert!(matches!(
            check_collection_name("metadata"),
            Err(ProcessingError::ReservedName(_))
        ));
        assert!(check_collection_name("coord_index").is_err());
        assert!(check_collection_name("").is_err());
        assert!(check_collection_name("casa_gfed_2004").is_ok());
    }

    #[test]
    fn test_timestamp_bson() {
        let ts = NaiveDate::from_ymd_opt(2004, 6, 30)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap();
        assert_eq!(timestamp_from_bson(&timestamp_to_bson(&ts)), Some(ts));
        assert_eq!(timestamp_from_bson(&Bson::Null), None);
    }

    #[tokio::test]
    async fn test_insert_batched() -> Result<()> {
        let store = MemoryStore::new();
        let documents = (0..25).map(|i| bson::doc! { "_id": i }).collect();
        let options = SaveOptions {
            batch_size: 10,
            ..Default::default()
        };

        insert_batched(&store, "batched", documents, &options).await?;
        assert_eq!(store.count("batched").await?, 25);

        Ok(())
    }

    #[tokio::test]
    async fn test_read_coord_index() -> Result<()> {
        let store = MemoryStore::new();
        assert_eq!(read_coord_index(&store, "casa").await?, None);

        store
            .replace_by_id(
                COORD_INDEX_COLLECTION,
                bson::doc! { "_id": "casa", "i": [[-166.5, 10.5], [-165, 10]] },
            )
            .await?;
        assert_eq!(
            read_coord_index(&store, "casa").await?,
            Some(vec![[-166.5, 10.5], [-165.0, 10.0]])
        );

        Ok(())
    }
}
