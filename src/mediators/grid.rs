use crate::error::{ProcessingError, Result};
use crate::mediators::{
    as_f64, as_i64, check_collection_name, generate_metadata, insert_batched, read_coord_index,
    timestamp_from_bson, timestamp_to_bson, values_to_bson, Mediator, SaveOptions,
};
use crate::models::{Dataset, DatasetMetadata, GridFrame, GridLayer, Model};
use crate::processors::statistics::{StatisticsCollector, SummaryStats};
use crate::store::DocumentStore;
use crate::utils::constants::{COORD_INDEX_COLLECTION, COORD_INDEX_FIELD, ID_FIELD, SPAN_FIELD};
use crate::utils::filename::format_timestamp;
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Structured longitude-latitude grids, one document per time slice.
///
/// Cell centroids live once in the coordinate index; each data document
/// holds its parameter values in index order:
/// `{_id: <datetime>, _span: <seconds>, values: [...], errors: [...]}`.
pub struct GridMediator {
    store: Arc<dyn DocumentStore>,
}

impl GridMediator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn layer_document(layer: &GridLayer) -> Document {
        let mut document = doc! { ID_FIELD: timestamp_to_bson(&layer.timestamp) };
        if let Some(span) = layer.span {
            document.insert(SPAN_FIELD, span);
        }
        for (name, values) in &layer.parameters {
            document.insert(name.clone(), values_to_bson(values));
        }
        document
    }

    fn layer_from_document(document: &Document) -> Result<GridLayer> {
        let timestamp = document
            .get(ID_FIELD)
            .and_then(timestamp_from_bson)
            .ok_or_else(|| {
                ProcessingError::InvalidFormat(format!(
                    "Grid record without a timestamp _id: {}",
                    document
                ))
            })?;

        let span = document.get(SPAN_FIELD).and_then(as_i64);

        let parameters = document
            .iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .filter_map(|(key, value)| match value {
                Bson::Array(values) => {
                    Some((key.clone(), values.iter().map(as_f64).collect::<Vec<_>>()))
                }
                _ => None,
            })
            .collect();

        Ok(GridLayer {
            timestamp,
            span,
            parameters,
        })
    }

    /// Refuse layers whose timestamps are already stored or repeated.
    async fn check_duplicates(&self, collection: &str, layers: &[GridLayer]) -> Result<()> {
        let mut seen = BTreeSet::new();
        for layer in layers {
            let id = timestamp_to_bson(&layer.timestamp);
            let exists = !seen.insert(layer.timestamp)
                || self.store.find_by_id(collection, &id).await?.is_some();

            if exists {
                return Err(ProcessingError::DuplicateRecord {
                    collection: collection.to_string(),
                    id: format_timestamp(&layer.timestamp),
                });
            }
        }
        Ok(())
    }

    async fn aligned_frame(&self, frame: GridFrame, align_to: Option<&str>) -> Result<GridFrame> {
        let Some(reference) = align_to else {
            return Ok(frame);
        };

        let coords = read_coord_index(self.store.as_ref(), reference)
            .await?
            .ok_or_else(|| ProcessingError::DatasetNotFound {
                name: reference.to_string(),
                existing: Vec::new(),
            })?;

        info!(
            "Aligning {} cells onto the {} cell grid of {}",
            frame.cell_count(),
            coords.len(),
            reference
        );
        Ok(frame.align_to(&coords))
    }

    /// Returns whether an index still has to be written.
    async fn check_coord_index(&self, collection: &str, frame: &GridFrame) -> Result<bool> {
        match read_coord_index(self.store.as_ref(), collection).await? {
            None => Ok(true),
            Some(existing) if existing.len() != frame.cell_count() => Err(ProcessingError::GridMismatch {
                collection: collection.to_string(),
                details: format!(
                    "stored grid has {} cells, incoming data has {}",
                    existing.len(),
                    frame.cell_count()
                ),
            }),
            Some(_) => Ok(false),
        }
    }
}

#[async_trait]
impl Mediator for GridMediator {
    async fn save(
        &self,
        collection: &str,
        model: &Model,
        options: &SaveOptions,
    ) -> Result<DatasetMetadata> {
        check_collection_name(collection)?;

        let Dataset::Gridded(frame) = model.extract()? else {
            return Err(ProcessingError::InvalidFormat(format!(
                "{} does not produce gridded data",
                model.kind()
            )));
        };
        let frame = self.aligned_frame(frame, options.align_to.as_deref()).await?;

        let needs_index = self.check_coord_index(collection, &frame).await?;
        self.check_duplicates(collection, &frame.layers).await?;

        if needs_index {
            let cells: Vec<Bson> = frame
                .coords
                .iter()
                .map(|c| Bson::Array(vec![Bson::Double(c[0]), Bson::Double(c[1])]))
                .collect();
            self.store
                .replace_by_id(
                    COORD_INDEX_COLLECTION,
                    doc! { ID_FIELD: collection, COORD_INDEX_FIELD: cells },
                )
                .await?;
            debug!("Created coordinate index for {}", collection);
        }

        let documents = frame.layers.iter().map(Self::layer_document).collect();
        insert_batched(self.store.as_ref(), collection, documents, options).await?;

        let mut metadata = model.describe(collection, &Dataset::Gridded(frame));
        metadata.stats = self.summarize(collection).await?;
        generate_metadata(self.store.as_ref(), metadata, options.force).await
    }

    async fn load(&self, collection: &str) -> Result<Dataset> {
        let coords = read_coord_index(self.store.as_ref(), collection)
            .await?
            .ok_or_else(|| {
                ProcessingError::MissingData(format!("coordinate index for {}", collection))
            })?;

        let mut layers = Vec::new();
        for document in self.store.find_all(collection).await? {
            layers.push(Self::layer_from_document(&document)?);
        }
        layers.sort_by_key(|layer| layer.timestamp);

        Ok(Dataset::Gridded(GridFrame { coords, layers }))
    }

    async fn summarize(&self, collection: &str) -> Result<BTreeMap<String, SummaryStats>> {
        let mut collector = StatisticsCollector::new();
        for document in self.store.find_all(collection).await? {
            let layer = Self::layer_from_document(&document)?;
            for (name, values) in layer.parameters {
                collector.extend(&name, values);
            }
        }
        Ok(collector.summarize())
    }
}
