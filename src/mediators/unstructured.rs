use crate::error::{ProcessingError, Result};
use crate::mediators::{
    as_f64, check_collection_name, generate_metadata, insert_batched, timestamp_from_bson,
    timestamp_to_bson, Mediator, SaveOptions,
};
use crate::models::{Dataset, DatasetMetadata, Feature, FeatureSet, Model};
use crate::processors::statistics::{StatisticsCollector, SummaryStats};
use crate::store::DocumentStore;
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use std::collections::BTreeMap;
use std::sync::Arc;

const FEATURES_FIELD: &str = "features";

/// Point observations at arbitrary longitude-latitude positions.
pub struct UnstructuredMediator {
    store: Arc<dyn DocumentStore>,
}

impl UnstructuredMediator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn feature_document(feature: &Feature) -> Document {
        doc! {
            "coordinates": [feature.x, feature.y],
            "value": feature.value.map_or(Bson::Null, Bson::Double),
            "error": feature.error.map_or(Bson::Null, Bson::Double),
            "timestamp": timestamp_to_bson(&feature.timestamp),
        }
    }

    fn feature_from_document(document: &Document) -> Result<Feature> {
        let malformed =
            || ProcessingError::InvalidFormat(format!("Malformed feature: {}", document));

        let coordinates = document.get_array("coordinates").map_err(|_| malformed())?;
        let (x, y) = match coordinates.as_slice() {
            [x, y] => (as_f64(x).ok_or_else(malformed)?, as_f64(y).ok_or_else(malformed)?),
            _ => return Err(malformed()),
        };
        let timestamp = document
            .get("timestamp")
            .and_then(timestamp_from_bson)
            .ok_or_else(malformed)?;

        Ok(Feature {
            x,
            y,
            value: document.get("value").and_then(as_f64),
            error: document.get("error").and_then(as_f64),
            timestamp,
        })
    }

    fn features_from_documents(documents: &[Document]) -> Result<FeatureSet> {
        let mut features = Vec::new();
        for document in documents {
            match document.get_array(FEATURES_FIELD) {
                Ok(collection) => {
                    for entry in collection {
                        let Bson::Document(inner) = entry else {
                            return Err(ProcessingError::InvalidFormat(format!(
                                "Malformed feature: {}",
                                entry
                            )));
                        };
                        features.push(Self::feature_from_document(inner)?);
                    }
                }
                Err(_) => features.push(Self::feature_from_document(document)?),
            }
        }
        Ok(FeatureSet { features })
    }
}

#[async_trait]
impl Mediator for UnstructuredMediator {
    async fn save(
        &self,
        collection: &str,
        model: &Model,
        options: &SaveOptions,
    ) -> Result<DatasetMetadata> {
        check_collection_name(collection)?;

        let Dataset::Features(set) = model.extract()? else {
            return Err(ProcessingError::InvalidFormat(format!(
                "{} does not produce point features",
                model.kind()
            )));
        };

        let features: Vec<Document> = set.features.iter().map(Self::feature_document).collect();
        let as_collection = model
            .config()
            .geometry
            .as_ref()
            .map_or(false, |g| g.collection);

        let documents = if as_collection {
            vec![doc! { FEATURES_FIELD: features }]
        } else {
            features
        };
        insert_batched(self.store.as_ref(), collection, documents, options).await?;

        let mut metadata = model.describe(collection, &Dataset::Features(set));
        metadata.stats = self.summarize(collection).await?;
        generate_metadata(self.store.as_ref(), metadata, options.force).await
    }

    async fn load(&self, collection: &str) -> Result<Dataset> {
        let documents = self.store.find_all(collection).await?;
        Self::features_from_documents(&documents).map(Dataset::Features)
    }

    async fn summarize(&self, collection: &str) -> Result<BTreeMap<String, SummaryStats>> {
        let documents = self.store.find_all(collection).await?;
        let set = Self::features_from_documents(&documents)?;

        let mut collector = StatisticsCollector::new();
        for name in ["value", "error"] {
            collector.extend(name, set.parameter(name));
        }
        Ok(collector.summarize())
    }
}
