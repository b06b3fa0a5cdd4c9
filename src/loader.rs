//! The load pipeline: read a source file through its model and store it.

use crate::catalog::DatasetManager;
use crate::error::Result;
use crate::mediators::{check_collection_name, mediator_for, SaveOptions};
use crate::models::{DatasetMetadata, Model, ModelKind, ModelOptions};
use crate::store::DocumentStore;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct Loader {
    store: Arc<dyn DocumentStore>,
}

impl Loader {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Load `path` into `collection`, returning the stored metadata.
    ///
    /// With `force` set, an existing dataset of that name is removed first.
    pub async fn load(
        &self,
        path: &Path,
        kind: ModelKind,
        collection: &str,
        model_options: &ModelOptions,
        save_options: &SaveOptions,
    ) -> Result<DatasetMetadata> {
        check_collection_name(collection)?;
        let model = Model::open(path, kind, model_options)?;
        self.save(&model, collection, save_options).await
    }

    pub async fn save(
        &self,
        model: &Model,
        collection: &str,
        options: &SaveOptions,
    ) -> Result<DatasetMetadata> {
        if options.force {
            let manager = DatasetManager::new(self.store.clone());
            if manager.exists(collection).await? {
                info!("Removing existing dataset {} before loading", collection);
                manager.remove(collection).await?;
            }
        }

        let mediator = mediator_for(model, self.store.clone());
        let metadata = mediator.save(collection, model, options).await?;

        info!(
            "Loaded {} into {} ({} dates)",
            model.kind(),
            collection,
            metadata.dates.len()
        );
        Ok(metadata)
    }
}
