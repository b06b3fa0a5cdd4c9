use crate::error::Result;
use crate::settings::DatabaseSettings;
use crate::store::{id_filter, DocumentStore};
use crate::utils::constants::{ID_FIELD, SYSTEM_COLLECTION_PREFIX};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::options::ReplaceOptions;
use mongodb::{Client, Collection, Database};
use tracing::{debug, info};

/// A MongoDB database holding datasets, metadata and coordinate indexes.
pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let client = Client::with_uri_str(&settings.uri).await?;
        let database = client.database(&settings.name);

        // The driver connects lazily; ping so bad URIs fail up front
        database.run_command(doc! { "ping": 1 }, None).await?;
        info!("Connected to {} (database {})", settings.uri, settings.name);

        Ok(Self { client, database })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }

    fn namespace(&self, collection: &str) -> String {
        format!("{}.{}", self.database.name(), collection)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .database
            .list_collection_names(None)
            .await?
            .into_iter()
            .filter(|name| !name.starts_with(SYSTEM_COLLECTION_PREFIX))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        Ok(self.collection(collection).count_documents(doc! {}, None).await?)
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let inserted = self
            .collection(collection)
            .insert_many(documents, None)
            .await?;
        debug!("Inserted {} documents into {}", inserted.inserted_ids.len(), collection);
        Ok(())
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        let cursor = self.collection(collection).find(doc! {}, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_id(&self, collection: &str, id: &Bson) -> Result<Option<Document>> {
        Ok(self.collection(collection).find_one(id_filter(id), None).await?)
    }

    async fn replace_by_id(&self, collection: &str, replacement: Document) -> Result<()> {
        let id = replacement.get(ID_FIELD).cloned().unwrap_or(Bson::Null);
        let options = ReplaceOptions::builder().upsert(true).build();

        self.collection(collection)
            .replace_one(id_filter(&id), replacement, options)
            .await?;
        Ok(())
    }

    async fn delete_by_id(&self, collection: &str, id: &Bson) -> Result<bool> {
        let result = self
            .collection(collection)
            .delete_one(id_filter(id), None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.collection(collection).drop(None).await?;
        Ok(())
    }

    async fn rename_collection(&self, from: &str, to: &str) -> Result<()> {
        let command = doc! {
            "renameCollection": self.namespace(from),
            "to": self.namespace(to),
        };
        self.client
            .database("admin")
            .run_command(command, None)
            .await?;
        Ok(())
    }
}
