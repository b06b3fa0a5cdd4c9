use crate::error::{ProcessingError, Result};
use crate::store::DocumentStore;
use crate::utils::constants::{ID_FIELD, SYSTEM_COLLECTION_PREFIX};
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Collections held in process memory.
///
/// Behaves like the MongoDB store for the operations the loaders use:
/// documents get an ObjectId `_id` when they have none, duplicate `_id`s
/// are rejected and renaming onto an existing collection fails.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn id_of(document: &Document) -> Option<&Bson> {
    document.get(ID_FIELD)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        Ok(collections
            .keys()
            .filter(|name| !name.starts_with(SYSTEM_COLLECTION_PREFIX))
            .cloned()
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, |docs| docs.len() as u64))
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let mut collections = self.collections.write().await;
        let existing = collections.entry(collection.to_string()).or_default();

        let mut incoming = Vec::with_capacity(documents.len());
        for mut document in documents {
            if id_of(&document).is_none() {
                document.insert(ID_FIELD, ObjectId::new());
            }

            let duplicate = id_of(&document).filter(|id| {
                existing.iter().chain(incoming.iter()).any(|d| id_of(d) == Some(*id))
            });
            if let Some(id) = duplicate {
                return Err(ProcessingError::DuplicateRecord {
                    collection: collection.to_string(),
                    id: id.to_string(),
                });
            }

            incoming.push(document);
        }

        existing.extend(incoming);
        Ok(())
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    async fn find_by_id(&self, collection: &str, id: &Bson) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| id_of(d) == Some(id)))
            .cloned())
    }

    async fn replace_by_id(&self, collection: &str, replacement: Document) -> Result<()> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        let id = id_of(&replacement).cloned();
        match docs.iter_mut().find(|d| id_of(d).cloned() == id) {
            Some(slot) => *slot = replacement,
            None => docs.push(replacement),
        }
        Ok(())
    }

    async fn delete_by_id(&self, collection: &str, id: &Bson) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };

        let before = docs.len();
        docs.retain(|d| id_of(d) != Some(id));
        Ok(docs.len() < before)
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn rename_collection(&self, from: &str, to: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(to) {
            return Err(ProcessingError::DatasetExists(to.to_string()));
        }

        let docs = collections.remove(from).ok_or_else(|| ProcessingError::DatasetNotFound {
            name: from.to_string(),
            existing: Vec::new(),
        })?;
        collections.insert(to.to_string(), docs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn test_insert_and_find() -> Result<()> {
        let store = MemoryStore::new();
        store
            .insert_many("casa", vec![doc! { "_id": 1, "values": [1.0, 2.0] }, doc! { "values": [3.0] }])
            .await?;

        assert_eq!(store.count("casa").await?, 2);
        assert!(store.find_by_id("casa", &Bson::Int32(1)).await?.is_some());
        assert!(store.find_all("casa").await?[1].get_object_id("_id").is_ok());

        let duplicate = store.insert_many("casa", vec![doc! { "_id": 1 }]).await;
        assert!(matches!(duplicate, Err(ProcessingError::DuplicateRecord { .. })));
        assert_eq!(store.count("casa").await?, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_replace_delete_and_rename() -> Result<()> {
        let store = MemoryStore::new();
        store
            .replace_by_id("metadata", doc! { "_id": "casa", "title": "a" })
            .await?;
        store
            .replace_by_id("metadata", doc! { "_id": "casa", "title": "b" })
            .await?;

        let found = store
            .find_by_id("metadata", &Bson::String("casa".to_string()))
            .await?;
        assert_eq!(found.and_then(|d| d.get_str("title").ok().map(String::from)), Some("b".to_string()));

        store.insert_many("casa", vec![doc! { "v": 1 }]).await?;
        store.insert_many("other", vec![doc! { "v": 1 }]).await?;
        assert!(store.rename_collection("casa", "other").await.is_err());
        store.rename_collection("casa", "renamed").await?;
        assert_eq!(store.list_collections().await?, vec!["metadata", "other", "renamed"]);

        assert!(store.delete_by_id("metadata", &Bson::String("casa".to_string())).await?);
        assert!(!store.delete_by_id("metadata", &Bson::String("casa".to_string())).await?);

        store.drop_collection("other").await?;
        store.drop_collection("other").await?;
        assert!(!store.collection_exists("other").await?);

        Ok(())
    }
}
