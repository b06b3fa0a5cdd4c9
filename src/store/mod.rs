//! Document storage behind the loaders and the dataset catalog.
//!
//! Everything above this module talks to a [`DocumentStore`]; the MongoDB
//! implementation is used for real loads and the in-memory one for dry runs
//! and tests.

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use crate::error::Result;
use crate::utils::constants::ID_FIELD;
use async_trait::async_trait;
use bson::{doc, Bson, Document};

/// Collection-level operations needed by the loaders.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Collection names, sorted, without server bookkeeping collections.
    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn count(&self, collection: &str) -> Result<u64>;

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<()>;

    /// All documents in natural (insertion) order.
    async fn find_all(&self, collection: &str) -> Result<Vec<Document>>;

    async fn find_by_id(&self, collection: &str, id: &Bson) -> Result<Option<Document>>;

    /// Replace the document with `replacement`'s `_id`, inserting if absent.
    async fn replace_by_id(&self, collection: &str, replacement: Document) -> Result<()>;

    /// Returns whether a document was deleted.
    async fn delete_by_id(&self, collection: &str, id: &Bson) -> Result<bool>;

    /// Dropping a missing collection is not an error.
    async fn drop_collection(&self, collection: &str) -> Result<()>;

    async fn rename_collection(&self, from: &str, to: &str) -> Result<()>;

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.list_collections().await?.iter().any(|c| c == collection))
    }
}

/// Filter document matching one `_id`.
pub fn id_filter(id: &Bson) -> Document {
    doc! { ID_FIELD: id.clone() }
}
