use async_trait::async_trait;
use bson::{Bson, Document};
use flux_etl::error::{ProcessingError, Result};
use flux_etl::store::{DocumentStore, MemoryStore};
use std::fs;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

/// Write a Level-5 MAT file holding one double matrix per variable.
///
/// Rows are given row by row and stored column-major, as Matlab does.
pub fn write_mat(path: &Path, variables: &[(&str, Vec<Vec<f64>>)]) -> PathBuf {
    fn push_u32(out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    let mut out = Vec::new();
    let mut text = b"MATLAB 5.0 MAT-file, integration fixture".to_vec();
    text.resize(116, b' ');
    out.extend_from_slice(&text);
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&0x0100u16.to_le_bytes());
    out.extend_from_slice(b"IM");

    for (name, rows) in variables {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        let column_major: Vec<f64> = (0..n_cols)
            .flat_map(|c| rows.iter().map(move |r| r[c]))
            .collect();

        let name_padded = (name.len() + 7) / 8 * 8;
        let body_len = 16 + 16 + (8 + name_padded) + (8 + column_major.len() * 8);

        push_u32(&mut out, 14);
        push_u32(&mut out, body_len as u32);

        push_u32(&mut out, 6);
        push_u32(&mut out, 8);
        push_u32(&mut out, 6);
        push_u32(&mut out, 0);

        push_u32(&mut out, 5);
        push_u32(&mut out, 8);
        out.extend_from_slice(&(n_rows as i32).to_le_bytes());
        out.extend_from_slice(&(n_cols as i32).to_le_bytes());

        push_u32(&mut out, 1);
        push_u32(&mut out, name.len() as u32);
        let mut name_bytes = name.as_bytes().to_vec();
        name_bytes.resize(name_padded, 0);
        out.extend_from_slice(&name_bytes);

        push_u32(&mut out, 9);
        push_u32(&mut out, (column_major.len() * 8) as u32);
        for value in &column_major {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    fs::write(path, out).expect("Failed to write MAT fixture");
    path.to_path_buf()
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// In-memory store that fails selected deletes and renames.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing_deletes: Vec<(String, String)>,
    failing_renames: Vec<String>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    /// Fail every delete of `id` in `collection`.
    pub fn fail_delete(mut self, collection: &str, id: &str) -> Self {
        self.failing_deletes.push((collection.to_string(), id.to_string()));
        self
    }

    /// Fail every rename of the `from` collection.
    pub fn fail_rename_from(mut self, from: &str) -> Self {
        self.failing_renames.push(from.to_string());
        self
    }

    fn injected(operation: &str) -> ProcessingError {
        ProcessingError::Io(Error::new(
            ErrorKind::Other,
            format!("connection reset during {}", operation),
        ))
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        self.inner.list_collections().await
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        self.inner.count(collection).await
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<()> {
        self.inner.insert_many(collection, documents).await
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        self.inner.find_all(collection).await
    }

    async fn find_by_id(&self, collection: &str, id: &Bson) -> Result<Option<Document>> {
        self.inner.find_by_id(collection, id).await
    }

    async fn replace_by_id(&self, collection: &str, replacement: Document) -> Result<()> {
        self.inner.replace_by_id(collection, replacement).await
    }

    async fn delete_by_id(&self, collection: &str, id: &Bson) -> Result<bool> {
        let failing = self
            .failing_deletes
            .iter()
            .any(|(c, i)| c == collection && id.as_str() == Some(i.as_str()));
        if failing {
            return Err(Self::injected("delete"));
        }
        self.inner.delete_by_id(collection, id).await
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.inner.drop_collection(collection).await
    }

    async fn rename_collection(&self, from: &str, to: &str) -> Result<()> {
        if self.failing_renames.iter().any(|f| f == from) {
            return Err(Self::injected("rename"));
        }
        self.inner.rename_collection(from, to).await
    }
}
