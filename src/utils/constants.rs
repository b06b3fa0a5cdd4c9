/// Database defaults
pub const DEFAULT_DATABASE_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE_NAME: &str = "fluxvis";
pub const DEFAULT_SETTINGS_FILE: &str = "flux-etl.toml";
pub const SETTINGS_ENV_PREFIX: &str = "FLUX_ETL";

/// Collection names
pub const METADATA_COLLECTION: &str = "metadata";
pub const COORD_INDEX_COLLECTION: &str = "coord_index";
pub const SUMMARY_STATS_COLLECTION: &str = "summary_stats";

/// Collections that can never hold a dataset
pub const RESERVED_COLLECTION_NAMES: [&str; 3] = [
    COORD_INDEX_COLLECTION,
    METADATA_COLLECTION,
    SUMMARY_STATS_COLLECTION,
];

/// Prefix of MongoDB's own bookkeeping collections
pub const SYSTEM_COLLECTION_PREFIX: &str = "system.";

/// Timestamp layout used in metadata documents
pub const ISO_8601: &str = "%Y-%m-%dT%H:%M:%S";

/// Longest accepted time step or span: one century
pub const MAX_CADENCE_SECONDS: i64 = 100 * 366 * 86_400;

/// Processing defaults
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB

/// Sidecar config extension
pub const SIDECAR_EXTENSION: &str = "json";

/// Document field names
pub const ID_FIELD: &str = "_id";
pub const SPAN_FIELD: &str = "_span";
pub const COORD_INDEX_FIELD: &str = "i";

/// True for names that are reserved or owned by the server.
pub fn is_reserved_collection(name: &str) -> bool {
    RESERVED_COLLECTION_NAMES.contains(&name) || name.starts_with(SYSTEM_COLLECTION_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_collections() {
        assert!(is_reserved_collection("metadata"));
        assert!(is_reserved_collection("coord_index"));
        assert!(is_reserved_collection("summary_stats"));
        assert!(is_reserved_collection("system.indexes"));
        assert!(!is_reserved_collection("casa_gfed_2004"));
    }
}
