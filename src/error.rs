use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Matlab file error: {0}")]
    Matfile(String),

    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Document encoding error: {0}")]
    BsonEncode(#[from] bson::ser::Error),

    #[error("Document decoding error: {0}")]
    BsonDecode(#[from] bson::de::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    MissingConfig(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Could not get at the variable named \"{0}\"")]
    VariableNotFound(String),

    #[error("Mismatched number of columns ({expected}) and number of fields in the data ({found})")]
    ColumnMismatch { expected: usize, found: usize },

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("The collection name \"{0}\" is a reserved name")]
    ReservedName(String),

    #[error("Dataset \"{name}\" does not exist; existing datasets: {existing:?}")]
    DatasetNotFound { name: String, existing: Vec<String> },

    #[error("Dataset \"{0}\" already exists")]
    DatasetExists(String),

    #[error("Record {id} already exists in \"{collection}\"")]
    DuplicateRecord { collection: String, id: String },

    #[error("Grid mismatch for \"{collection}\": {details}")]
    GridMismatch { collection: String, details: String },

    #[error("{operation} only partially completed (done: {completed:?}): {cause}")]
    PartialOperation {
        operation: String,
        completed: Vec<String>,
        cause: String,
    },
}
