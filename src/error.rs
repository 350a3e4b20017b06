use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorepError {
    #[error("Template schema error on field '{field}': {details}")]
    SchemaError { field: String, details: String },

    #[error("Field '{field}' references excerpt '{id}' which is not in the corpus")]
    UnresolvedReference { field: String, id: String },

    #[error("Invalid regulation corpus: {0}")]
    InvalidCorpus(String),

    #[error("Invalid scenario value for '{key}': {details}")]
    InvalidScenario { key: String, details: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CorepError>;
