use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinancialRecordError {
    #[error("Malformed fact for tag '{tag}': {details}")]
    MalformedFact { tag: String, details: String },

    #[error("Unknown canonical concept: {0}")]
    UnknownConcept(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FinancialRecordError>;
