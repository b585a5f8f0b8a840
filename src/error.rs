use thiserror::Error;

#[derive(Error, Debug)]
pub enum RentRollError {
    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Owner already exists: {0}")]
    DuplicateOwner(String),

    #[error("Property '{property}' already exists for owner '{owner}'")]
    DuplicateProperty { owner: String, property: String },

    #[error("Owner not found: {0}")]
    OwnerNotFound(String),

    #[error("Property '{property}' not found for owner '{owner}'")]
    PropertyNotFound { owner: String, property: String },

    #[error("Invalid month id '{0}': expected YYYY-MM")]
    InvalidMonthId(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Invalid contract field '{field}': {details}")]
    InvalidContractField { field: String, details: String },

    #[error("UF quote unavailable: {0}")]
    UfUnavailable(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "mindicador")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, RentRollError>;
