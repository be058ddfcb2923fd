use thiserror::Error;

/// ChatKit API errors
#[derive(Error, Debug)]
pub enum ChatKitError {
    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Request Error: {0}")]
    RequestError(String),

    #[error("Response Error: {0}")]
    ResponseError(String),

    #[error("Parsing Error: {0}")]
    ParsingError(String),

    #[error("HTTP Error: {status_code} - {message}")]
    HttpError { status_code: u16, message: String },

    #[error("Missing client secret in response")]
    MissingClientSecret,

    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
}

/// Result type for ChatKit operations
pub type ChatKitResult<T> = Result<T, ChatKitError>;
