use thiserror::Error;

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("model endpoint error (status {status}): {message}")]
    EndpointError { status: u16, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("text extraction failed: {0}")]
    ExtractionError(String),
}

pub type Result<T> = std::result::Result<T, TriageError>;
