use thiserror::Error;

#[derive(Debug, Error)]
pub enum RdfError {
    #[error("failed to parse {format}: {message}")]
    Parse { format: &'static str, message: String },
    #[error("embedded metadata is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not a JSON-LD document: {0}")]
    InvalidJsonLd(String),
}

pub type RdfResult<T> = std::result::Result<T, RdfError>;
