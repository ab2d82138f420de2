use thiserror::Error;

/// All errors the document-revision store can produce.
///
/// Every variant maps to one of the CouchDB-style status codes the core's
/// API surface is documented in terms of; see [`DocError::status`].
#[derive(Debug, Error)]
pub enum DocError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: document update conflict")]
    Conflict,

    #[error("database busy")]
    Busy,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DocError {
    /// The CouchDB-style numeric status this error corresponds to at the
    /// API surface (spec.md §6).
    pub fn status(&self) -> u16 {
        match self {
            DocError::BadRequest(_) => 400,
            DocError::NotFound(_) => 404,
            DocError::Conflict => 409,
            DocError::Busy | DocError::Internal(_) => 500,
            DocError::Json(_) => 400,
        }
    }
}

pub type Result<T> = std::result::Result<T, DocError>;
