//! Engine error taxonomy.
//!
//! Unit-level failures (one aspect ratio, one compliance sub-check) are caught
//! by the caller and recorded; only `ImageDecode` on a source is fatal to a
//! product run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CreativeError {
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Cannot lay out empty text")]
    EmptyText,

    #[error("Logo load error: {0}")]
    LogoLoad(String),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("Image encode error: {0}")]
    Encode(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CreativeResult<T> = Result<T, CreativeError>;
