use thiserror::Error;

/// I/O errors raised by source stores and object storage.
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    Storage(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object or file not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The store cannot resolve this kind of source reference
    #[error("Unsupported source reference: {0}")]
    Unsupported(String),

    /// Local filesystem error
    #[error("Filesystem error: {0}")]
    Local(String),
}

impl IoError {
    /// Whether the error means the object is absent rather than unreadable.
    pub fn is_not_found(&self) -> bool {
        matches!(self, IoError::NotFound(_))
    }
}

/// Errors produced while resolving, generating or signing thumbnails.
#[derive(Debug, Clone, Error)]
pub enum ThumbnailError {
    /// Geometry string could not be parsed or has non-positive dimensions
    #[error("Invalid geometry {geometry:?}: {reason}")]
    InvalidGeometry { geometry: String, reason: String },

    /// An option has a value of the wrong type or outside its range
    #[error("Invalid option {option}: {reason}")]
    InvalidOptions { option: String, reason: String },

    /// Reading the source image failed
    #[error("Failed to fetch source: {0}")]
    SourceFetchFailed(#[source] IoError),

    /// Source bytes are not a decodable image
    #[error("Failed to decode source: {message}")]
    DecodeError { message: String },

    /// A pipeline step or raster operation failed
    #[error("Transform failed: {message}")]
    TransformFailed { message: String },

    /// Encoding the final image failed
    #[error("Failed to encode thumbnail: {message}")]
    EncodeError { message: String },

    /// Deferred-render token did not verify
    #[error("Invalid signature")]
    InvalidSignature,

    /// Configured server URL cannot be used to build deferred URLs
    #[error("Invalid server URL {url:?}: must start with \"http\" and end with \"/\"")]
    InvalidServerUrl { url: String },

    /// Writing to or querying the object storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] IoError),
}

impl ThumbnailError {
    pub(crate) fn invalid_geometry(geometry: &str, reason: impl Into<String>) -> Self {
        ThumbnailError::InvalidGeometry {
            geometry: geometry.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_option(option: &str, reason: impl Into<String>) -> Self {
        ThumbnailError::InvalidOptions {
            option: option.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn transform(message: impl Into<String>) -> Self {
        ThumbnailError::TransformFailed {
            message: message.into(),
        }
    }
}
