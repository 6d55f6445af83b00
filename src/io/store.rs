use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::IoError;

// =============================================================================
// Source Reference
// =============================================================================

/// Identifies a source image.
///
/// The variant is decided once, at the boundary where the reference enters the
/// system; stores never probe a reference to guess what it is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum SourceRef {
    /// Remote URL (`https://...`, `s3://...`, `file://...`)
    Url(String),

    /// Local filesystem path
    Path(String),

    /// Opaque storage key (e.g. an S3 object key)
    Key(String),
}

impl SourceRef {
    pub fn url(value: impl Into<String>) -> Self {
        SourceRef::Url(value.into())
    }

    pub fn path(value: impl Into<String>) -> Self {
        SourceRef::Path(value.into())
    }

    pub fn key(value: impl Into<String>) -> Self {
        SourceRef::Key(value.into())
    }

    /// Short name of the variant, used in identities and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceRef::Url(_) => "url",
            SourceRef::Path(_) => "path",
            SourceRef::Key(_) => "key",
        }
    }

    /// The raw reference string.
    pub fn value(&self) -> &str {
        match self {
            SourceRef::Url(v) | SourceRef::Path(v) | SourceRef::Key(v) => v,
        }
    }

    /// Stable identity string. Two references are the same source iff their
    /// identities are equal.
    pub fn identity(&self) -> String {
        format!("{}:{}", self.kind(), self.value())
    }

    /// File extension of the referenced object, lowercased, without query string.
    pub fn extension(&self) -> Option<String> {
        let value = self.value();
        let value = value.split(&['?', '#'][..]).next().unwrap_or(value);
        let file_name = value.rsplit('/').next()?;
        let (_, ext) = file_name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}

impl FromStr for SourceRef {
    type Err = Infallible;

    /// Classify a raw string: anything with a scheme is a URL, anything that
    /// looks like a filesystem path is a path, everything else is a key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains("://") {
            Ok(SourceRef::Url(s.to_string()))
        } else if s.starts_with('/') || s.starts_with("./") || s.starts_with("../") {
            Ok(SourceRef::Path(s.to_string()))
        } else {
            Ok(SourceRef::Key(s.to_string()))
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity())
    }
}

// =============================================================================
// Store Traits
// =============================================================================

/// Read side: resolves source references to bytes.
///
/// Implementations must report a missing object as [`IoError::NotFound`] and
/// keep other failures distinct so callers can apply fallback policy.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Whether this store can resolve the given reference at all.
    fn supports(&self, source: &SourceRef) -> bool;

    /// Read the full source object.
    async fn open(&self, source: &SourceRef) -> Result<Bytes, IoError>;

    /// Public location of the source, for logging and descriptors.
    fn url(&self, source: &SourceRef) -> String;
}

/// Metadata attached to a written thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub width: u32,
    pub height: u32,
}

/// Write side: destination storage for generated thumbnails.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check whether an object exists under `name`.
    async fn exists(&self, name: &str) -> Result<bool, IoError>;

    /// Write `data` under `name`, replacing any previous object.
    async fn write(&self, name: &str, data: Bytes, metadata: &ObjectMetadata)
        -> Result<(), IoError>;

    /// Public URL of the object stored under `name`.
    fn url(&self, name: &str) -> String;
}

// =============================================================================
// Tests
// =============================================================================
