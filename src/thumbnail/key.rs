//! Deterministic cache keys for thumbnails.
//!
//! # Key Derivation
//!
//! ```text
//! source_key = hex(sha256("{kind}:{value}"))
//! key        = hex(sha256("{source_key}||{geometry}||{canonical options json}"))[..32]
//! name       = "{prefix}{key[0..2]}/{key[2..4]}/{key}.{ext}"
//! ```
//!
//! Options are serialized with sorted keys. Before that, extra options equal
//! to their built-in default are dropped and values with several spellings
//! (`format: "jpg"`, `crop: true`) are rewritten to one canonical form, so
//! equivalent requests always land on the same key.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::ThumbnailError;
use crate::io::SourceRef;

use super::options::{extra_option_default, OptionValue, Options, ThumbnailFormat};

/// Hex characters kept from the digest.
const KEY_LENGTH: usize = 32;

// =============================================================================
// Cache Key
// =============================================================================

/// A thumbnail's cache key and storage name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Hex digest identifying the thumbnail
    pub key: String,

    /// Storage name under the configured prefix
    pub name: String,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds cache keys under a storage prefix.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    prefix: String,
}

impl CacheKeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Derive the key and storage name for a request.
    ///
    /// The extension comes from the `format` option.
    pub fn build(
        &self,
        source: &SourceRef,
        geometry: &str,
        options: &Options,
    ) -> Result<CacheKey, ThumbnailError> {
        let options_json = normalize(options).to_canonical_json()?;
        let message = format!("{}||{}||{}", source_key(source), geometry, options_json);
        let digest = hex::encode(Sha256::digest(message.as_bytes()));
        let key = digest[..KEY_LENGTH].to_string();

        let name = format!(
            "{}{}/{}/{}.{}",
            self.prefix,
            &key[0..2],
            &key[2..4],
            key,
            options.format()?.extension()
        );

        Ok(CacheKey { key, name })
    }
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self::new(super::settings::DEFAULT_PREFIX)
    }
}

/// Stable identity of a source reference.
pub fn source_key(source: &SourceRef) -> String {
    hex::encode(Sha256::digest(source.identity().as_bytes()))
}

/// Drop extra options that carry their built-in default and canonicalize
/// the rest.
fn normalize(options: &Options) -> Options {
    options
        .iter()
        .filter(|(key, value)| extra_option_default(key).as_ref() != Some(*value))
        .map(|(key, value)| (key.clone(), canonical_value(key, value)))
        .collect()
}

fn canonical_value(key: &str, value: &OptionValue) -> OptionValue {
    match (key, value) {
        ("format", OptionValue::Str(name)) => match name.parse::<ThumbnailFormat>() {
            Ok(format) => format.as_str().into(),
            Err(_) => value.clone(),
        },
        ("crop", OptionValue::Bool(true)) => "center".into(),
        _ => value.clone(),
    }
}

// =============================================================================
// Tests
// =============================================================================
