//! Transform options.
//!
//! Options are a flat, sorted map of named values. Sorting makes the JSON
//! serialization (and therefore the cache key and signed payload) independent
//! of insertion order.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ThumbnailError;
use crate::geometry::{CropAlign, CropBox, CropMode};

/// Default output format.
pub const DEFAULT_FORMAT: ThumbnailFormat = ThumbnailFormat::Jpeg;

/// Default output quality (1-100).
pub const DEFAULT_QUALITY: u8 = 95;

/// Minimum allowed quality.
pub const MIN_QUALITY: u8 = 1;

/// Maximum allowed quality.
pub const MAX_QUALITY: u8 = 100;

/// Options that only enter a request (and its key) when set to something
/// other than their built-in default, which is `true` for all of them.
pub const EXTRA_OPTIONS: &[&str] = &["orientation", "progressive"];

// =============================================================================
// Option Value
// =============================================================================

/// A single option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl OptionValue {
    /// Parse a command-line or query-string value: booleans and integers are
    /// recognized, anything else is kept as a string.
    pub fn parse_loose(value: &str) -> Self {
        match value {
            "true" => OptionValue::Bool(true),
            "false" => OptionValue::Bool(false),
            _ => match value.parse::<i64>() {
                Ok(n) => OptionValue::Int(n),
                Err(_) => OptionValue::Str(value.to_string()),
            },
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Int(value as i64)
    }
}

impl From<u8> for OptionValue {
    fn from(value: u8) -> Self {
        OptionValue::Int(value as i64)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(n) => write!(f, "{}", n),
            OptionValue::Str(s) => write!(f, "{}", s),
        }
    }
}

// =============================================================================
// Output Format
// =============================================================================

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbnailFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ThumbnailFormat {
    /// Option value for this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Gif => "GIF",
            Self::Webp => "WEBP",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }

    /// Detect a format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Map a decoder-reported format.
    pub fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Gif => Some(Self::Gif),
            image::ImageFormat::WebP => Some(Self::Webp),
            _ => None,
        }
    }
}

impl FromStr for ThumbnailFormat {
    type Err = ThumbnailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "JPEG" | "JPG" => Ok(Self::Jpeg),
            "PNG" => Ok(Self::Png),
            "GIF" => Ok(Self::Gif),
            "WEBP" => Ok(Self::Webp),
            _ => Err(ThumbnailError::invalid_option(
                "format",
                format!("unknown format: {}", s),
            )),
        }
    }
}

impl fmt::Display for ThumbnailFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Options
// =============================================================================

/// Named transform parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(BTreeMap<String, OptionValue>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Set an option only if it is not already present.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.0.iter()
    }

    /// Canonical JSON serialization (keys sorted).
    pub fn to_canonical_json(&self) -> Result<String, ThumbnailError> {
        serde_json::to_string(&self.0)
            .map_err(|e| ThumbnailError::invalid_option("*", e.to_string()))
    }

    // -------------------------------------------------------------------------
    // Typed accessors
    // -------------------------------------------------------------------------

    pub fn format(&self) -> Result<ThumbnailFormat, ThumbnailError> {
        match self.get("format") {
            None => Ok(DEFAULT_FORMAT),
            Some(OptionValue::Str(s)) => s.parse(),
            Some(other) => Err(ThumbnailError::invalid_option(
                "format",
                format!("expected a format name, got {}", other),
            )),
        }
    }

    pub fn quality(&self) -> Result<u8, ThumbnailError> {
        match self.get("quality") {
            None => Ok(DEFAULT_QUALITY),
            Some(OptionValue::Int(q)) if (MIN_QUALITY as i64..=MAX_QUALITY as i64).contains(q) => {
                Ok(*q as u8)
            }
            Some(other) => Err(ThumbnailError::invalid_option(
                "quality",
                format!("must be an integer between 1 and 100, got {}", other),
            )),
        }
    }

    pub fn upscale(&self) -> Result<bool, ThumbnailError> {
        self.flag("upscale", true)
    }

    pub fn orientation(&self) -> Result<bool, ThumbnailError> {
        self.flag("orientation", true)
    }

    pub fn progressive(&self) -> Result<bool, ThumbnailError> {
        self.flag("progressive", true)
    }

    /// The `crop` option: `false`, `true` (center), `"noop"` or an alignment.
    pub fn crop(&self) -> Result<CropMode, ThumbnailError> {
        match self.get("crop") {
            None | Some(OptionValue::Bool(false)) => Ok(CropMode::Disabled),
            Some(OptionValue::Bool(true)) => Ok(CropMode::Align(CropAlign::CENTER)),
            Some(OptionValue::Str(s)) if s == "noop" => Ok(CropMode::Noop),
            Some(OptionValue::Str(s)) => Ok(CropMode::Align(CropAlign::parse(s)?)),
            Some(other) => Err(ThumbnailError::invalid_option(
                "crop",
                format!("unrecognized crop option: {}", other),
            )),
        }
    }

    /// The `cropbox` option, `"x,y,x2,y2"` in source coordinates.
    pub fn cropbox(&self) -> Result<Option<CropBox>, ThumbnailError> {
        match self.get("cropbox") {
            None => Ok(None),
            Some(OptionValue::Str(s)) => CropBox::parse(s).map(Some),
            Some(other) => Err(ThumbnailError::invalid_option(
                "cropbox",
                format!("expected \"x,y,x2,y2\", got {}", other),
            )),
        }
    }

    /// Check every recognized option parses.
    pub fn validate(&self) -> Result<(), ThumbnailError> {
        self.format()?;
        self.quality()?;
        self.upscale()?;
        self.orientation()?;
        self.progressive()?;
        self.crop()?;
        self.cropbox()?;
        Ok(())
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ThumbnailError> {
        match self.get(key) {
            None => Ok(default),
            Some(OptionValue::Bool(b)) => Ok(*b),
            Some(other) => Err(ThumbnailError::invalid_option(
                key,
                format!("expected true or false, got {}", other),
            )),
        }
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for Options {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Built-in default for an extra option, if `key` is one.
pub fn extra_option_default(key: &str) -> Option<OptionValue> {
    EXTRA_OPTIONS
        .contains(&key)
        .then_some(OptionValue::Bool(true))
}

// =============================================================================
// Tests
// =============================================================================
