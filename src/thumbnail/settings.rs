//! Deployment settings for thumbnail generation.

use tracing::debug;

use crate::io::SourceRef;

use super::options::{
    extra_option_default, Options, ThumbnailFormat, DEFAULT_FORMAT, DEFAULT_QUALITY,
};

/// Default aspect ratio (width / height) for dummy images when only one
/// dimension is requested.
pub const DEFAULT_DUMMY_RATIO: f64 = 1.5;

/// Default placeholder URL template.
pub const DEFAULT_DUMMY_SOURCE: &str = "http://dummyimage.com/{width}x{height}";

/// Default storage prefix for generated thumbnails.
pub const DEFAULT_PREFIX: &str = "cache/";

/// Settings shared by every request handled by a service instance.
#[derive(Debug, Clone)]
pub struct ThumbnailSettings {
    /// Return placeholder images when a source is missing or unreadable
    pub dummy: bool,

    /// Placeholder URL template with `{width}` and `{height}` placeholders
    pub dummy_source: String,

    /// Aspect ratio used to complete single-dimension dummy geometries
    pub dummy_ratio: f64,

    /// Regenerate even when the thumbnail already exists in storage
    pub force_overwrite: bool,

    /// Default the output format to the source's format
    pub preserve_format: bool,

    /// Base URL of the deferred-render endpoint; deferred mode when set
    pub server_url: Option<String>,

    /// HMAC secret for deferred-render tokens
    pub secret: String,

    /// Storage prefix for generated thumbnails
    pub prefix: String,

    /// Defaults applied to every request
    pub defaults: Options,

    /// Deployment values for extra options; only non-default values apply
    pub extra: Options,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            dummy: false,
            dummy_source: DEFAULT_DUMMY_SOURCE.to_string(),
            dummy_ratio: DEFAULT_DUMMY_RATIO,
            force_overwrite: false,
            preserve_format: false,
            server_url: None,
            secret: String::new(),
            prefix: DEFAULT_PREFIX.to_string(),
            defaults: default_options(),
            extra: Options::new(),
        }
    }
}

impl ThumbnailSettings {
    /// Whether requests produce signed deferred URLs instead of rendering.
    pub fn is_deferred(&self) -> bool {
        self.server_url.is_some()
    }

    /// Merge the caller's options with the configured defaults.
    ///
    /// Explicit options always win. With `preserve_format`, the source's
    /// format becomes the default output format. Extra options are only added
    /// when configured to something other than their built-in default, so a
    /// deployment that spells out a default produces the same keys as one
    /// that doesn't.
    pub fn merge_options(&self, explicit: Options, source: &SourceRef) -> Options {
        let mut options = explicit;

        if self.preserve_format {
            if let Some(format) = source
                .extension()
                .as_deref()
                .and_then(ThumbnailFormat::from_extension)
            {
                options.set_default("format", format.as_str());
            } else {
                debug!(source = %source, "Could not detect source format, using default");
            }
        }

        for (key, value) in self.defaults.iter() {
            options.set_default(key.as_str(), value.clone());
        }

        for (key, value) in self.extra.iter() {
            if extra_option_default(key).as_ref() != Some(value) {
                options.set_default(key.as_str(), value.clone());
            }
        }

        options
    }

    /// Placeholder URL for a `width`x`height` dummy.
    pub fn dummy_url(&self, width: u32, height: u32) -> String {
        self.dummy_source
            .replace("{width}", &width.to_string())
            .replace("{height}", &height.to_string())
    }
}

/// Built-in instance defaults.
pub fn default_options() -> Options {
    let mut options = Options::new();
    options.insert("format", DEFAULT_FORMAT.as_str());
    options.insert("quality", DEFAULT_QUALITY);
    options.insert("upscale", true);
    options.insert("crop", false);
    options
}
