//! Configuration management for lazythumb.
//!
//! This module provides the command-line interface:
//! - Command-line arguments via clap
//! - Environment variables with `LAZYTHUMB_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Commands
//!
//! - `serve`: run the deferred-render endpoint
//! - `sign`: print a signed deferred URL for a single request
//!
//! # Environment Variables
//!
//! - `LAZYTHUMB_HOST` - Server bind address (default: 0.0.0.0)
//! - `LAZYTHUMB_PORT` - Server port (default: 3000)
//! - `LAZYTHUMB_S3_BUCKET` - S3 bucket holding sources and thumbnails
//! - `LAZYTHUMB_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `LAZYTHUMB_S3_REGION` - AWS region (default: us-east-1)
//! - `LAZYTHUMB_LOCAL_ROOT` - Serve from a local directory instead of S3
//! - `LAZYTHUMB_PUBLIC_BASE_URL` - URL prefix thumbnails are served from
//! - `LAZYTHUMB_SECRET` - HMAC secret for deferred-render tokens
//! - `LAZYTHUMB_SERVER_URL` - Base URL of the render endpoint
//! - `LAZYTHUMB_PREFIX` - Storage prefix for thumbnails (default: cache/)
//! - `LAZYTHUMB_KV_CAPACITY` - Max metadata records kept in memory (default: 10000)
//! - `LAZYTHUMB_QUALITY` - Default output quality (default: 95)
//! - `LAZYTHUMB_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::geometry::Geometry;
use crate::io::SourceRef;
use crate::server::DEFAULT_CACHE_MAX_AGE;
use crate::thumbnail::{
    default_options, OptionValue, Options, ThumbnailFormat, ThumbnailSettings,
    DEFAULT_DUMMY_RATIO, DEFAULT_DUMMY_SOURCE, DEFAULT_FORMAT, DEFAULT_KV_CAPACITY,
    DEFAULT_PREFIX, DEFAULT_QUALITY, MAX_QUALITY, MIN_QUALITY,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

// =============================================================================
// CLI Arguments
// =============================================================================

/// lazythumb - Lazy thumbnail generation.
///
/// Derives deterministic cache keys for thumbnail requests, renders them into
/// object storage, and serves signed deferred-render URLs.
#[derive(Parser, Debug, Clone)]
#[command(name = "lazythumb")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the deferred-render HTTP server
    Serve(ServeConfig),

    /// Print a signed deferred-render URL
    Sign(SignConfig),
}

// =============================================================================
// Serve Configuration
// =============================================================================

/// Storage backend selected by the serve flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    S3 {
        bucket: String,
        endpoint: Option<String>,
        region: String,
        public_base_url: String,
    },
    Local {
        root: PathBuf,
        public_base_url: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "LAZYTHUMB_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "LAZYTHUMB_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// S3 bucket holding source images and generated thumbnails.
    #[arg(long, env = "LAZYTHUMB_S3_BUCKET", conflicts_with = "local_root")]
    pub s3_bucket: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "LAZYTHUMB_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "LAZYTHUMB_S3_REGION")]
    pub s3_region: String,

    /// Local directory holding source images and generated thumbnails.
    #[arg(long, env = "LAZYTHUMB_LOCAL_ROOT")]
    pub local_root: Option<PathBuf>,

    /// URL prefix generated thumbnails are served from.
    ///
    /// Required for local storage; defaults to the bucket's AWS URL for S3.
    #[arg(long, env = "LAZYTHUMB_PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    // =========================================================================
    // Thumbnail Configuration
    // =========================================================================
    /// Secret key for HMAC-SHA256 signed render tokens.
    #[arg(long, env = "LAZYTHUMB_SECRET")]
    pub secret: Option<String>,

    /// Base URL of the render endpoint, ending with `/`.
    ///
    /// Also decides the path the render route is mounted under.
    #[arg(long, env = "LAZYTHUMB_SERVER_URL")]
    pub server_url: Option<String>,

    /// Storage prefix for generated thumbnails.
    #[arg(long, default_value = DEFAULT_PREFIX, env = "LAZYTHUMB_PREFIX")]
    pub prefix: String,

    /// Default output format (JPEG, PNG, GIF, WEBP).
    #[arg(long, default_value = "JPEG", env = "LAZYTHUMB_FORMAT")]
    pub format: String,

    /// Default output quality (1-100).
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "LAZYTHUMB_QUALITY")]
    pub quality: u8,

    /// Default the output format to the source's format.
    #[arg(long, default_value_t = false, env = "LAZYTHUMB_PRESERVE_FORMAT")]
    pub preserve_format: bool,

    /// Render even when the thumbnail already exists in storage.
    #[arg(long, default_value_t = false, env = "LAZYTHUMB_FORCE_OVERWRITE")]
    pub force_overwrite: bool,

    /// Skip EXIF orientation correction.
    #[arg(long, default_value_t = false, env = "LAZYTHUMB_NO_ORIENTATION")]
    pub no_orientation: bool,

    /// Disable progressive JPEG output.
    #[arg(long, default_value_t = false, env = "LAZYTHUMB_NO_PROGRESSIVE")]
    pub no_progressive: bool,

    /// Return placeholder images for missing sources.
    #[arg(long, default_value_t = false, env = "LAZYTHUMB_DUMMY")]
    pub dummy: bool,

    /// Placeholder URL template with `{width}` and `{height}`.
    #[arg(long, default_value = DEFAULT_DUMMY_SOURCE, env = "LAZYTHUMB_DUMMY_SOURCE")]
    pub dummy_source: String,

    /// Aspect ratio for single-dimension placeholder geometries.
    #[arg(long, default_value_t = DEFAULT_DUMMY_RATIO, env = "LAZYTHUMB_DUMMY_RATIO")]
    pub dummy_ratio: f64,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Maximum number of metadata records kept in memory.
    #[arg(long, default_value_t = DEFAULT_KV_CAPACITY, env = "LAZYTHUMB_KV_CAPACITY")]
    pub kv_capacity: usize,

    /// HTTP Cache-Control max-age in seconds for render redirects.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "LAZYTHUMB_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "LAZYTHUMB_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    ///
    /// The server URL is not checked here: an unusable one only fails the
    /// requests that need it.
    pub fn validate(&self) -> Result<(), String> {
        self.backend()?;

        if self.secret.as_deref().map_or(true, str::is_empty) {
            return Err(
                "No signing secret provided. Set --secret or LAZYTHUMB_SECRET".to_string(),
            );
        }

        if self.kv_capacity == 0 {
            return Err("kv_capacity must be greater than 0".to_string());
        }

        if !(MIN_QUALITY..=MAX_QUALITY).contains(&self.quality) {
            return Err(format!(
                "quality must be between {} and {}",
                MIN_QUALITY, MAX_QUALITY
            ));
        }

        ThumbnailFormat::from_str(&self.format).map_err(|e| e.to_string())?;

        if !(self.dummy_ratio.is_finite() && self.dummy_ratio > 0.0) {
            return Err("dummy_ratio must be a positive number".to_string());
        }

        Ok(())
    }

    /// Resolve the storage backend from the flags.
    pub fn backend(&self) -> Result<StorageBackend, String> {
        match (&self.s3_bucket, &self.local_root) {
            (Some(bucket), None) if !bucket.is_empty() => {
                let public_base_url = self.public_base_url.clone().unwrap_or_else(|| {
                    format!("https://{}.s3.{}.amazonaws.com/", bucket, self.s3_region)
                });
                Ok(StorageBackend::S3 {
                    bucket: bucket.clone(),
                    endpoint: self.s3_endpoint.clone(),
                    region: self.s3_region.clone(),
                    public_base_url,
                })
            }
            (None, Some(root)) => match &self.public_base_url {
                Some(public_base_url) => Ok(StorageBackend::Local {
                    root: root.clone(),
                    public_base_url: public_base_url.clone(),
                }),
                None => Err(
                    "Local storage needs --public-base-url or LAZYTHUMB_PUBLIC_BASE_URL"
                        .to_string(),
                ),
            },
            (Some(_), Some(_)) => {
                Err("Set either --s3-bucket or --local-root, not both".to_string())
            }
            _ => Err(
                "No storage configured. Set --s3-bucket (LAZYTHUMB_S3_BUCKET) \
                 or --local-root (LAZYTHUMB_LOCAL_ROOT)"
                    .to_string(),
            ),
        }
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Path the render route is mounted under, taken from the server URL.
    pub fn base_path(&self) -> String {
        self.server_url
            .as_deref()
            .and_then(|u| url::Url::parse(u).ok())
            .map(|u| u.path().to_string())
            .unwrap_or_else(|| "/".to_string())
    }

    /// Build the service settings from the flags.
    pub fn settings(&self) -> ThumbnailSettings {
        let mut defaults = default_options();
        let format = ThumbnailFormat::from_str(&self.format).unwrap_or(DEFAULT_FORMAT);
        defaults.insert("format", format.as_str());
        defaults.insert("quality", self.quality);

        let mut extra = Options::new();
        extra.insert("orientation", !self.no_orientation);
        extra.insert("progressive", !self.no_progressive);

        ThumbnailSettings {
            dummy: self.dummy,
            dummy_source: self.dummy_source.clone(),
            dummy_ratio: self.dummy_ratio,
            force_overwrite: self.force_overwrite,
            preserve_format: self.preserve_format,
            server_url: self.server_url.clone(),
            secret: self.secret.clone().unwrap_or_default(),
            prefix: self.prefix.clone(),
            defaults,
            extra,
        }
    }
}

// =============================================================================
// Sign Configuration
// =============================================================================

/// Output of the `sign` command.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignOutputFormat {
    /// Full deferred-render URL
    #[default]
    Url,
    /// Token only
    Token,
    /// JSON with token, URL and payload
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct SignConfig {
    /// Source reference: a URL, a path (`/...`, `./...`) or a storage key.
    #[arg(long)]
    pub source: String,

    /// Requested geometry (`200x100`, `200`, `x100`).
    #[arg(long)]
    pub geometry: String,

    /// Transform option as `key=value`; repeatable.
    #[arg(long = "option", short = 'o')]
    pub options: Vec<String>,

    /// Secret key for HMAC-SHA256 signing.
    #[arg(long, env = "LAZYTHUMB_SECRET")]
    pub secret: String,

    /// Base URL of the render endpoint, ending with `/`.
    #[arg(long, env = "LAZYTHUMB_SERVER_URL")]
    pub server_url: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = SignOutputFormat::Url)]
    pub format: SignOutputFormat,
}

impl SignConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("Secret must not be empty".to_string());
        }
        if self.source.is_empty() {
            return Err("Source must not be empty".to_string());
        }
        Geometry::parse(&self.geometry).map_err(|e| e.to_string())?;
        if self.format != SignOutputFormat::Token && self.server_url.is_none() {
            return Err(
                "A server URL is needed to build the URL. Set --server-url or use --format token"
                    .to_string(),
            );
        }
        Ok(())
    }

    /// The source reference.
    pub fn source_ref(&self) -> SourceRef {
        match SourceRef::from_str(&self.source) {
            Ok(source) => source,
            Err(never) => match never {},
        }
    }

    /// Parse the `key=value` option flags.
    pub fn parse_options(&self) -> Result<Options, String> {
        let mut options = Options::new();
        for raw in &self.options {
            let (key, value) = raw
                .split_once('=')
                .ok_or_else(|| format!("Invalid option '{}': expected key=value", raw))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("Invalid option '{}': empty key", raw));
            }
            options.insert(key, OptionValue::parse_loose(value.trim()));
        }
        Ok(options)
    }
}

// =============================================================================
// Tests
// =============================================================================
