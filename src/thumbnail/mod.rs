//! Thumbnail resolution.
//!
//! This module ties the geometry arithmetic and image engines to storage:
//!
//! - [`Options`] and [`ThumbnailSettings`]: request parameters and their defaults
//! - [`CacheKeyBuilder`]: deterministic keys and storage names
//! - [`ThumbnailCache`]: metadata records over a [`KeyValueStore`]
//! - [`DeferredUrlSigner`]: signed render tokens
//! - [`LazyThumbnailService`]: the request flow

mod cache;
mod key;
mod options;
mod service;
mod settings;
mod signing;

pub use cache::{
    KeyValueStore, MemoryKvStore, SourceRecord, ThumbnailCache, ThumbnailRecord,
    DEFAULT_KV_CAPACITY,
};
pub use key::{source_key, CacheKey, CacheKeyBuilder};
pub use options::{
    extra_option_default, OptionValue, Options, ThumbnailFormat, DEFAULT_FORMAT,
    DEFAULT_QUALITY, EXTRA_OPTIONS, MAX_QUALITY, MIN_QUALITY,
};
pub use service::{LazyThumbnailService, Thumbnail, ThumbnailStatus};
pub use settings::{
    default_options, ThumbnailSettings, DEFAULT_DUMMY_RATIO, DEFAULT_DUMMY_SOURCE,
    DEFAULT_PREFIX,
};
pub use signing::{validate_server_url, DeferredUrlSigner, SignedPayload, RENDER_PATH};
