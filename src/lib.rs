//! # lazythumb
//!
//! Lazy thumbnail generation over object storage.
//!
//! A thumbnail request is a source image, a geometry string and a set of
//! transform options. The library derives a deterministic cache key for each
//! request, renders the thumbnail at most once into object storage, and can
//! defer the rendering to first fetch behind a signed URL.
//!
//! ## Features
//!
//! - **Deterministic keys**: the same source, geometry and options always map
//!   to the same storage name
//! - **Geometry engine**: `WxH`, `W` and `xH` geometries with crop alignment,
//!   crop boxes and upscale control
//! - **Deferred rendering**: header-only size computation and HMAC-SHA256
//!   signed render URLs
//! - **Storage adapters**: S3 (and S3-compatible services) or a local directory
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`geometry`] - Geometry parsing and crop/scale arithmetic
//! - [`engine`] - Image engines and the transform pipeline
//! - [`thumbnail`] - Options, cache keys, metadata cache, signing and the service
//! - [`io`] - Source and object storage adapters
//! - [`server`] - Axum-based render endpoint
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lazythumb::io::{LocalStorage, SourceRef};
//! use lazythumb::thumbnail::{LazyThumbnailService, MemoryKvStore, Options, ThumbnailSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lazythumb::ThumbnailError> {
//!     let storage = Arc::new(LocalStorage::new("/srv/media", "https://media.example.com/"));
//!     let service = LazyThumbnailService::new(
//!         storage.clone(),
//!         Arc::new(MemoryKvStore::new()),
//!         storage,
//!         ThumbnailSettings::default(),
//!     );
//!
//!     let mut options = Options::new();
//!     options.insert("crop", "center");
//!     let source = SourceRef::key("photos/cat.jpg");
//!
//!     if let Some(thumbnail) = service.get_thumbnail(Some(&source), "200x200", options).await? {
//!         println!("{:?} {:?}", thumbnail.url, thumbnail.size);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod io;
pub mod server;
pub mod thumbnail;

// Re-export commonly used types
pub use config::{Cli, Command, ServeConfig, SignConfig, SignOutputFormat, StorageBackend};
pub use engine::{
    Engine, ImageHandle, ImageInfo, MetadataEngine, PlaceholderImage, RasterEngine, RasterImage,
    Step, TransformPipeline, STEPS,
};
pub use error::{IoError, ThumbnailError};
pub use geometry::{plan, resolve, CropAlign, CropBox, CropMode, Geometry, Offset, Resolution};
pub use io::{
    create_s3_client, LocalStorage, ObjectMetadata, ObjectStore, S3Storage, SourceRef,
    SourceStore,
};
pub use server::{
    create_router, health_handler, render_handler, AppState, ErrorResponse, HealthResponse,
    RouterConfig,
};
pub use thumbnail::{
    CacheKey, CacheKeyBuilder, DeferredUrlSigner, KeyValueStore, LazyThumbnailService,
    MemoryKvStore, OptionValue, Options, SignedPayload, SourceRecord, Thumbnail, ThumbnailCache,
    ThumbnailFormat, ThumbnailRecord, ThumbnailSettings, ThumbnailStatus,
};
