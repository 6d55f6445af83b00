//! Lazy thumbnail service.
//!
//! The service is the entry point for thumbnail requests. It orchestrates:
//! - Request validation and option merging
//! - Cache lookups
//! - Source reads and metadata-only or pixel transforms
//! - Storage writes (immediate mode) or signed URLs (deferred mode)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      LazyThumbnailService                         │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                   get_thumbnail()                          │  │
//! │  │  1. Validate geometry      4. Check storage                │  │
//! │  │  2. Merge options, key     5. Read source, run pipeline    │  │
//! │  │  3. Check cache            6. Store, or sign deferred URL  │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │        │                 │                  │                    │
//! │        ▼                 ▼                  ▼                    │
//! │ ┌──────────────┐  ┌─────────────┐  ┌───────────────────┐        │
//! │ │ThumbnailCache│  │ SourceStore │  │ DeferredUrlSigner │        │
//! │ └──────────────┘  └─────────────┘  └───────────────────┘        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modes
//!
//! Without a server URL the service renders inline: pixels are decoded,
//! transformed, encoded and written to storage before it returns.
//!
//! With a server URL it only reads the source header, computes the final size
//! with the same pipeline, and returns a signed URL to the render endpoint.
//! Nothing is written; the endpoint renders on first fetch via
//! [`LazyThumbnailService::render`].
//!
//! Missing or unreadable sources never fail `get_thumbnail`: they resolve to a
//! placeholder when dummies are enabled, and are logged otherwise.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::engine::{
    Engine, ImageHandle, MetadataEngine, RasterEngine, RasterImage, TransformPipeline,
};
use crate::error::{IoError, ThumbnailError};
use crate::geometry::Geometry;
use crate::io::{ObjectMetadata, ObjectStore, SourceRef, SourceStore};

use super::cache::{KeyValueStore, ThumbnailCache, ThumbnailRecord};
use super::key::{CacheKey, CacheKeyBuilder};
use super::options::Options;
use super::settings::ThumbnailSettings;
use super::signing::{validate_server_url, DeferredUrlSigner, SignedPayload};

// =============================================================================
// Thumbnail
// =============================================================================

/// How a thumbnail was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailStatus {
    /// Found in the metadata cache
    Cached,
    /// Rendered and written to storage by this request
    Generated,
    /// Already in storage; not rendered again
    Existing,
    /// Signed URL to the render endpoint; rendered on first fetch
    Deferred,
    /// Placeholder for a missing source
    Dummy,
    /// Source could not be read and dummies are disabled
    NotFound,
}

/// Descriptor of a resolved thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thumbnail {
    /// Cache key; absent for dummies
    pub key: Option<String>,

    /// Storage name; absent for dummies
    pub name: Option<String>,

    pub geometry: String,

    /// Where to fetch the image from
    pub url: Option<String>,

    /// Final pixel dimensions, when known
    pub size: Option<(u32, u32)>,

    pub status: ThumbnailStatus,
}

impl Thumbnail {
    fn from_record(record: ThumbnailRecord, geometry: &str, status: ThumbnailStatus) -> Self {
        Self {
            key: Some(record.key),
            name: Some(record.name),
            geometry: geometry.to_string(),
            url: Some(record.url),
            size: record.size,
            status,
        }
    }

    fn missing(key: &CacheKey, geometry: &str) -> Self {
        Self {
            key: Some(key.key.clone()),
            name: Some(key.name.clone()),
            geometry: geometry.to_string(),
            url: None,
            size: None,
            status: ThumbnailStatus::NotFound,
        }
    }

    pub fn is_dummy(&self) -> bool {
        self.status == ThumbnailStatus::Dummy
    }

    pub fn width(&self) -> Option<u32> {
        self.size.map(|(w, _)| w)
    }

    pub fn height(&self) -> Option<u32> {
        self.size.map(|(_, h)| h)
    }
}

// =============================================================================
// Service
// =============================================================================

/// Resolves thumbnail requests against a source store, object storage and
/// metadata cache.
///
/// # Existing objects
///
/// When the thumbnail's object is already in storage (and `force_overwrite`
/// is off), the storage URL is returned with [`ThumbnailStatus::Existing`]
/// in both modes, without reading the source. Deferred mode does not sign a
/// render URL for it, and no source record is registered because the source
/// size is unknown without a fetch. Immediate mode records the thumbnail so
/// the next request is a cache hit.
///
/// # Example
///
/// ```ignore
/// use lazythumb::thumbnail::{LazyThumbnailService, MemoryKvStore, Options, ThumbnailSettings};
///
/// let service = LazyThumbnailService::new(sources, Arc::new(MemoryKvStore::new()), storage, ThumbnailSettings::default());
///
/// let mut options = Options::new();
/// options.insert("crop", "center");
/// let thumbnail = service.get_thumbnail(Some(&source), "200x200", options).await?;
/// ```
pub struct LazyThumbnailService {
    sources: Arc<dyn SourceStore>,
    cache: ThumbnailCache,
    keys: CacheKeyBuilder,
    signer: DeferredUrlSigner,
    settings: ThumbnailSettings,
    raster: RasterEngine,
    metadata: MetadataEngine,
}

impl LazyThumbnailService {
    pub fn new(
        sources: Arc<dyn SourceStore>,
        kv: Arc<dyn KeyValueStore>,
        storage: Arc<dyn ObjectStore>,
        settings: ThumbnailSettings,
    ) -> Self {
        Self {
            sources,
            cache: ThumbnailCache::new(kv, storage),
            keys: CacheKeyBuilder::new(settings.prefix.clone()),
            signer: DeferredUrlSigner::new(&settings.secret),
            settings,
            raster: RasterEngine::new(),
            metadata: MetadataEngine::new(),
        }
    }

    pub fn settings(&self) -> &ThumbnailSettings {
        &self.settings
    }

    pub fn signer(&self) -> &DeferredUrlSigner {
        &self.signer
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    /// Cache key a request resolves to, after option merging.
    pub fn cache_key(
        &self,
        source: &SourceRef,
        geometry: &str,
        options: Options,
    ) -> Result<CacheKey, ThumbnailError> {
        let options = self.settings.merge_options(options, source);
        self.keys.build(source, geometry, &options)
    }

    /// Resolve a thumbnail.
    ///
    /// Returns `Ok(None)` when there is no usable source and dummies are
    /// disabled.
    ///
    /// # Errors
    ///
    /// - `InvalidGeometry` / `InvalidOptions` for malformed requests
    /// - `TransformFailed` / `EncodeError` if rendering fails
    /// - `InvalidServerUrl` if deferred mode is misconfigured
    /// - `Storage` if the object storage cannot be queried or written
    ///
    /// Source read failures are not errors; see the module docs.
    pub async fn get_thumbnail(
        &self,
        source: Option<&SourceRef>,
        geometry: &str,
        options: Options,
    ) -> Result<Option<Thumbnail>, ThumbnailError> {
        let parsed = Geometry::parse(geometry)?;

        let source = match source {
            Some(source) if self.sources.supports(source) => source,
            Some(source) => {
                return Ok(self.unresolvable(&parsed, geometry, &source.to_string()));
            }
            None => return Ok(self.unresolvable(&parsed, geometry, "no source given")),
        };

        let options = self.settings.merge_options(options, source);
        options.validate()?;
        let key = self.keys.build(source, geometry, &options)?;

        if let Some(record) = self.cache.lookup(&key).await {
            debug!(key = %key, source = %source, "Thumbnail cache hit");
            return Ok(Some(Thumbnail::from_record(
                record,
                geometry,
                ThumbnailStatus::Cached,
            )));
        }

        let thumbnail = match self.settings.server_url.as_deref() {
            Some(server_url) => {
                self.defer(source, &parsed, geometry, options, &key, server_url)
                    .await?
            }
            None => self.generate_inline(source, &parsed, geometry, &options, &key).await?,
        };

        Ok(Some(thumbnail))
    }

    /// Render a thumbnail for the deferred-render endpoint.
    ///
    /// Unlike [`get_thumbnail`](Self::get_thumbnail), source failures are
    /// returned as errors: there is nothing to fall back to.
    pub async fn render(&self, payload: SignedPayload) -> Result<Thumbnail, ThumbnailError> {
        let SignedPayload {
            source,
            geometry,
            options,
        } = payload;

        Geometry::parse(&geometry)?;
        if !self.sources.supports(&source) {
            return Err(ThumbnailError::SourceFetchFailed(IoError::Unsupported(
                source.to_string(),
            )));
        }

        let options = self.settings.merge_options(options, &source);
        options.validate()?;
        let key = self.keys.build(&source, &geometry, &options)?;

        if let Some(record) = self.cache.lookup(&key).await {
            debug!(key = %key, "Render request served from cache");
            return Ok(Thumbnail::from_record(
                record,
                &geometry,
                ThumbnailStatus::Cached,
            ));
        }

        if !self.needs_generation(&key).await? {
            return Ok(self.existing(&key, &geometry).await);
        }

        let bytes = self
            .sources
            .open(&source)
            .await
            .map_err(ThumbnailError::SourceFetchFailed)?;
        let image = self.raster.decode(&bytes)?;

        self.materialize(&source, &geometry, &options, &key, image)
            .await
    }

    /// Verify a deferred-render token and render its request.
    pub async fn render_token(&self, token: &str) -> Result<Thumbnail, ThumbnailError> {
        let payload = self.signer.verify(token)?;
        self.render(payload).await
    }

    // -------------------------------------------------------------------------
    // Modes
    // -------------------------------------------------------------------------

    async fn generate_inline(
        &self,
        source: &SourceRef,
        parsed: &Geometry,
        geometry: &str,
        options: &Options,
        key: &CacheKey,
    ) -> Result<Thumbnail, ThumbnailError> {
        if !self.needs_generation(key).await? {
            return Ok(self.existing(key, geometry).await);
        }

        let bytes = match self.sources.open(source).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let cause = ThumbnailError::SourceFetchFailed(e);
                return Ok(self.fetch_failed(source, parsed, geometry, key, &cause));
            }
        };
        let image = match self.raster.decode(&bytes) {
            Ok(image) => image,
            Err(e) => return Ok(self.fetch_failed(source, parsed, geometry, key, &e)),
        };

        self.materialize(source, geometry, options, key, image).await
    }

    async fn defer(
        &self,
        source: &SourceRef,
        parsed: &Geometry,
        geometry: &str,
        options: Options,
        key: &CacheKey,
        server_url: &str,
    ) -> Result<Thumbnail, ThumbnailError> {
        validate_server_url(server_url)?;

        if !self.needs_generation(key).await? {
            // Deferred mode leaves thumbnail records to the render endpoint
            return Ok(Thumbnail {
                key: Some(key.key.clone()),
                name: Some(key.name.clone()),
                geometry: geometry.to_string(),
                url: Some(self.cache.url(key)),
                size: None,
                status: ThumbnailStatus::Existing,
            });
        }

        let bytes = match self.sources.open(source).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let cause = ThumbnailError::SourceFetchFailed(e);
                return Ok(self.fetch_failed(source, parsed, geometry, key, &cause));
            }
        };
        let placeholder = match self.metadata.decode(&bytes) {
            Ok(placeholder) => placeholder,
            Err(e) => return Ok(self.fetch_failed(source, parsed, geometry, key, &e)),
        };
        drop(bytes);

        self.cache.register_source(source, placeholder.size()).await;
        let placeholder = TransformPipeline::apply(placeholder, geometry, &options)?;
        let size = placeholder.size();

        let payload = SignedPayload::new(source.clone(), geometry, options);
        let token = self.signer.sign(&payload)?;
        let url = self.signer.deferred_url(server_url, &token)?;

        debug!(key = %key, source = %source, width = size.0, height = size.1, "Deferred thumbnail");

        Ok(Thumbnail {
            key: Some(key.key.clone()),
            name: Some(key.name.clone()),
            geometry: geometry.to_string(),
            url: Some(url),
            size: Some(size),
            status: ThumbnailStatus::Deferred,
        })
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    async fn needs_generation(&self, key: &CacheKey) -> Result<bool, ThumbnailError> {
        if self.settings.force_overwrite {
            return Ok(true);
        }
        Ok(!self.cache.exists_in_storage(key).await?)
    }

    /// Run the pipeline on decoded pixels, write the result and record it.
    async fn materialize(
        &self,
        source: &SourceRef,
        geometry: &str,
        options: &Options,
        key: &CacheKey,
        image: RasterImage,
    ) -> Result<Thumbnail, ThumbnailError> {
        self.cache.register_source(source, image.size()).await;

        let image = TransformPipeline::apply(image, geometry, options)?;
        let (width, height) = image.size();
        let data = self.raster.encode(&image, options)?;
        drop(image);

        let metadata = ObjectMetadata {
            content_type: options.format()?.content_type().to_string(),
            width,
            height,
        };
        let bytes_written = data.len();
        self.cache.write(key, data, &metadata).await?;

        let record = ThumbnailRecord {
            key: key.key.clone(),
            name: key.name.clone(),
            url: self.cache.url(key),
            size: Some((width, height)),
            exists: true,
        };
        self.cache.store(&record).await;

        info!(
            key = %key,
            source = %source,
            width = width,
            height = height,
            bytes = bytes_written,
            "Thumbnail generated"
        );

        Ok(Thumbnail::from_record(
            record,
            geometry,
            ThumbnailStatus::Generated,
        ))
    }

    /// Descriptor for a thumbnail already in storage, recorded for next time.
    async fn existing(&self, key: &CacheKey, geometry: &str) -> Thumbnail {
        let record = ThumbnailRecord {
            key: key.key.clone(),
            name: key.name.clone(),
            url: self.cache.url(key),
            size: None,
            exists: true,
        };
        self.cache.store(&record).await;
        debug!(key = %key, "Thumbnail already in storage");
        Thumbnail::from_record(record, geometry, ThumbnailStatus::Existing)
    }

    fn fetch_failed(
        &self,
        source: &SourceRef,
        parsed: &Geometry,
        geometry: &str,
        key: &CacheKey,
        cause: &ThumbnailError,
    ) -> Thumbnail {
        if self.settings.dummy {
            debug!(source = %source, error = %cause, "Source unreadable, returning dummy");
            return self.dummy(parsed, geometry);
        }

        let location = self.sources.url(source);
        if let ThumbnailError::SourceFetchFailed(IoError::NotFound(_)) = cause {
            warn!(
                source = %source,
                location = %location,
                key = %key,
                "Source not found, thumbnail not generated"
            );
        } else {
            error!(
                source = %source,
                location = %location,
                key = %key,
                error = %cause,
                "Source could not be read, thumbnail not generated"
            );
        }
        Thumbnail::missing(key, geometry)
    }

    fn unresolvable(&self, parsed: &Geometry, geometry: &str, reason: &str) -> Option<Thumbnail> {
        if self.settings.dummy {
            return Some(self.dummy(parsed, geometry));
        }
        error!(reason = reason, geometry = geometry, "Missing or unsupported thumbnail source");
        None
    }

    fn dummy(&self, parsed: &Geometry, geometry: &str) -> Thumbnail {
        let (width, height) = parsed.dimensions(self.settings.dummy_ratio);
        Thumbnail {
            key: None,
            name: None,
            geometry: geometry.to_string(),
            url: Some(self.settings.dummy_url(width, height)),
            size: Some((width, height)),
            status: ThumbnailStatus::Dummy,
        }
    }
}
