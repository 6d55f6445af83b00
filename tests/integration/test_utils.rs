//! Test utilities for integration tests.
//!
//! This module provides in-memory stores that count the calls made against
//! them, and helpers that encode test images in-process.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};
use tokio::sync::RwLock;

use lazythumb::error::IoError;
use lazythumb::io::{ObjectMetadata, ObjectStore, SourceRef, SourceStore};
use lazythumb::thumbnail::{
    KeyValueStore, LazyThumbnailService, MemoryKvStore, ThumbnailSettings,
};

/// Public URL prefix of [`MockObjectStore`].
pub const STORAGE_URL: &str = "https://cdn.test/";

/// Secret shared by deferred-mode tests.
pub const TEST_SECRET: &str = "integration-secret";

// =============================================================================
// Mock Source Store
// =============================================================================

/// A source store serving pre-configured images, tracking reads.
#[derive(Default)]
pub struct MockSourceStore {
    sources: HashMap<SourceRef, Bytes>,
    failures: HashMap<SourceRef, IoError>,
    open_count: AtomicUsize,
}

impl MockSourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: SourceRef, data: Vec<u8>) -> Self {
        self.sources.insert(source, Bytes::from(data));
        self
    }

    /// Make reads of `source` fail with `error`.
    pub fn with_failure(mut self, source: SourceRef, error: IoError) -> Self {
        self.failures.insert(source, error);
        self
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceStore for MockSourceStore {
    fn supports(&self, source: &SourceRef) -> bool {
        !matches!(source, SourceRef::Path(_))
    }

    async fn open(&self, source: &SourceRef) -> Result<Bytes, IoError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.get(source) {
            return Err(error.clone());
        }
        self.sources
            .get(source)
            .cloned()
            .ok_or_else(|| IoError::NotFound(source.to_string()))
    }

    fn url(&self, source: &SourceRef) -> String {
        format!("mock://{}", source.value())
    }
}

// =============================================================================
// Mock Object Store
// =============================================================================

/// An in-memory object store, tracking writes.
#[derive(Default)]
pub struct MockObjectStore {
    objects: RwLock<HashMap<String, (Bytes, ObjectMetadata)>>,
    write_count: AtomicUsize,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn get(&self, name: &str) -> Option<(Bytes, ObjectMetadata)> {
        self.objects.read().await.get(name).cloned()
    }

    /// Put an object in place without counting it as a write.
    pub async fn preload(&self, name: &str) {
        let metadata = ObjectMetadata {
            content_type: "image/jpeg".to_string(),
            width: 1,
            height: 1,
        };
        self.objects
            .write()
            .await
            .insert(name.to_string(), (Bytes::from_static(b"existing"), metadata));
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn exists(&self, name: &str) -> Result<bool, IoError> {
        Ok(self.objects.read().await.contains_key(name))
    }

    async fn write(
        &self,
        name: &str,
        data: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), IoError> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        self.objects
            .write()
            .await
            .insert(name.to_string(), (data, metadata.clone()));
        Ok(())
    }

    fn url(&self, name: &str) -> String {
        format!("{}{}", STORAGE_URL, name)
    }
}

// =============================================================================
// Counting KV Store
// =============================================================================

/// A memory KV store that counts writes per entry kind.
#[derive(Default)]
pub struct CountingKvStore {
    inner: MemoryKvStore,
    thumbnail_sets: AtomicUsize,
    total_sets: AtomicUsize,
}

impl CountingKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes of thumbnail records.
    pub fn thumbnail_sets(&self) -> usize {
        self.thumbnail_sets.load(Ordering::SeqCst)
    }

    /// All writes, source records included.
    pub fn total_sets(&self) -> usize {
        self.total_sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for CountingKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, IoError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), IoError> {
        self.total_sets.fetch_add(1, Ordering::SeqCst);
        if key.starts_with("thumbnail:") {
            self.thumbnail_sets.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.set(key, value).await
    }
}

// =============================================================================
// Test Harness
// =============================================================================

/// A service wired to mock stores, with handles kept for assertions.
pub struct TestHarness {
    pub sources: Arc<MockSourceStore>,
    pub storage: Arc<MockObjectStore>,
    pub kv: Arc<CountingKvStore>,
    pub service: LazyThumbnailService,
}

impl TestHarness {
    pub fn new(sources: MockSourceStore, settings: ThumbnailSettings) -> Self {
        let sources = Arc::new(sources);
        let storage = Arc::new(MockObjectStore::new());
        let kv = Arc::new(CountingKvStore::new());
        let service =
            LazyThumbnailService::new(sources.clone(), kv.clone(), storage.clone(), settings);
        Self {
            sources,
            storage,
            kv,
            service,
        }
    }
}

/// Settings for deferred mode against `server_url`.
pub fn deferred_settings(server_url: &str) -> ThumbnailSettings {
    ThumbnailSettings {
        server_url: Some(server_url.to_string()),
        secret: TEST_SECRET.to_string(),
        ..ThumbnailSettings::default()
    }
}

/// Settings for immediate mode with the test secret.
pub fn immediate_settings() -> ThumbnailSettings {
    ThumbnailSettings {
        secret: TEST_SECRET.to_string(),
        ..ThumbnailSettings::default()
    }
}

// =============================================================================
// Test Image Creation
// =============================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

/// Create a test RGB JPEG image.
pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 90);
    encoder.encode_image(&img).unwrap();
    buf
}

/// Create a test RGB PNG image.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Decode stored bytes and return their dimensions.
pub fn decoded_size(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}

/// Extract the token from a deferred URL.
pub fn token_from_url(url: &str) -> &str {
    let (_, token) = url.rsplit_once("/hash/").unwrap();
    token
}
