use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::{ObjectMetadata, ObjectStore, SourceRef, SourceStore};
use crate::error::IoError;

/// S3-backed source and thumbnail storage.
///
/// Source references are resolved as follows:
/// - `Key(k)` reads object `k` from the bucket
/// - `Url(u)` reads the object if `u` lives under `s3://{bucket}/` or under
///   the configured public base URL
/// - `Path(_)` is not supported
///
/// Thumbnails are written into the same bucket and exposed under the public
/// base URL.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3Storage {
    /// Create a storage for `bucket`. `public_base_url` is the URL prefix the
    /// bucket's objects are served from (e.g. `https://cdn.example.com/`).
    pub fn new(client: Client, bucket: String, public_base_url: impl Into<String>) -> Self {
        let mut public_base_url = public_base_url.into();
        if !public_base_url.ends_with('/') {
            public_base_url.push('/');
        }
        Self {
            client,
            bucket,
            public_base_url,
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Map a source reference to an object key in this bucket.
    fn object_key(&self, source: &SourceRef) -> Option<String> {
        match source {
            SourceRef::Key(key) => Some(key.clone()),
            SourceRef::Url(url) => {
                let s3_prefix = format!("s3://{}/", self.bucket);
                url.strip_prefix(&s3_prefix)
                    .or_else(|| url.strip_prefix(&self.public_base_url))
                    .filter(|key| !key.is_empty())
                    .map(str::to_string)
            }
            SourceRef::Path(_) => None,
        }
    }

    fn identifier(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl SourceStore for S3Storage {
    fn supports(&self, source: &SourceRef) -> bool {
        self.object_key(source).is_some()
    }

    async fn open(&self, source: &SourceRef) -> Result<Bytes, IoError> {
        let key = self
            .object_key(source)
            .ok_or_else(|| IoError::Unsupported(source.identity()))?;

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                if is_not_found || status_is_404 {
                    IoError::NotFound(self.identifier(&key))
                } else {
                    IoError::Storage(e.to_string())
                }
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?
            .into_bytes();

        Ok(data)
    }

    fn url(&self, source: &SourceRef) -> String {
        match self.object_key(source) {
            Some(key) => format!("{}{}", self.public_base_url, key),
            None => source.value().to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn exists(&self, name: &str) -> Result<bool, IoError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false);
                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                if is_not_found || status_is_404 {
                    Ok(false)
                } else {
                    Err(IoError::Storage(e.to_string()))
                }
            }
        }
    }

    async fn write(
        &self,
        name: &str,
        data: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), IoError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .content_type(&metadata.content_type)
            .metadata("width", metadata.width.to_string())
            .metadata("height", metadata.height.to_string())
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| IoError::Storage(e.to_string()))?;
        Ok(())
    }

    fn url(&self, name: &str) -> String {
        format!("{}{}", self.public_base_url, name)
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services usually need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
