//! Signed tokens for deferred rendering.
//!
//! In deferred mode the service hands out URLs that point at the render
//! endpoint instead of rendering inline. The URL carries everything needed to
//! render later, signed so the endpoint only renders what this deployment
//! asked for.
//!
//! # Token Format
//!
//! ```text
//! payload   = base64url(json({"source": .., "geometry": .., "options": ..}))
//! signature = base64url(HMAC-SHA256(secret, "lazythumb.render" + payload))
//! token     = "{payload}:{signature}"
//! ```
//!
//! The JSON has sorted option keys, so equal requests yield byte-identical
//! tokens. Tokens do not expire: what they grant (rendering one thumbnail
//! that would be rendered anyway) is idempotent.
//!
//! # Example
//!
//! ```rust
//! use lazythumb::thumbnail::{DeferredUrlSigner, Options, SignedPayload};
//! use lazythumb::io::SourceRef;
//!
//! let signer = DeferredUrlSigner::new("my-secret-key");
//! let payload = SignedPayload::new(SourceRef::key("a.jpg"), "200x200", Options::new());
//!
//! let token = signer.sign(&payload).unwrap();
//! assert_eq!(signer.verify(&token).unwrap(), payload);
//! ```

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;
use url::Url;

use crate::error::ThumbnailError;
use crate::io::SourceRef;

use super::options::Options;

/// HMAC-SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Salt mixed into every signature so tokens cannot be replayed against
/// other HMAC users sharing the secret.
const SIGNING_SALT: &[u8] = b"lazythumb.render";

/// Path of the render endpoint, relative to the server URL.
pub const RENDER_PATH: &str = "hash/";

// =============================================================================
// Payload
// =============================================================================

/// The request carried by a deferred-render token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    pub source: SourceRef,
    pub geometry: String,
    pub options: Options,
}

impl SignedPayload {
    pub fn new(source: SourceRef, geometry: impl Into<String>, options: Options) -> Self {
        Self {
            source,
            geometry: geometry.into(),
            options,
        }
    }
}

// =============================================================================
// Signer
// =============================================================================

/// Signs and verifies deferred-render tokens.
#[derive(Clone)]
pub struct DeferredUrlSigner {
    /// Secret key for HMAC computation
    secret_key: Vec<u8>,
}

impl DeferredUrlSigner {
    /// Create a signer with the given secret key.
    pub fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
        }
    }

    /// Sign a payload into a URL-safe token.
    pub fn sign(&self, payload: &SignedPayload) -> Result<String, ThumbnailError> {
        let json = serde_json::to_vec(payload)
            .map_err(|e| ThumbnailError::invalid_option("*", e.to_string()))?;
        let encoded = URL_SAFE_NO_PAD.encode(json);
        let signature = self.compute_signature(&encoded);
        Ok(format!("{}:{}", encoded, signature))
    }

    /// Verify a token and recover its payload.
    ///
    /// Any malformed, tampered or foreign token yields `InvalidSignature`;
    /// the cause is only logged.
    pub fn verify(&self, token: &str) -> Result<SignedPayload, ThumbnailError> {
        let (encoded, signature) = token.rsplit_once(':').ok_or_else(|| {
            debug!("Token has no signature separator");
            ThumbnailError::InvalidSignature
        })?;

        let expected = self.compute_signature(encoded);
        if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            debug!("Token signature mismatch");
            return Err(ThumbnailError::InvalidSignature);
        }

        let json = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
            debug!(error = %e, "Token payload is not base64");
            ThumbnailError::InvalidSignature
        })?;
        serde_json::from_slice(&json).map_err(|e| {
            debug!(error = %e, "Token payload is not a render request");
            ThumbnailError::InvalidSignature
        })
    }

    /// Build the deferred URL for a token.
    ///
    /// # Errors
    ///
    /// `InvalidServerUrl` unless `server_url` starts with `http` and ends
    /// with `/`.
    pub fn deferred_url(&self, server_url: &str, token: &str) -> Result<String, ThumbnailError> {
        let base = validate_server_url(server_url)?;
        let render = base
            .join(RENDER_PATH)
            .map_err(|_| ThumbnailError::InvalidServerUrl {
                url: server_url.to_string(),
            })?;
        Ok(format!("{}{}", render, token))
    }

    /// Compute the base64url HMAC-SHA256 signature of an encoded payload.
    fn compute_signature(&self, encoded_payload: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(SIGNING_SALT);
        mac.update(encoded_payload.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

/// Check that a server URL can prefix deferred URLs.
pub fn validate_server_url(server_url: &str) -> Result<Url, ThumbnailError> {
    let invalid = || ThumbnailError::InvalidServerUrl {
        url: server_url.to_string(),
    };
    if !server_url.starts_with("http") || !server_url.ends_with('/') {
        return Err(invalid());
    }
    Url::parse(server_url).map_err(|_| invalid())
}

// =============================================================================
// Tests
// =============================================================================
