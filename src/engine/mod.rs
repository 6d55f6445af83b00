//! Image engines and the transform pipeline.
//!
//! An engine turns source bytes into an [`ImageHandle`]. The pipeline drives
//! the handle through the fixed sequence of steps; what a step costs depends on
//! the engine:
//!
//! - [`RasterEngine`] decodes pixels and really crops, rotates and resamples.
//! - [`MetadataEngine`] only reads the header; its handles track dimensions so
//!   the final size is known without touching pixels.
//!
//! Both engines go through the same [`TransformPipeline`], so the size a
//! deferred URL advertises is the size the render endpoint later produces.

mod metadata;
mod pipeline;
mod raster;

pub use metadata::{MetadataEngine, PlaceholderImage};
pub use pipeline::{Step, TransformPipeline, STEPS};
pub use raster::{RasterEngine, RasterImage};

use crate::error::ThumbnailError;
use crate::geometry::CropBox;
use crate::thumbnail::ThumbnailFormat;

/// EXIF orientation value for an upright image.
pub const ORIENTATION_NORMAL: u8 = 1;

/// Metadata carried alongside an image handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Format the source was decoded from, when recognized
    pub format: Option<ThumbnailFormat>,

    /// EXIF orientation (1-8); 1 once the image has been oriented
    pub orientation: u8,
}

impl Default for ImageInfo {
    fn default() -> Self {
        Self {
            format: None,
            orientation: ORIENTATION_NORMAL,
        }
    }
}

impl ImageInfo {
    /// Whether orientation correction swaps width and height.
    pub fn swaps_axes(&self) -> bool {
        (5..=8).contains(&self.orientation)
    }
}

/// An image being transformed.
pub trait ImageHandle: Send {
    /// Current `(width, height)`.
    fn size(&self) -> (u32, u32);

    fn info(&self) -> &ImageInfo;

    /// Crop to `crop_box`, which lies within the current size.
    fn crop(&mut self, crop_box: CropBox) -> Result<(), ThumbnailError>;

    /// Resize to exactly `size`.
    fn resize(&mut self, size: (u32, u32)) -> Result<(), ThumbnailError>;

    /// Apply the recorded EXIF orientation and reset it to normal.
    fn orient(&mut self) -> Result<(), ThumbnailError>;
}

/// Produces image handles from source bytes.
pub trait Engine: Send + Sync {
    type Image: ImageHandle;

    fn decode(&self, data: &[u8]) -> Result<Self::Image, ThumbnailError>;
}

pub(crate) fn decode_error(e: impl std::fmt::Display) -> ThumbnailError {
    ThumbnailError::DecodeError {
        message: e.to_string(),
    }
}
