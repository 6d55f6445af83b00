//! Header-only engine.
//!
//! Reads dimensions, format and EXIF orientation without decoding pixels.
//! Every transform just updates the tracked size, which is all the deferred
//! path needs to describe the thumbnail it will render later.

use std::io::Cursor;

use image::{ImageDecoder, ImageReader};

use crate::error::ThumbnailError;
use crate::geometry::CropBox;
use crate::thumbnail::ThumbnailFormat;

use super::{decode_error, Engine, ImageHandle, ImageInfo, ORIENTATION_NORMAL};

/// Dimensions-only stand-in for a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderImage {
    size: (u32, u32),
    info: ImageInfo,
}

impl PlaceholderImage {
    pub fn new(size: (u32, u32), info: ImageInfo) -> Self {
        Self { size, info }
    }
}

impl ImageHandle for PlaceholderImage {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn info(&self) -> &ImageInfo {
        &self.info
    }

    fn crop(&mut self, crop_box: CropBox) -> Result<(), ThumbnailError> {
        self.size = crop_box.size();
        Ok(())
    }

    fn resize(&mut self, size: (u32, u32)) -> Result<(), ThumbnailError> {
        self.size = size;
        Ok(())
    }

    fn orient(&mut self) -> Result<(), ThumbnailError> {
        if self.info.swaps_axes() {
            self.size = (self.size.1, self.size.0);
        }
        self.info.orientation = ORIENTATION_NORMAL;
        Ok(())
    }
}

/// Engine that never touches pixels.
#[derive(Debug, Clone, Default)]
pub struct MetadataEngine {}

impl MetadataEngine {
    pub fn new() -> Self {
        Self {}
    }
}

impl Engine for MetadataEngine {
    type Image = PlaceholderImage;

    fn decode(&self, data: &[u8]) -> Result<PlaceholderImage, ThumbnailError> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(decode_error)?;
        let format = reader.format().and_then(ThumbnailFormat::from_image_format);

        let mut decoder = reader.into_decoder().map_err(decode_error)?;
        let orientation = decoder
            .orientation()
            .map(|o| o.to_exif())
            .unwrap_or(ORIENTATION_NORMAL);

        Ok(PlaceholderImage {
            size: decoder.dimensions(),
            info: ImageInfo {
                format,
                orientation,
            },
        })
    }
}
