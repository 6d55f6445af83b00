//! Pixel engine built on the `image` crate.
//!
//! Sources are decoded in full, EXIF orientation is read from the decoder, and
//! the final image is encoded to the requested output format. Quality only
//! applies to JPEG; PNG, GIF and WebP are written losslessly.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};

use crate::error::ThumbnailError;
use crate::geometry::CropBox;
use crate::thumbnail::{Options, ThumbnailFormat, MAX_QUALITY, MIN_QUALITY};

use super::{decode_error, Engine, ImageHandle, ImageInfo, ORIENTATION_NORMAL};

// =============================================================================
// Raster Image
// =============================================================================

/// A decoded image.
#[derive(Debug, Clone)]
pub struct RasterImage {
    image: DynamicImage,
    info: ImageInfo,
}

impl RasterImage {
    pub fn new(image: DynamicImage, info: ImageInfo) -> Self {
        Self { image, info }
    }
}

impl ImageHandle for RasterImage {
    fn size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    fn info(&self) -> &ImageInfo {
        &self.info
    }

    fn crop(&mut self, crop_box: CropBox) -> Result<(), ThumbnailError> {
        self.image = self.image.crop_imm(
            crop_box.left,
            crop_box.top,
            crop_box.width(),
            crop_box.height(),
        );
        Ok(())
    }

    fn resize(&mut self, size: (u32, u32)) -> Result<(), ThumbnailError> {
        self.image = self.image.resize_exact(size.0, size.1, FilterType::Lanczos3);
        Ok(())
    }

    fn orient(&mut self) -> Result<(), ThumbnailError> {
        if let Some(orientation) = Orientation::from_exif(self.info.orientation) {
            self.image.apply_orientation(orientation);
        }
        self.info.orientation = ORIENTATION_NORMAL;
        Ok(())
    }
}

// =============================================================================
// Raster Engine
// =============================================================================

/// Decodes, transforms and encodes real pixels.
#[derive(Debug, Clone, Default)]
pub struct RasterEngine {}

impl RasterEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// Encode an image using the `format` and `quality` options.
    ///
    /// # Errors
    ///
    /// - `InvalidOptions` if `format` or `quality` are unusable
    /// - `EncodeError` if the encoder fails
    pub fn encode(&self, image: &RasterImage, options: &Options) -> Result<Bytes, ThumbnailError> {
        let format = options.format()?;
        let quality = clamp_quality(options.quality()?);

        let mut output = Vec::new();
        let result = match format {
            ThumbnailFormat::Jpeg => {
                // JPEG has no alpha channel
                let pixels = image.image.to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);
                encoder.encode_image(&pixels)
            }
            ThumbnailFormat::Png => {
                let pixels = if image.image.color().has_alpha() {
                    DynamicImage::ImageRgba8(image.image.to_rgba8())
                } else {
                    DynamicImage::ImageRgb8(image.image.to_rgb8())
                };
                pixels.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
            }
            ThumbnailFormat::Gif => DynamicImage::ImageRgba8(image.image.to_rgba8())
                .write_to(&mut Cursor::new(&mut output), ImageFormat::Gif),
            ThumbnailFormat::Webp => DynamicImage::ImageRgba8(image.image.to_rgba8())
                .write_to(&mut Cursor::new(&mut output), ImageFormat::WebP),
        };

        result.map_err(|e| ThumbnailError::EncodeError {
            message: e.to_string(),
        })?;

        Ok(Bytes::from(output))
    }
}

impl Engine for RasterEngine {
    type Image = RasterImage;

    fn decode(&self, data: &[u8]) -> Result<RasterImage, ThumbnailError> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(decode_error)?;
        let format = reader.format().and_then(ThumbnailFormat::from_image_format);

        let mut decoder = reader.into_decoder().map_err(decode_error)?;
        let orientation = decoder
            .orientation()
            .map(|o| o.to_exif())
            .unwrap_or(ORIENTATION_NORMAL);

        let image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;

        Ok(RasterImage {
            image,
            info: ImageInfo {
                format,
                orientation,
            },
        })
    }
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_QUALITY, MAX_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
