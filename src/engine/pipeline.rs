//! Ordered transform pipeline.
//!
//! ```text
//! cropbox ──▶ orientation ──▶ scale ──▶ crop
//! ```
//!
//! The order is fixed: explicit crop boxes are in source coordinates, and the
//! scale arithmetic must see the upright image. The final crop trims whatever
//! the scale step left beyond the target.

use tracing::trace;

use crate::error::ThumbnailError;
use crate::geometry::{plan, CropBox, Geometry};
use crate::thumbnail::Options;

use super::ImageHandle;

/// A pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Explicit `cropbox` option
    CropBox,
    /// EXIF orientation correction
    Orientation,
    /// Aspect clip and resize
    Scale,
    /// Trim to the target
    Crop,
}

/// Steps in execution order.
pub const STEPS: [Step; 4] = [Step::CropBox, Step::Orientation, Step::Scale, Step::Crop];

/// Runs the steps against an image handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformPipeline;

impl TransformPipeline {
    /// Transform `image` for `geometry` and `options`.
    ///
    /// The handle is consumed; on error it is dropped with whatever it holds.
    ///
    /// # Errors
    ///
    /// - `InvalidGeometry` / `InvalidOptions` for unusable request parameters
    /// - `TransformFailed` if a step cannot be applied or the result has no area
    pub fn apply<I: ImageHandle>(
        mut image: I,
        geometry: &str,
        options: &Options,
    ) -> Result<I, ThumbnailError> {
        let parsed = Geometry::parse(geometry)?;
        let crop = options.crop()?;
        let upscale = options.upscale()?;

        let mut final_crop = None;
        let mut expected = None;

        for step in STEPS {
            match step {
                Step::CropBox => {
                    if let Some(crop_box) = options.cropbox()? {
                        checked_crop(&mut image, crop_box, step)?;
                    }
                }
                Step::Orientation => {
                    if options.orientation()? {
                        image.orient()?;
                    }
                }
                Step::Scale => {
                    let size = image.size();
                    let resolution = plan(size, &parsed, crop, upscale)?;
                    if let Some(crop_box) = resolution.crop_box {
                        checked_crop(&mut image, crop_box, step)?;
                    }
                    if let Some(scale) = resolution.scale {
                        image.resize(scale)?;
                    }
                    final_crop = resolution.final_crop;
                    expected = Some(resolution.output_size(size));
                }
                Step::Crop => {
                    if let Some(crop_box) = final_crop {
                        checked_crop(&mut image, crop_box, step)?;
                    }
                }
            }

            let (width, height) = image.size();
            trace!(step = ?step, width = width, height = height, "Pipeline step applied");
        }

        let size = image.size();
        if size.0 == 0 || size.1 == 0 {
            return Err(ThumbnailError::transform(format!(
                "result has no area: {}x{}",
                size.0, size.1
            )));
        }
        if let Some(expected) = expected {
            if size != expected {
                return Err(ThumbnailError::transform(format!(
                    "expected {}x{}, got {}x{}",
                    expected.0, expected.1, size.0, size.1
                )));
            }
        }

        Ok(image)
    }
}

fn checked_crop<I: ImageHandle>(
    image: &mut I,
    crop_box: CropBox,
    step: Step,
) -> Result<(), ThumbnailError> {
    let size = image.size();
    if !crop_box.fits(size) {
        return Err(ThumbnailError::transform(format!(
            "{:?}: box {} outside {}x{} image",
            step, crop_box, size.0, size.1
        )));
    }
    image.crop(crop_box)
}

// =============================================================================
// Tests
// =============================================================================
