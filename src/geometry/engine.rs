//! Size and offset arithmetic for the scale and crop steps.
//!
//! [`plan`] works on the image as it is when the scale step starts (after any
//! explicit crop box and orientation correction have been applied), so every
//! box it returns is expressed in that image's coordinates.

use crate::error::ThumbnailError;
use crate::thumbnail::Options;

use super::parse::{CropAlign, CropBox, CropMode, Geometry};
use super::to_int;

/// Concrete operations for one source size and one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Clip to the target aspect ratio before scaling
    pub crop_box: Option<CropBox>,

    /// Resize to this size
    pub scale: Option<(u32, u32)>,

    /// Trim the scaled image to the target
    pub final_crop: Option<CropBox>,

    /// Target dimensions with any missing side filled in
    pub target: (u32, u32),
}

impl Resolution {
    fn identity(target: (u32, u32)) -> Self {
        Self {
            crop_box: None,
            scale: None,
            final_crop: None,
            target,
        }
    }

    /// Size of the image after all operations, starting from `size`.
    pub fn output_size(&self, size: (u32, u32)) -> (u32, u32) {
        if let Some(b) = self.final_crop {
            return b.size();
        }
        if let Some(s) = self.scale {
            return s;
        }
        if let Some(b) = self.crop_box {
            return b.size();
        }
        size
    }
}

/// Resolve a geometry string and options against an image size.
///
/// # Errors
///
/// - `InvalidGeometry` if the geometry string is malformed
/// - `InvalidOptions` if `crop` or `upscale` have unusable values
/// - `TransformFailed` if the image has a zero dimension
pub fn resolve(
    size: (u32, u32),
    geometry: &str,
    options: &Options,
) -> Result<Resolution, ThumbnailError> {
    let geometry = Geometry::parse(geometry)?;
    plan(size, &geometry, options.crop()?, options.upscale()?)
}

/// Compute the crop box, scale size and final crop for `size`.
pub fn plan(
    size: (u32, u32),
    geometry: &Geometry,
    crop: CropMode,
    upscale: bool,
) -> Result<Resolution, ThumbnailError> {
    let (src_w, src_h) = size;
    if src_w == 0 || src_h == 0 {
        return Err(ThumbnailError::transform(format!(
            "image has no area: {}x{}",
            src_w, src_h
        )));
    }

    let ratio = src_w as f64 / src_h as f64;
    let target = geometry.dimensions(ratio);
    let (tgt_w, tgt_h) = target;

    if !upscale && src_w <= tgt_w && src_h <= tgt_h {
        return Ok(Resolution::identity(target));
    }

    match crop {
        CropMode::Disabled => {
            let factor = f64::min(tgt_w as f64 / src_w as f64, tgt_h as f64 / src_h as f64);
            Ok(Resolution {
                scale: scaled(size, factor, upscale),
                ..Resolution::identity(target)
            })
        }
        CropMode::Noop => {
            let factor = f64::max(tgt_w as f64 / src_w as f64, tgt_h as f64 / src_h as f64);
            Ok(Resolution {
                scale: scaled(size, factor, upscale),
                ..Resolution::identity(target)
            })
        }
        CropMode::Align(align) => Ok(plan_aligned(size, target, align, upscale)),
    }
}

fn plan_aligned(
    size: (u32, u32),
    target: (u32, u32),
    align: CropAlign,
    upscale: bool,
) -> Resolution {
    let (src_w, src_h) = size;
    let (tgt_w, tgt_h) = target;

    let cover = f64::max(tgt_w as f64 / src_w as f64, tgt_h as f64 / src_h as f64);
    if cover > 1.0 && !upscale {
        // Cannot enlarge: cut out as much of the target window as the image has
        let window = align.place(size, target);
        return Resolution {
            final_crop: (!window.is_full(size)).then_some(window),
            ..Resolution::identity(target)
        };
    }

    // Clip the source to the target aspect ratio
    let target_ratio = tgt_w as f64 / tgt_h as f64;
    let region = if src_w as f64 / src_h as f64 > target_ratio {
        (to_int(src_h as f64 * target_ratio).min(src_w), src_h)
    } else {
        (src_w, to_int(src_w as f64 / target_ratio).min(src_h))
    };
    let crop_box = align.place(size, region);
    let crop_box = (!crop_box.is_full(size)).then_some(crop_box);

    // Scale so both sides cover the target; rounding may overshoot by a pixel
    let factor = f64::max(tgt_w as f64 / region.0 as f64, tgt_h as f64 / region.1 as f64);
    let scale = scaled(region, factor, upscale);
    let scaled_size = scale.unwrap_or(region);

    let final_crop = if scaled_size.0 > tgt_w || scaled_size.1 > tgt_h {
        Some(align.place(scaled_size, target))
    } else {
        None
    };

    Resolution {
        crop_box,
        scale,
        final_crop,
        target,
    }
}

/// Scaled size for `factor`, or `None` when the image keeps its size.
fn scaled(size: (u32, u32), factor: f64, upscale: bool) -> Option<(u32, u32)> {
    if factor < 1.0 || (upscale && factor > 1.0) {
        let new_size = (
            to_int(size.0 as f64 * factor),
            to_int(size.1 as f64 * factor),
        );
        (new_size != size).then_some(new_size)
    } else {
        None
    }
}

// =============================================================================
// Tests
// =============================================================================
