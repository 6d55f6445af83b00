//! Parsers for geometry strings, crop alignments and crop boxes.

use std::fmt;

use crate::error::ThumbnailError;

use super::to_int;

// =============================================================================
// Geometry
// =============================================================================

/// A requested target size: `WxH`, `W` or `xH`.
///
/// A missing dimension is derived from the source aspect ratio by
/// [`Geometry::dimensions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Geometry {
    /// Parse a geometry string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGeometry` for anything other than `WxH`, `W` or `xH`
    /// with positive integer dimensions.
    pub fn parse(geometry: &str) -> Result<Self, ThumbnailError> {
        let (w, h) = match geometry.split_once('x') {
            Some((w, h)) => (w, Some(h)),
            None => (geometry, None),
        };

        let width = parse_dimension(geometry, w, true)?;
        let height = match h {
            Some(h) => parse_dimension(geometry, h, false)?,
            None => None,
        };

        if width.is_none() && height.is_none() {
            return Err(ThumbnailError::invalid_geometry(
                geometry,
                "expected WxH, W or xH",
            ));
        }

        Ok(Self { width, height })
    }

    /// Concrete target dimensions, completing a missing side from `ratio`
    /// (source width / height).
    pub fn dimensions(&self, ratio: f64) -> (u32, u32) {
        match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, to_int(w as f64 / ratio)),
            (None, Some(h)) => (to_int(h as f64 * ratio), h),
            // parse() rejects this shape
            (None, None) => (1, 1),
        }
    }
}

fn parse_dimension(
    geometry: &str,
    part: &str,
    optional: bool,
) -> Result<Option<u32>, ThumbnailError> {
    if part.is_empty() {
        return if optional {
            Ok(None)
        } else {
            Err(ThumbnailError::invalid_geometry(geometry, "missing height"))
        };
    }
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ThumbnailError::invalid_geometry(
            geometry,
            format!("{:?} is not a positive integer", part),
        ));
    }
    let value: u32 = part
        .parse()
        .map_err(|_| ThumbnailError::invalid_geometry(geometry, "dimension too large"))?;
    if value == 0 {
        return Err(ThumbnailError::invalid_geometry(
            geometry,
            "dimensions must be positive",
        ));
    }
    Ok(Some(value))
}

// =============================================================================
// Crop Box
// =============================================================================

/// Rectangle `(left, top, right, bottom)`, right/bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropBox {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// A `width`x`height` window placed at `(x, y)`.
    pub fn window(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Whether the box is non-empty and lies within an image of `size`.
    pub fn fits(&self, size: (u32, u32)) -> bool {
        self.width() > 0 && self.height() > 0 && self.right <= size.0 && self.bottom <= size.1
    }

    /// Whether the box covers the whole of an image of `size`.
    pub fn is_full(&self, size: (u32, u32)) -> bool {
        self.left == 0 && self.top == 0 && self.right == size.0 && self.bottom == size.1
    }

    /// Parse `"x,y,x2,y2"`.
    pub fn parse(value: &str) -> Result<Self, ThumbnailError> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(ThumbnailError::invalid_option(
                "cropbox",
                format!("expected x,y,x2,y2, got {:?}", value),
            ));
        }
        let mut coords = [0u32; 4];
        for (slot, part) in coords.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| {
                ThumbnailError::invalid_option(
                    "cropbox",
                    format!("{:?} is not a non-negative integer", part),
                )
            })?;
        }
        let [left, top, right, bottom] = coords;
        if right <= left || bottom <= top {
            return Err(ThumbnailError::invalid_option(
                "cropbox",
                format!("{:?} has no area", value),
            ));
        }
        Ok(Self::new(left, top, right, bottom))
    }
}

impl fmt::Display for CropBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.left, self.top, self.right, self.bottom)
    }
}

// =============================================================================
// Crop Alignment
// =============================================================================

/// Offset along one axis: a percentage of the overshoot or absolute pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offset {
    Percent(u32),
    Pixels(u32),
}

impl Offset {
    /// Offset in pixels within `[0, overshoot]`.
    pub fn resolve(&self, overshoot: u32) -> u32 {
        let value = match *self {
            Offset::Percent(p) => (overshoot as u64 * p as u64 / 100) as u32,
            Offset::Pixels(px) => px,
        };
        value.min(overshoot)
    }

    fn parse(token: &str, crop: &str) -> Result<Self, ThumbnailError> {
        let (digits, percent) = if let Some(d) = token.strip_suffix('%') {
            (d, true)
        } else if let Some(d) = token.strip_suffix("px") {
            (d, false)
        } else {
            return Err(unrecognized(crop));
        };
        let value: u32 = digits.parse().map_err(|_| unrecognized(crop))?;
        Ok(if percent {
            Offset::Percent(value)
        } else {
            Offset::Pixels(value)
        })
    }
}

fn unrecognized(crop: &str) -> ThumbnailError {
    ThumbnailError::invalid_option("crop", format!("unrecognized crop option: {:?}", crop))
}

/// Where the crop window sits inside an oversized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropAlign {
    pub x: Offset,
    pub y: Offset,
}

impl CropAlign {
    pub const CENTER: CropAlign = CropAlign {
        x: Offset::Percent(50),
        y: Offset::Percent(50),
    };

    /// Parse `center`, `left`, `top`, `"right bottom"`, `"10% 80%"`,
    /// `"20px 0px"` and combinations thereof.
    pub fn parse(crop: &str) -> Result<Self, ThumbnailError> {
        let tokens: Vec<&str> = crop.split_whitespace().collect();
        let (x_token, y_token) = match tokens.as_slice() {
            [single] => {
                if x_keyword(single).is_some() {
                    (*single, "center")
                } else if y_keyword(single).is_some() {
                    ("center", *single)
                } else {
                    (*single, *single)
                }
            }
            [x, y] => (*x, *y),
            _ => return Err(unrecognized(crop)),
        };

        let x = match x_keyword(x_token) {
            Some(offset) => offset,
            None => Offset::parse(x_token, crop)?,
        };
        let y = match y_keyword(y_token) {
            Some(offset) => offset,
            None => Offset::parse(y_token, crop)?,
        };
        Ok(Self { x, y })
    }

    /// Pixel offsets of a window inside an image overshooting it by
    /// `(overshoot_x, overshoot_y)`.
    pub fn offsets(&self, overshoot: (u32, u32)) -> (u32, u32) {
        (self.x.resolve(overshoot.0), self.y.resolve(overshoot.1))
    }

    /// A `window`-sized box aligned inside an image of `size`.
    pub fn place(&self, size: (u32, u32), window: (u32, u32)) -> CropBox {
        let window = (window.0.min(size.0), window.1.min(size.1));
        let (x, y) = self.offsets((size.0 - window.0, size.1 - window.1));
        CropBox::window(x, y, window.0, window.1)
    }
}

fn x_keyword(token: &str) -> Option<Offset> {
    match token {
        "left" => Some(Offset::Percent(0)),
        "center" => Some(Offset::Percent(50)),
        "right" => Some(Offset::Percent(100)),
        _ => None,
    }
}

fn y_keyword(token: &str) -> Option<Offset> {
    match token {
        "top" => Some(Offset::Percent(0)),
        "center" => Some(Offset::Percent(50)),
        "bottom" => Some(Offset::Percent(100)),
        _ => None,
    }
}

/// The `crop` option after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropMode {
    /// Fit inside the target; no cropping
    Disabled,
    /// Cover the target but keep the overshoot
    Noop,
    /// Cover the target and trim at the given alignment
    Align(CropAlign),
}

// =============================================================================
// Tests
// =============================================================================
