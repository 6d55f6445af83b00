//! Geometry engine.
//!
//! Pure arithmetic that turns a geometry string (`"200x200"`, `"200"`,
//! `"x150"`) and the transform options into concrete operations against an
//! image size:
//!
//! ```text
//!   source ──crop_box──▶ aspect-clipped ──scale──▶ covering ──final_crop──▶ target
//! ```
//!
//! Everything here is deterministic: the deferred-render endpoint re-runs the
//! same arithmetic in another process and must land on the same result.

mod engine;
mod parse;

pub use engine::{plan, resolve, Resolution};
pub use parse::{CropAlign, CropBox, CropMode, Geometry, Offset};

/// Round a computed dimension to a positive integer.
///
/// Values above 1 are rounded to the nearest integer; values at or below 1
/// are rounded up, so a positive input never collapses to zero.
pub(crate) fn to_int(value: f64) -> u32 {
    let rounded = if value > 1.0 {
        value.round()
    } else {
        value.ceil()
    };
    rounded.max(0.0) as u32
}
