//! Geometric world transforms: rotate, mirror, crop.
//!
//! Pipeline order is fixed: clockwise rotation about the origin, then
//! mirrors in the rotated frame, then crop in output coordinates. The road
//! adjacency mask is direction-dependent, so every transform ends with a
//! full mask recompute.

use thiserror::Error;

use crate::grid::World;

#[derive(Debug, Clone, Copy, Default)]
pub struct WorldTransformConfig {
    /// Clockwise rotation in degrees: 0, 90, 180, or 270.
    pub rotate_deg: i32,
    /// Mirror horizontally (x -> w-1-x) after rotation.
    pub mirror_x: bool,
    /// Mirror vertically (y -> h-1-y) after rotation.
    pub mirror_y: bool,
    /// Optional crop applied last, in output coordinates.
    pub crop: Option<CropRect>,
}

#[derive(Debug, Clone, Copy)]
pub struct CropRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("invalid source world dimensions")]
    InvalidSource,
    #[error("rotate_deg must be one of 0, 90, 180, 270 (got {0})")]
    InvalidRotation(i32),
    #[error("crop rectangle {x},{y} {w}x{h} out of bounds for rotated world {rot_w}x{rot_h}")]
    CropOutOfBounds {
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        rot_w: i32,
        rot_h: i32,
    },
}

fn rotated_dims(src_w: i32, src_h: i32, rotate_deg: i32) -> (i32, i32) {
    if rotate_deg == 90 || rotate_deg == 270 {
        (src_h, src_w)
    } else {
        (src_w, src_h)
    }
}

/// Map a coordinate in the rotated frame back to the source.
fn map_rotated_to_source(
    src_w: i32,
    src_h: i32,
    rotate_deg: i32,
    x_rot: i32,
    y_rot: i32,
) -> (i32, i32) {
    match rotate_deg {
        90 => (y_rot, src_h - 1 - x_rot),
        180 => (src_w - 1 - x_rot, src_h - 1 - y_rot),
        270 => (src_w - 1 - y_rot, x_rot),
        _ => (x_rot, y_rot),
    }
}

pub fn validate_transform(
    cfg: &WorldTransformConfig,
    src_w: i32,
    src_h: i32,
) -> Result<(), TransformError> {
    if src_w <= 0 || src_h <= 0 {
        return Err(TransformError::InvalidSource);
    }
    if !matches!(cfg.rotate_deg, 0 | 90 | 180 | 270) {
        return Err(TransformError::InvalidRotation(cfg.rotate_deg));
    }
    let (rot_w, rot_h) = rotated_dims(src_w, src_h, cfg.rotate_deg);
    if let Some(c) = cfg.crop {
        if c.w <= 0 || c.h <= 0 || c.x < 0 || c.y < 0 || c.x + c.w > rot_w || c.y + c.h > rot_h {
            return Err(TransformError::CropOutOfBounds {
                x: c.x,
                y: c.y,
                w: c.w,
                h: c.h,
                rot_w,
                rot_h,
            });
        }
    }
    Ok(())
}

/// Output dimensions after the full pipeline.
pub fn transform_dims(
    cfg: &WorldTransformConfig,
    src_w: i32,
    src_h: i32,
) -> Result<(i32, i32), TransformError> {
    validate_transform(cfg, src_w, src_h)?;
    let (rot_w, rot_h) = rotated_dims(src_w, src_h, cfg.rotate_deg);
    Ok(match cfg.crop {
        Some(c) => (c.w, c.h),
        None => (rot_w, rot_h),
    })
}

/// Map an output coordinate back to its source tile. The mapping is a
/// bijection on the valid output rectangle.
pub fn map_transformed_to_source(
    cfg: &WorldTransformConfig,
    src_w: i32,
    src_h: i32,
    x_out: i32,
    y_out: i32,
) -> Result<(i32, i32), TransformError> {
    let (out_w, out_h) = transform_dims(cfg, src_w, src_h)?;
    if x_out < 0 || y_out < 0 || x_out >= out_w || y_out >= out_h {
        return Err(TransformError::InvalidSource);
    }

    let (rot_w, rot_h) = rotated_dims(src_w, src_h, cfg.rotate_deg);

    // Undo the crop (applied last), then the mirrors, then the rotation.
    let mut x_rot = x_out;
    let mut y_rot = y_out;
    if let Some(c) = cfg.crop {
        x_rot += c.x;
        y_rot += c.y;
    }
    if cfg.mirror_x {
        x_rot = rot_w - 1 - x_rot;
    }
    if cfg.mirror_y {
        y_rot = rot_h - 1 - y_rot;
    }

    Ok(map_rotated_to_source(src_w, src_h, cfg.rotate_deg, x_rot, y_rot))
}

/// Apply the transform, producing a new world. Stats and seed carry over;
/// road masks are recomputed.
pub fn transform_world(src: &World, cfg: &WorldTransformConfig) -> Result<World, TransformError> {
    let src_w = src.width();
    let src_h = src.height();
    let (out_w, out_h) = transform_dims(cfg, src_w, src_h)?;

    let mut out = World::new(out_w, out_h, src.seed());
    *out.stats_mut() = *src.stats();

    for y in 0..out_h {
        for x in 0..out_w {
            let (sx, sy) = map_transformed_to_source(cfg, src_w, src_h, x, y)?;
            *out.at_mut(x, y) = *src.at(sx, sy);
        }
    }

    out.recompute_road_masks();
    Ok(out)
}
