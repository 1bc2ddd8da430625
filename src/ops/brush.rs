// ============================================================================
// BRUSH STROKES: pencil, eraser and spray segments
// ============================================================================
//
// A stroke arrives as a sequence of segments (previous pointer position to
// current).  Pencil and eraser rasterise the round-capped capsule around the
// segment so every pixel is touched at most once per segment.

use image::Rgba;
use rayon::prelude::*;

use crate::canvas::PixelSurface;
use crate::coords::{PixelRect, Point};
use crate::ops::effects::hash_f32;
use crate::ops::shapes::{draw_segment, sdf_line_segment, segment_bounds};

/// Largest brush diameter accepted.
pub const MAX_BRUSH_SIZE: f32 = 1000.0;

fn brush_radius(size: f32) -> Option<f32> {
    if !size.is_finite() || size <= 0.0 {
        return None;
    }
    Some((size.min(MAX_BRUSH_SIZE) * 0.5).max(0.5))
}

/// Hard round pencil of diameter `size`.
pub fn pencil_segment(surface: &mut PixelSurface, from: Point, to: Point, size: f32, color: Rgba<u8>) -> Option<PixelRect> {
    let radius = brush_radius(size)?;
    draw_segment(surface, from, to, radius, color, false)
}

/// Clear alpha inside the capsule of diameter `size`.
pub fn eraser_segment(surface: &mut PixelSurface, from: Point, to: Point, size: f32) -> Option<PixelRect> {
    let radius = brush_radius(size)?;
    let dirty = segment_bounds(from, to, radius)?.clip(surface.width(), surface.height())?;
    let width = surface.width() as usize;
    let x0 = dirty.x as usize;
    let x1 = x0 + dirty.width as usize;
    surface
        .pixels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .skip(dirty.y as usize)
        .take(dirty.height as usize)
        .for_each(|(y, row)| {
            let py = y as f32 + 0.5;
            for x in x0..x1 {
                if sdf_line_segment(x as f32 + 0.5, py, from.x, from.y, to.x, to.y) <= radius {
                    row[x][3] = 0;
                }
            }
        });
    Some(dirty)
}

/// Scatter `density` dots per dab inside circles of `radius` spaced along the segment.
///
/// Dot positions come from hash noise keyed on `seed`, so the same seed
/// always paints the same pixels.
pub fn spray_segment(
    surface: &mut PixelSurface,
    from: Point,
    to: Point,
    radius: f32,
    density: u32,
    color: Rgba<u8>,
    seed: u32,
) -> Option<PixelRect> {
    if density == 0 {
        return None;
    }
    let radius = brush_radius(radius * 2.0)?;
    let bounds = segment_bounds(from, to, radius)?;
    let dirty = bounds.clip(surface.width(), surface.height())?;

    let spacing = radius.max(1.0);
    let dabs = (from.distance(to) / spacing).ceil().max(0.0) as u32 + 1;
    let density = density.min(10_000);

    for dab in 0..dabs {
        let t = if dabs > 1 { dab as f32 / (dabs - 1) as f32 } else { 0.0 };
        let cx = from.x + (to.x - from.x) * t;
        let cy = from.y + (to.y - from.y) * t;
        for dot in 0..density {
            let u = hash_f32(dab, dot, seed);
            let v = hash_f32(dot, dab, seed ^ 0x5bd1_e995);
            let r = radius * u.sqrt();
            let theta = v * std::f32::consts::TAU;
            let x = (cx + r * theta.cos()).floor() as i32;
            let y = (cy + r * theta.sin()).floor() as i32;
            surface.blend(x, y, color);
        }
    }
    Some(dirty)
}
