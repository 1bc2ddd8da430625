// ============================================================================
// STAMPS: rotated glyph and image stamps centred on a point
// ============================================================================

use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use image::{imageops, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{blend_pixel, PixelSurface};
use crate::coords::{PixelRect, Point};
use crate::error::{try_alloc_bytes, try_alloc_coverage, EngineError, Result};

/// Lay out one line of text left-aligned on the baseline at `ascent`.
fn layout_line(font: &FontArc, text: &str, font_size: f32) -> Vec<(GlyphId, f32, f32)> {
    let scaled = font.as_scaled(font_size);
    let ascent = scaled.ascent();

    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;
    for ch in text.chars().filter(|c| !c.is_control()) {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x, ascent));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }
    glyphs
}

/// Rasterise `text` at `font_size` into a tight RGBA image.
///
/// `Ok(None)` when nothing has ink (empty text, whitespace, bad size).
pub fn rasterize_glyph(font: &FontArc, text: &str, font_size: f32, color: Rgba<u8>) -> Result<Option<RgbaImage>> {
    if !font_size.is_finite() || font_size <= 0.0 {
        return Ok(None);
    }
    let font_size = font_size.min(crate::canvas::MAX_DIMENSION as f32);
    let glyphs = layout_line(font, text, font_size);

    let outlined: Vec<_> = glyphs
        .iter()
        .filter_map(|&(id, gx, gy)| font.outline_glyph(id.with_scale_and_position(font_size, point(gx, gy))))
        .collect();
    if outlined.is_empty() {
        return Ok(None);
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for g in &outlined {
        let b = g.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    let width = (max_x - min_x).ceil().max(0.0) as u32;
    let height = (max_y - min_y).ceil().max(0.0) as u32;
    if width == 0 || height == 0 {
        return Ok(None);
    }
    crate::canvas::validate_dimensions(width, height)?;

    let mut coverage = try_alloc_coverage(width as usize * height as usize)?;
    for g in &outlined {
        let b = g.px_bounds();
        let off_x = (b.min.x - min_x) as u32;
        let off_y = (b.min.y - min_y) as u32;
        g.draw(|px, py, cov| {
            let x = px + off_x;
            let y = py + off_y;
            if x < width && y < height {
                let idx = y as usize * width as usize + x as usize;
                coverage[idx] = coverage[idx].max(cov);
            }
        });
    }

    let buf = try_alloc_bytes(width as usize * height as usize * 4)?;
    let mut image = RgbaImage::from_raw(width, height, buf).ok_or(EngineError::InvalidDimensions { width, height })?;
    for (px, &cov) in image.pixels_mut().zip(&coverage) {
        if cov > 0.001 {
            let a = (color[3] as f32 * cov.min(1.0)).round() as u8;
            *px = Rgba([color[0], color[1], color[2], a]);
        }
    }
    Ok(Some(image))
}

/// Scale `image` so its longer side equals `size` (aspect preserved).
pub fn fit_to_size(image: &RgbaImage, size: f32) -> Option<RgbaImage> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || !size.is_finite() || size < 1.0 {
        return None;
    }
    let longest = w.max(h) as f32;
    let scale = size.min(crate::canvas::MAX_DIMENSION as f32) / longest;
    let nw = ((w as f32 * scale).round() as u32).max(1);
    let nh = ((h as f32 * scale).round() as u32).max(1);
    if (nw, nh) == (w, h) {
        return Some(image.clone());
    }
    Some(imageops::resize(image, nw, nh, imageops::FilterType::Triangle))
}

/// Blend `image` onto `surface` centred on `center`, rotated by `rotation` radians.
///
/// Each destination pixel is inverse-mapped into the stamp and sampled
/// bilinearly.  Returns the clipped rectangle that may have changed.
pub fn stamp_image(surface: &mut PixelSurface, image: &RgbaImage, center: Point, rotation: f32) -> Option<PixelRect> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || !center.is_sane() || !rotation.is_finite() {
        return None;
    }
    let (sin_r, cos_r) = rotation.sin_cos();
    let hw = w as f32 * 0.5;
    let hh = h as f32 * 0.5;

    let mut min = Point::new(f32::MAX, f32::MAX);
    let mut max = Point::new(f32::MIN, f32::MIN);
    for (cx, cy) in [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)] {
        let rx = cx * cos_r - cy * sin_r + center.x;
        let ry = cx * sin_r + cy * cos_r + center.y;
        min = Point::new(min.x.min(rx), min.y.min(ry));
        max = Point::new(max.x.max(rx), max.y.max(ry));
    }
    let dirty = PixelRect::from_points(min, max).inflate(1).clip(surface.width(), surface.height())?;

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
            let dy = y as f32 + 0.5 - center.y;
            for x in x0..x1 {
                let dx = x as f32 + 0.5 - center.x;
                // Inverse rotation into stamp space
                let sx = dx * cos_r + dy * sin_r + hw - 0.5;
                let sy = -dx * sin_r + dy * cos_r + hh - 0.5;
                let src = sample_bilinear(image, sx, sy);
                if src[3] > 0 {
                    row[x] = blend_pixel(Rgba(row[x]), src, 1.0).0;
                }
            }
        });
    Some(dirty)
}

/// Rasterise `text` and stamp it centred on `center`.
pub fn stamp_glyph(
    surface: &mut PixelSurface,
    font: &FontArc,
    text: &str,
    center: Point,
    font_size: f32,
    rotation: f32,
    color: Rgba<u8>,
) -> Result<Option<PixelRect>> {
    if !center.is_sane() || !rotation.is_finite() {
        return Ok(None);
    }
    match rasterize_glyph(font, text, font_size, color)? {
        Some(image) => Ok(stamp_image(surface, &image, center, rotation)),
        None => Ok(None),
    }
}

/// Texel at integer coordinates; transparent outside the image.
#[inline]
fn texel(image: &RgbaImage, x: i64, y: i64) -> Rgba<u8> {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return Rgba([0, 0, 0, 0]);
    }
    *image.get_pixel(x as u32, y as u32)
}

/// Bilinear sample at texel-centre coordinates, interpolated premultiplied.
fn sample_bilinear(image: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (ix, iy) = (x0 as i64, y0 as i64);

    // Exact texel hit (unrotated, pixel-aligned stamps)
    if fx < 1e-4 && fy < 1e-4 {
        return texel(image, ix, iy);
    }

    let taps = [
        (texel(image, ix, iy), (1.0 - fx) * (1.0 - fy)),
        (texel(image, ix + 1, iy), fx * (1.0 - fy)),
        (texel(image, ix, iy + 1), (1.0 - fx) * fy),
        (texel(image, ix + 1, iy + 1), fx * fy),
    ];
    let mut acc = [0.0f32; 4];
    for (p, wgt) in taps {
        let a = p[3] as f32 / 255.0 * wgt;
        acc[0] += p[0] as f32 * a;
        acc[1] += p[1] as f32 * a;
        acc[2] += p[2] as f32 * a;
        acc[3] += a;
    }
    if acc[3] <= 1e-6 {
        return Rgba([0, 0, 0, 0]);
    }
    Rgba([
        (acc[0] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[1] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[2] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[3] * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    fn red_block(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, RED)
    }

    #[test]
    fn test_unrotated_stamp_is_pixel_exact() {
        let mut surface = PixelSurface::new(20, 20).unwrap();
        let dirty = stamp_image(&mut surface, &red_block(4, 4), Point::new(10.0, 10.0), 0.0);
        assert!(dirty.is_some());
        for y in 0..20 {
            for x in 0..20 {
                let inside = (8..12).contains(&x) && (8..12).contains(&y);
                let expected = if inside { RED } else { CLEAR };
                assert_eq!(surface.get(x, y), Some(expected), "({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_quarter_turn_swaps_extent() {
        let mut surface = PixelSurface::new(40, 40).unwrap();
        stamp_image(&mut surface, &red_block(10, 2), Point::new(20.0, 20.0), std::f32::consts::FRAC_PI_2);
        assert_eq!(surface.get(20, 16).map(|p| p[3] > 200), Some(true));
        assert_eq!(surface.get(16, 20), Some(CLEAR));
    }

    #[test]
    fn test_stamp_rejects_bad_input() {
        let mut surface = PixelSurface::new(8, 8).unwrap();
        assert!(stamp_image(&mut surface, &red_block(2, 2), Point::new(f32::NAN, 1.0), 0.0).is_none());
        assert!(stamp_image(&mut surface, &red_block(2, 2), Point::new(1.0, 1.0), f32::INFINITY).is_none());
        assert!(stamp_image(&mut surface, &red_block(2, 2), Point::new(100.0, 100.0), 0.0).is_none());
        assert!(surface.pixels().iter().all(|p| p[3] == 0));
    }

    #[test]
    fn test_fit_to_size_keeps_aspect() {
        let scaled = fit_to_size(&red_block(20, 10), 10.0).unwrap();
        assert_eq!(scaled.dimensions(), (10, 5));
        assert!(fit_to_size(&red_block(4, 4), 0.0).is_none());
    }
}
