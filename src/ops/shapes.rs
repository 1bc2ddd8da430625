use image::Rgba;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::{blend_pixel, PixelSurface};
use crate::coords::{PixelRect, Point};
use crate::ops::brush::MAX_BRUSH_SIZE;
use crate::ops::pattern::{self, PatternSpec};

/// Shapes the shape tool can drag out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Line,
    #[default]
    Rectangle,
    RoundedRect,
    Ellipse,
    Triangle,
    Diamond,
    Star,
    Heart,
}

impl ShapeKind {
    pub fn all() -> &'static [ShapeKind] {
        &[
            ShapeKind::Line,
            ShapeKind::Rectangle,
            ShapeKind::RoundedRect,
            ShapeKind::Ellipse,
            ShapeKind::Triangle,
            ShapeKind::Diamond,
            ShapeKind::Star,
            ShapeKind::Heart,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Line => "line",
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::RoundedRect => "rounded_rect",
            ShapeKind::Ellipse => "ellipse",
            ShapeKind::Triangle => "triangle",
            ShapeKind::Diamond => "diamond",
            ShapeKind::Star => "star",
            ShapeKind::Heart => "heart",
        }
    }

    pub fn from_name(name: &str) -> Option<ShapeKind> {
        let name = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::all().iter().copied().find(|k| k.name() == name)
    }

    /// Lines have no interior and ignore the fill pattern.
    pub fn has_interior(&self) -> bool {
        !matches!(self, ShapeKind::Line)
    }
}

/// How a shape is painted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeStyle {
    pub outline: Rgba<u8>,
    /// Outline thickness in pixels, capped at [`MAX_BRUSH_SIZE`]; 0 draws no
    /// outline (lines use at least 1).
    pub outline_width: f32,
    /// Only used by [`ShapeKind::RoundedRect`].
    pub corner_radius: f32,
    /// Interior fill.  A transparent pattern leaves the shape outline-only.
    pub fill: PatternSpec,
    pub anti_alias: bool,
}

impl ShapeStyle {
    pub fn outline_only(outline: Rgba<u8>, width: f32) -> Self {
        Self {
            outline,
            outline_width: width,
            corner_radius: 0.0,
            fill: PatternSpec::transparent(),
            anti_alias: false,
        }
    }

    pub fn filled(outline: Rgba<u8>, width: f32, fill: PatternSpec) -> Self {
        Self {
            fill,
            ..Self::outline_only(outline, width)
        }
    }
}

// ============================================================================
// SDF functions: return signed distance (negative = inside)
// ============================================================================

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

#[inline]
fn sdf_rounded_box(px: f32, py: f32, hx: f32, hy: f32, r: f32) -> f32 {
    let r = r.max(0.0).min(hx).min(hy);
    sdf_box(px, py, hx - r, hy - r) - r
}

/// SDF for an ellipse (approximation).
#[inline]
fn sdf_ellipse(px: f32, py: f32, rx: f32, ry: f32) -> f32 {
    let nx = px / rx;
    let ny = py / ry;
    let len = (nx * nx + ny * ny).sqrt();
    if len < 1e-8 {
        return -rx.min(ry);
    }
    let scale = (rx * rx * ny * ny + ry * ry * nx * nx).sqrt() / (rx * ry * len);
    (len - 1.0) / scale
}

#[inline]
fn sdf_diamond(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let d = px.abs() / hx + py.abs() / hy - 1.0;
    let scale = 1.0 / (1.0 / (hx * hx) + 1.0 / (hy * hy)).sqrt();
    d * scale
}

/// Heart from the implicit curve (x²+y²-1)³ - x²y³ = 0, bumps on top.
/// Scaled uniformly so it never clips its box.
fn sdf_heart(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    const EXTENT_X: f32 = 1.0;
    const EXTENT_Y: f32 = 1.20;
    const CENTRE_Y: f32 = 0.20;

    let scale = (hx / EXTENT_X).min(hy / EXTENT_Y);
    let nx = px.abs() / scale;
    let ny = -py / scale + CENTRE_Y;

    let r2 = nx * nx + ny * ny;
    let a = r2 - 1.0;
    let f = a * a * a - nx * nx * ny * ny * ny;

    if f < 0.0 {
        let a2 = a * a;
        let df_dx = 6.0 * nx * a2 - 2.0 * nx * ny * ny * ny;
        let df_dy = 6.0 * ny * a2 - 3.0 * nx * nx * ny * ny;
        let grad_len = (df_dx * df_dx + df_dy * df_dy).sqrt();
        if grad_len > 1e-10 {
            (f / grad_len) * scale
        } else {
            -0.01 * scale
        }
    } else {
        // Outside: sample the parametric boundary for the closest point
        let mut min_d2: f32 = f32::MAX;
        let steps: u32 = 80;
        for i in 0..=steps {
            let t = std::f32::consts::PI * i as f32 / steps as f32;
            let bx = t.sin().powi(3);
            let by = (13.0 * t.cos() - 5.0 * (2.0 * t).cos() - 2.0 * (3.0 * t).cos() - (4.0 * t).cos())
                / 16.0;
            let ddx = nx - bx;
            let ddy = ny - by;
            min_d2 = min_d2.min(ddx * ddx + ddy * ddy);
        }
        min_d2.sqrt() * scale
    }
}

/// Signed distance to a simple polygon (either winding).
fn sdf_polygon(verts: &[(f32, f32)], px: f32, py: f32) -> f32 {
    let n = verts.len();
    if n == 0 {
        return f32::MAX;
    }
    let mut d = (px - verts[0].0) * (px - verts[0].0) + (py - verts[0].1) * (py - verts[0].1);
    let mut s: f32 = 1.0;
    let mut j = n - 1;
    for i in 0..n {
        let ex = verts[j].0 - verts[i].0;
        let ey = verts[j].1 - verts[i].1;
        let wx = px - verts[i].0;
        let wy = py - verts[i].1;
        let len2 = ex * ex + ey * ey;
        let t = if len2 > 0.0 { ((wx * ex + wy * ey) / len2).clamp(0.0, 1.0) } else { 0.0 };
        let bx = wx - ex * t;
        let by = wy - ey * t;
        d = d.min(bx * bx + by * by);
        // Crossing test
        let c1 = py >= verts[i].1;
        let c2 = py < verts[j].1;
        let c3 = ex * wy > ey * wx;
        if (c1 && c2 && c3) || (!c1 && !c2 && !c3) {
            s = -s;
        }
        j = i;
    }
    s * d.sqrt()
}

/// Isosceles triangle with its apex at the top-centre of the box.
fn sdf_triangle(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    sdf_polygon(&[(0.0, -hy), (hx, hy), (-hx, hy)], px, py)
}

/// Five-pointed star inscribed in the smaller half-extent, first point up.
fn sdf_star(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let outer = hx.min(hy);
    let inner = outer * 0.4;
    let mut verts = [(0.0f32, 0.0f32); 10];
    for (i, v) in verts.iter_mut().enumerate() {
        let r = if i % 2 == 0 { outer } else { inner };
        let a = -std::f32::consts::FRAC_PI_2 + i as f32 * std::f32::consts::PI / 5.0;
        *v = (r * a.cos(), r * a.sin());
    }
    sdf_polygon(&verts, px, py)
}

/// Unsigned distance from (px, py) to the segment a→b.
#[inline]
pub(crate) fn sdf_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 1e-12 {
        (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

/// SDF for a closed shape kind at local coordinates (centred at origin).
pub fn shape_sdf(kind: ShapeKind, px: f32, py: f32, hx: f32, hy: f32, corner_radius: f32) -> f32 {
    match kind {
        // Lines are rasterised from the segment, not a box
        ShapeKind::Line | ShapeKind::Rectangle => sdf_box(px, py, hx, hy),
        ShapeKind::RoundedRect => sdf_rounded_box(px, py, hx, hy, corner_radius),
        ShapeKind::Ellipse => sdf_ellipse(px, py, hx, hy),
        ShapeKind::Triangle => sdf_triangle(px, py, hx, hy),
        ShapeKind::Diamond => sdf_diamond(px, py, hx, hy),
        ShapeKind::Star => sdf_star(px, py, hx, hy),
        ShapeKind::Heart => sdf_heart(px, py, hx, hy),
    }
}

/// Coverage of a signed distance, hard-edged or smoothstepped.
#[inline]
pub(crate) fn coverage(d: f32, anti_alias: bool) -> f32 {
    if anti_alias {
        smoothstep(0.5, -0.5, d)
    } else if d < 0.0 {
        1.0
    } else {
        0.0
    }
}

// ============================================================================
// RASTERISATION
// ============================================================================

/// Paint a shape dragged from `start` to `end` onto `surface`.
///
/// The interior comes from the style's pattern, aligned to the shape's
/// bounding box; the outline is painted on top.  Returns the clipped
/// rectangle that may have changed, or `None` for degenerate input (a
/// non-finite point, a zero-area drag, nothing to paint).
pub fn draw_shape(
    surface: &mut PixelSurface,
    kind: ShapeKind,
    start: Point,
    end: Point,
    style: &ShapeStyle,
) -> Option<PixelRect> {
    if !start.is_sane() || !end.is_sane() {
        return None;
    }
    let outline_width = if style.outline_width.is_finite() {
        style.outline_width.clamp(0.0, MAX_BRUSH_SIZE)
    } else {
        0.0
    };

    if kind == ShapeKind::Line {
        if start.distance(end) <= 0.0 {
            return None;
        }
        return draw_segment(surface, start, end, outline_width.max(1.0) * 0.5, style.outline, style.anti_alias);
    }

    let hx = (end.x - start.x).abs() * 0.5;
    let hy = (end.y - start.y).abs() * 0.5;
    if hx <= 0.0 || hy <= 0.0 {
        return None;
    }

    let shape_rect = PixelRect::from_points(start, end);
    let fill = pattern::generate(&style.fill, shape_rect);
    if fill.is_none() && outline_width <= 0.0 {
        return None;
    }

    let pad = (outline_width * 0.5 + 2.0).ceil() as u32;
    let dirty = shape_rect.inflate(pad).clip(surface.width(), surface.height())?;

    let cx = (start.x + end.x) * 0.5;
    let cy = (start.y + end.y) * 0.5;
    let outline_half = outline_width * 0.5;
    let corner_radius = style.corner_radius;
    let anti_alias = style.anti_alias;
    let outline = style.outline;

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
            let py = y as f32 + 0.5 - cy;
            for x in x0..x1 {
                let px = x as f32 + 0.5 - cx;
                let d = shape_sdf(kind, px, py, hx, hy, corner_radius);
                let mut out = Rgba(row[x]);

                if let Some(color) = fill.color_at(x as i32, y as i32) {
                    let cov = coverage(d, anti_alias);
                    if cov > 0.001 {
                        out = blend_pixel(out, color, cov);
                    }
                }
                if outline_half > 0.0 {
                    let cov = coverage(d.abs() - outline_half, anti_alias);
                    if cov > 0.001 {
                        out = blend_pixel(out, outline, cov);
                    }
                }
                row[x] = out.0;
            }
        });

    Some(dirty)
}

/// Paint a round-capped segment of half-thickness `radius`.
pub(crate) fn draw_segment(
    surface: &mut PixelSurface,
    from: Point,
    to: Point,
    radius: f32,
    color: Rgba<u8>,
    anti_alias: bool,
) -> Option<PixelRect> {
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
                let d = sdf_line_segment(x as f32 + 0.5, py, from.x, from.y, to.x, to.y) - radius;
                let cov = coverage(d, anti_alias);
                if cov > 0.001 {
                    row[x] = blend_pixel(Rgba(row[x]), color, cov).0;
                }
            }
        });
    Some(dirty)
}

/// Unclipped pixel rectangle covering a segment thickened by `radius`.
pub(crate) fn segment_bounds(from: Point, to: Point, radius: f32) -> Option<PixelRect> {
    if !from.is_sane() || !to.is_sane() || !radius.is_finite() || radius <= 0.0 {
        return None;
    }
    Some(PixelRect::from_points(from, to).inflate((radius.ceil() as u32).saturating_add(1)))
}

/// Smoothstep between edge0 and edge1.
#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::pattern::PatternKind;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    #[test]
    fn test_filled_rectangle_hard_edges() {
        let mut surface = PixelSurface::new(32, 32).unwrap();
        let style = ShapeStyle::filled(BLUE, 0.0, PatternSpec::solid(RED));
        let dirty = draw_shape(&mut surface, ShapeKind::Rectangle, Point::new(10.0, 10.0), Point::new(20.0, 20.0), &style);
        assert!(dirty.is_some());
        assert_eq!(surface.get(10, 10), Some(RED));
        assert_eq!(surface.get(19, 19), Some(RED));
        assert_eq!(surface.get(9, 9), Some(Rgba([0, 0, 0, 0])));
        assert_eq!(surface.get(20, 20), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn test_outline_only_leaves_interior() {
        let mut surface = PixelSurface::new(40, 40).unwrap();
        let style = ShapeStyle::outline_only(BLUE, 2.0);
        draw_shape(&mut surface, ShapeKind::Rectangle, Point::new(5.0, 5.0), Point::new(35.0, 35.0), &style);
        assert_eq!(surface.get(20, 20), Some(Rgba([0, 0, 0, 0])));
        assert_eq!(surface.get(5, 20), Some(BLUE));
    }

    #[test]
    fn test_zero_area_drag_is_noop() {
        let mut surface = PixelSurface::new(16, 16).unwrap();
        let before = surface.clone();
        let style = ShapeStyle::filled(BLUE, 1.0, PatternSpec::solid(RED));
        assert!(draw_shape(&mut surface, ShapeKind::Ellipse, Point::new(4.0, 4.0), Point::new(4.0, 12.0), &style).is_none());
        assert!(draw_shape(&mut surface, ShapeKind::Line, Point::new(4.0, 4.0), Point::new(4.0, 4.0), &style).is_none());
        assert!(draw_shape(&mut surface, ShapeKind::Star, Point::new(f32::NAN, 4.0), Point::new(9.0, 9.0), &style).is_none());
        assert_eq!(surface, before);
    }

    #[test]
    fn test_huge_outline_width_is_capped() {
        let style = ShapeStyle::outline_only(RED, 1e10);
        for kind in [ShapeKind::Rectangle, ShapeKind::Line] {
            let mut surface = PixelSurface::new(40, 40).unwrap();
            let dirty = draw_shape(&mut surface, kind, Point::new(4.0, 4.0), Point::new(30.0, 30.0), &style);
            assert_eq!(dirty, Some(PixelRect::new(0, 0, 40, 40)), "{:?}", kind);
            assert_eq!(surface.get(20, 20), Some(RED), "{:?}", kind);
        }
        assert!(segment_bounds(Point::ZERO, Point::new(1.0, 1.0), 1e12).is_some());
    }

    #[test]
    fn test_every_closed_shape_contains_its_centre() {
        for &kind in ShapeKind::all().iter().filter(|k| k.has_interior()) {
            let mut surface = PixelSurface::new(64, 64).unwrap();
            let style = ShapeStyle::filled(BLUE, 0.0, PatternSpec::solid(RED));
            draw_shape(&mut surface, kind, Point::new(8.0, 8.0), Point::new(56.0, 56.0), &style);
            assert_eq!(surface.get(32, 33), Some(RED), "{:?}", kind);
            assert_eq!(surface.get(0, 0), Some(Rgba([0, 0, 0, 0])), "{:?}", kind);
        }
    }

    #[test]
    fn test_pattern_fill_uses_both_colours() {
        let mut surface = PixelSurface::new(32, 32).unwrap();
        let spec = PatternSpec::new(PatternKind::Checkerboard, RED, BLUE);
        let style = ShapeStyle::filled(RED, 0.0, spec);
        draw_shape(&mut surface, ShapeKind::Rectangle, Point::new(0.0, 0.0), Point::new(32.0, 32.0), &style);
        let colours: std::collections::HashSet<[u8; 4]> = surface.pixels().iter().copied().collect();
        assert!(colours.contains(&RED.0));
        assert!(colours.contains(&BLUE.0));
    }

    #[test]
    fn test_line_is_drawn_with_thickness() {
        let mut surface = PixelSurface::new(20, 20).unwrap();
        let style = ShapeStyle::outline_only(BLUE, 3.0);
        draw_shape(&mut surface, ShapeKind::Line, Point::new(2.0, 10.5), Point::new(18.0, 10.5), &style);
        assert_eq!(surface.get(10, 10), Some(BLUE));
        assert_eq!(surface.get(10, 11), Some(BLUE));
        assert_eq!(surface.get(10, 5), Some(Rgba([0, 0, 0, 0])));
    }
}
