// ============================================================================
// SELECTION & CLIPBOARD: copy / cut / paste on the active layer
// ============================================================================

use image::{Rgba, RgbaImage};

use crate::canvas::{PixelSurface, TRANSPARENT};
use crate::coords::{PixelRect, Point};
use crate::error::{try_alloc_bytes, EngineError, Result};

/// Region marked for copy/cut.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SelectionShape {
    Rectangle(PixelRect),
    /// Pixels whose centre lies within `radius` of (`cx`, `cy`).
    Circle { cx: f32, cy: f32, radius: f32 },
}

impl SelectionShape {
    /// Rectangle spanning two drag points.  `None` for zero-area or non-finite input.
    pub fn rectangle(a: Point, b: Point) -> Option<Self> {
        if !a.is_sane() || !b.is_sane() {
            return None;
        }
        let rect = PixelRect::from_points(a, b);
        if rect.is_empty() {
            return None;
        }
        Some(SelectionShape::Rectangle(rect))
    }

    pub fn circle(origin: Point, radius: f32) -> Option<Self> {
        if !origin.is_sane() || !radius.is_finite() || radius <= 0.0 {
            return None;
        }
        Some(SelectionShape::Circle {
            cx: origin.x,
            cy: origin.y,
            radius,
        })
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        match self {
            SelectionShape::Rectangle(r) => r.contains(x, y),
            SelectionShape::Circle { cx, cy, radius } => {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                dx * dx + dy * dy <= radius * radius
            }
        }
    }

    /// Bounding box in pixel coordinates (unclipped).
    pub fn bounds(&self) -> PixelRect {
        match self {
            SelectionShape::Rectangle(r) => *r,
            SelectionShape::Circle { cx, cy, radius } => {
                PixelRect::from_points(Point::new(cx - radius, cy - radius), Point::new(cx + radius, cy + radius))
            }
        }
    }
}

/// The one active selection.  Making a new one replaces it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selection {
    pub shape: SelectionShape,
}

impl Selection {
    pub fn new(shape: SelectionShape) -> Self {
        Self { shape }
    }
}

/// Copied pixels plus where they came from.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipboardImage {
    pub image: RgbaImage,
    /// Canvas rectangle the pixels were copied from.
    pub source: PixelRect,
}

/// Copy selected pixels from `surface`.  Pixels in the bounding box but
/// outside the shape come out transparent.  `Ok(None)` when the selection
/// misses the surface entirely.
pub fn copy_selection(surface: &PixelSurface, shape: &SelectionShape) -> Result<Option<ClipboardImage>> {
    let Some(clip) = shape.bounds().clip(surface.width(), surface.height()) else {
        return Ok(None);
    };
    let (w, h) = (clip.width, clip.height);
    let buf = try_alloc_bytes(w as usize * h as usize * 4)?;
    let mut image = RgbaImage::from_raw(w, h, buf).ok_or(EngineError::InvalidDimensions { width: w, height: h })?;

    for y in 0..h {
        for x in 0..w {
            let cx = clip.x + x as i32;
            let cy = clip.y + y as i32;
            if shape.contains(cx, cy)
                && let Some(px) = surface.get(cx, cy)
            {
                image.put_pixel(x, y, px);
            }
        }
    }
    Ok(Some(ClipboardImage { image, source: clip }))
}

/// Cut = copy + clear selected pixels to transparent.
pub fn cut_selection(surface: &mut PixelSurface, shape: &SelectionShape) -> Result<Option<ClipboardImage>> {
    let Some(copied) = copy_selection(surface, shape)? else {
        return Ok(None);
    };
    let src = copied.source;
    for y in src.y..src.y + src.height as i32 {
        for x in src.x..src.x + src.width as i32 {
            if shape.contains(x, y) {
                surface.set(x, y, TRANSPARENT);
            }
        }
    }
    Ok(Some(copied))
}

/// Blend the clipboard onto `surface` centred on `center`.
/// Returns the clipped rectangle written, or `None` if it lands off-canvas.
pub fn paste_at(surface: &mut PixelSurface, clip: &ClipboardImage, center: Point) -> Option<PixelRect> {
    if !center.is_sane() {
        return None;
    }
    let (w, h) = clip.image.dimensions();
    let x = (center.x - w as f32 * 0.5).round() as i32;
    let y = (center.y - h as f32 * 0.5).round() as i32;
    let rect = PixelRect::new(x, y, w, h).clip(surface.width(), surface.height())?;
    surface.blit(&clip.image, x, y, 1.0);
    Some(rect)
}

/// True when every pixel of `image` is fully transparent.
pub fn is_blank(image: &RgbaImage) -> bool {
    image.pixels().all(|p: &Rgba<u8>| p[3] == 0)
}
