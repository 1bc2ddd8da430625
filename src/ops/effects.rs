// ============================================================================
// COLOUR POLICIES AND POST-DRAW OVERLAYS: rainbow hue rotation, sparkle
// ============================================================================

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::canvas::PixelSurface;
use crate::coords::PixelRect;

/// How the primary colour is chosen for each draw call.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorPolicy {
    /// Use the selected colour as-is.
    #[default]
    Solid,
    /// Rotate the hue by `step_degrees` every time a colour is resolved.
    RotatingHue { step_degrees: f32, hue: f32 },
}

impl ColorPolicy {
    pub fn rainbow(step_degrees: f32) -> Self {
        ColorPolicy::RotatingHue { step_degrees, hue: 0.0 }
    }

    /// Colour for the next draw call.  Advances the rotation.
    ///
    /// Grey and black inputs are lifted to full saturation/value first,
    /// otherwise rotating their hue would have no visible effect.
    pub fn resolve(&mut self, base: Rgba<u8>) -> Rgba<u8> {
        match self {
            ColorPolicy::Solid => base,
            ColorPolicy::RotatingHue { step_degrees, hue } => {
                let [h, s, v] = rgb_to_hsv(base);
                let s = if s < 0.05 { 1.0 } else { s };
                let v = if v < 0.05 { 1.0 } else { v };
                let rotated = (h + *hue / 360.0).rem_euclid(1.0);
                let out = hsv_to_rgb(rotated, s, v, base[3]);
                if step_degrees.is_finite() {
                    *hue = (*hue + *step_degrees).rem_euclid(360.0);
                }
                out
            }
        }
    }
}

/// Random speckles painted over the area a draw call touched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SparkleOverlay {
    /// Probability in [0, 1] that a pixel in the affected area sparkles.
    pub density: f32,
    pub color: Rgba<u8>,
}

impl Default for SparkleOverlay {
    fn default() -> Self {
        Self {
            density: 0.02,
            color: Rgba([255, 255, 255, 255]),
        }
    }
}

impl SparkleOverlay {
    /// Speckle pixels inside `bounds`.  Returns how many pixels were painted.
    pub fn apply(&self, surface: &mut PixelSurface, bounds: PixelRect, seed: u32) -> usize {
        let Some(clip) = bounds.clip(surface.width(), surface.height()) else {
            return 0;
        };
        let density = if self.density.is_finite() { self.density.clamp(0.0, 1.0) } else { 0.0 };
        if density <= 0.0 {
            return 0;
        }
        let mut painted = 0;
        for y in clip.y..clip.y + clip.height as i32 {
            for x in clip.x..clip.x + clip.width as i32 {
                if hash_f32(x as u32, y as u32, seed) < density {
                    surface.blend(x, y, self.color);
                    painted += 1;
                }
            }
        }
        painted
    }
}

// -- Deterministic noise ---------------------------------------------------

/// Simple hash for deterministic noise.
#[inline]
pub(crate) fn hash_u32(mut x: u32) -> u32 {
    x = x.wrapping_mul(0x9E3779B9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EBCA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2AE35);
    x ^= x >> 16;
    x
}

/// Hash to f32 in [0, 1).
#[inline]
pub(crate) fn hash_f32(x: u32, y: u32, seed: u32) -> f32 {
    let h = hash_u32(
        x.wrapping_mul(374761393)
            .wrapping_add(y.wrapping_mul(668265263))
            .wrapping_add(seed),
    );
    (h & 0x00FFFFFF) as f32 / 16777216.0
}

// -- Colour-space conversions -----------------------------------

pub fn rgb_to_hsv(color: Rgba<u8>) -> [f32; 3] {
    let r = color[0] as f32 / 255.0;
    let g = color[1] as f32 / 255.0;
    let b = color[2] as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;

    let h = if d == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / d % 6.0) / 6.0
    } else if max == g {
        (((b - r) / d) + 2.0) / 6.0
    } else {
        (((r - g) / d) + 4.0) / 6.0
    };
    let h = if h < 0.0 { h + 1.0 } else { h };
    let s = if max == 0.0 { 0.0 } else { d / max };
    [h, s, max]
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32, a: u8) -> Rgba<u8> {
    let h6 = h.rem_euclid(1.0) * 6.0;
    let c = v * s;
    let x = c * (1.0 - ((h6 % 2.0) - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match h6 as i32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    Rgba([
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
        a,
    ])
}
