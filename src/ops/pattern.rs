// ============================================================================
// PATTERN GENERATOR: solid / transparent / tiled fills for shapes and flood fill
// ============================================================================

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::coords::PixelRect;
use crate::error::{try_alloc_bytes, EngineError, Result};

/// Edge length of a pattern tile in pixels.  Stripe and dot spacing derive
/// from it and are not user-configurable.
pub const PATTERN_TILE_SIZE: u32 = 8;

/// Fill pattern selected by the tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    #[default]
    Solid,
    /// Explicit absence of fill (stroke-only shapes, erasing flood fill).
    Transparent,
    HorizontalStripes,
    VerticalStripes,
    DiagonalStripes,
    Checkerboard,
    Dots,
}

impl PatternKind {
    pub fn all() -> &'static [PatternKind] {
        &[
            PatternKind::Solid,
            PatternKind::Transparent,
            PatternKind::HorizontalStripes,
            PatternKind::VerticalStripes,
            PatternKind::DiagonalStripes,
            PatternKind::Checkerboard,
            PatternKind::Dots,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::Solid => "solid",
            PatternKind::Transparent => "transparent",
            PatternKind::HorizontalStripes => "horizontal_stripes",
            PatternKind::VerticalStripes => "vertical_stripes",
            PatternKind::DiagonalStripes => "diagonal_stripes",
            PatternKind::Checkerboard => "checkerboard",
            PatternKind::Dots => "dots",
        }
    }

    pub fn from_name(name: &str) -> Option<PatternKind> {
        let name = name.trim().to_ascii_lowercase().replace('-', "_");
        PatternKind::all().iter().copied().find(|k| k.name() == name)
    }

    /// True for the four patterns backed by a repeating tile.
    pub fn is_tiled(&self) -> bool {
        !matches!(self, PatternKind::Solid | PatternKind::Transparent)
    }
}

/// Pattern kind plus the two colours it combines.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatternSpec {
    pub kind: PatternKind,
    pub primary: Rgba<u8>,
    pub secondary: Rgba<u8>,
}

impl PatternSpec {
    pub fn new(kind: PatternKind, primary: Rgba<u8>, secondary: Rgba<u8>) -> Self {
        Self { kind, primary, secondary }
    }

    pub fn solid(color: Rgba<u8>) -> Self {
        Self::new(PatternKind::Solid, color, color)
    }

    pub fn transparent() -> Self {
        Self::new(PatternKind::Transparent, Rgba([0, 0, 0, 0]), Rgba([0, 0, 0, 0]))
    }
}

/// A small repeatable block of pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternTile {
    image: RgbaImage,
}

impl PatternTile {
    /// Synthesize the tile for a tiled pattern kind; `None` for solid/transparent.
    pub fn new(kind: PatternKind, primary: Rgba<u8>, secondary: Rgba<u8>) -> Option<Self> {
        if !kind.is_tiled() {
            return None;
        }
        let s = PATTERN_TILE_SIZE;
        let half = s / 2;
        let centre = (s as f32 - 1.0) * 0.5;
        let dot_r2 = (s as f32 * 0.3) * (s as f32 * 0.3);
        let image = RgbaImage::from_fn(s, s, |x, y| {
            let use_primary = match kind {
                PatternKind::HorizontalStripes => y < half,
                PatternKind::VerticalStripes => x < half,
                PatternKind::DiagonalStripes => (x + y) % s < half,
                PatternKind::Checkerboard => (x < half) == (y < half),
                PatternKind::Dots => {
                    let dx = x as f32 - centre;
                    let dy = y as f32 - centre;
                    dx * dx + dy * dy <= dot_r2
                }
                PatternKind::Solid | PatternKind::Transparent => true,
            };
            if use_primary { primary } else { secondary }
        });
        Some(Self { image })
    }

    pub fn size(&self) -> u32 {
        self.image.width()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Tile pixel at a position relative to the tile origin (wraps).
    #[inline]
    pub fn sample(&self, x: i64, y: i64) -> Rgba<u8> {
        let s = self.image.width() as i64;
        *self.image.get_pixel(x.rem_euclid(s) as u32, y.rem_euclid(s) as u32)
    }

    /// The single colour of a tile whose pixels are all identical.
    pub fn uniform_color(&self) -> Option<Rgba<u8>> {
        let mut pixels = self.image.pixels();
        let first = *pixels.next()?;
        pixels.all(|p| *p == first).then_some(first)
    }

    /// Repeat the tile over a `width`×`height` band anchored at the tile origin.
    pub fn render(&self, width: u32, height: u32) -> Result<RgbaImage> {
        let buf = try_alloc_bytes(width as usize * height as usize * 4)?;
        let mut band = RgbaImage::from_raw(width, height, buf)
            .ok_or(EngineError::InvalidDimensions { width, height })?;
        let row_px = width as usize;
        if row_px == 0 {
            return Ok(band);
        }
        let out: &mut [[u8; 4]] = bytemuck::cast_slice_mut::<u8, [u8; 4]>(&mut band);
        out.par_chunks_mut(row_px).enumerate().for_each(|(y, row)| {
            for (x, px) in row.iter_mut().enumerate() {
                *px = self.sample(x as i64, y as i64).0;
            }
        });
        Ok(band)
    }
}

/// What a fill pass writes.
#[derive(Clone, Debug, PartialEq)]
pub enum Fill {
    /// Stroke-only: skip the fill pass.
    None,
    Solid(Rgba<u8>),
    /// Tile repeated from `origin` (canvas coordinates of tile pixel 0,0).
    Pattern { tile: PatternTile, origin: (i32, i32) },
}

impl Fill {
    pub fn is_none(&self) -> bool {
        matches!(self, Fill::None)
    }

    /// Colour written at canvas pixel (`x`, `y`); `None` for [`Fill::None`].
    #[inline]
    pub fn color_at(&self, x: i32, y: i32) -> Option<Rgba<u8>> {
        match self {
            Fill::None => None,
            Fill::Solid(c) => Some(*c),
            Fill::Pattern { tile, origin } => {
                Some(tile.sample(x as i64 - origin.0 as i64, y as i64 - origin.1 as i64))
            }
        }
    }
}

/// Resolve a pattern spec into a fill aligned to `bounds`.
pub fn generate(spec: &PatternSpec, bounds: PixelRect) -> Fill {
    match spec.kind {
        PatternKind::Solid => Fill::Solid(spec.primary),
        PatternKind::Transparent => Fill::None,
        kind => match PatternTile::new(kind, spec.primary, spec.secondary) {
            Some(tile) => Fill::Pattern {
                tile,
                origin: (bounds.x, bounds.y),
            },
            None => Fill::Solid(spec.primary),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    #[test]
    fn test_horizontal_stripes_split_tile() {
        let tile = PatternTile::new(PatternKind::HorizontalStripes, RED, BLUE).unwrap();
        assert_eq!(tile.sample(0, 0), RED);
        assert_eq!(tile.sample(7, 3), RED);
        assert_eq!(tile.sample(0, 4), BLUE);
        assert_eq!(tile.sample(3, 12), BLUE);
        assert_eq!(tile.sample(3, 8), RED);
    }

    #[test]
    fn test_checkerboard_quadrants() {
        let tile = PatternTile::new(PatternKind::Checkerboard, RED, BLUE).unwrap();
        assert_eq!(tile.sample(0, 0), RED);
        assert_eq!(tile.sample(4, 0), BLUE);
        assert_eq!(tile.sample(0, 4), BLUE);
        assert_eq!(tile.sample(4, 4), RED);
    }

    #[test]
    fn test_dots_centre_and_corner() {
        let tile = PatternTile::new(PatternKind::Dots, RED, BLUE).unwrap();
        assert_eq!(tile.sample(3, 3), RED);
        assert_eq!(tile.sample(0, 0), BLUE);
    }

    #[test]
    fn test_generate_solid_and_transparent() {
        let bounds = PixelRect::new(0, 0, 10, 10);
        assert_eq!(generate(&PatternSpec::solid(RED), bounds), Fill::Solid(RED));
        assert!(generate(&PatternSpec::transparent(), bounds).is_none());
    }

    #[test]
    fn test_pattern_aligned_to_bounds_origin() {
        let spec = PatternSpec::new(PatternKind::VerticalStripes, RED, BLUE);
        let fill = generate(&spec, PixelRect::new(5, 5, 20, 20));
        assert_eq!(fill.color_at(5, 5), Some(RED));
        assert_eq!(fill.color_at(9, 5), Some(BLUE));
        assert_eq!(fill.color_at(4, 5), Some(BLUE));
    }

    #[test]
    fn test_uniform_tile_detected() {
        let tile = PatternTile::new(PatternKind::Dots, RED, RED).unwrap();
        assert_eq!(tile.uniform_color(), Some(RED));
        let tile = PatternTile::new(PatternKind::Dots, RED, BLUE).unwrap();
        assert_eq!(tile.uniform_color(), None);
    }

    #[test]
    fn test_render_band_repeats_tile() {
        let tile = PatternTile::new(PatternKind::DiagonalStripes, RED, BLUE).unwrap();
        let band = tile.render(20, 3).unwrap();
        assert_eq!(band.dimensions(), (20, 3));
        assert_eq!(*band.get_pixel(8, 0), *band.get_pixel(0, 0));
        assert_eq!(*band.get_pixel(17, 2), tile.sample(1, 2));
    }

    #[test]
    fn test_pattern_names_roundtrip() {
        assert_eq!(PatternKind::from_name("checkerboard"), Some(PatternKind::Checkerboard));
        assert_eq!(PatternKind::from_name("Diagonal-Stripes"), Some(PatternKind::DiagonalStripes));
        assert_eq!(PatternKind::from_name("plaid"), None);
    }
}
