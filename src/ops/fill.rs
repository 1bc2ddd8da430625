// ============================================================================
// FLOOD FILL: exact-match 4-connected fill with hard work caps
// ============================================================================

use std::sync::mpsc;

use image::Rgba;
use rayon::prelude::*;

use crate::canvas::PixelSurface;
use crate::coords::PixelRect;
use crate::error::{try_alloc_bytes, EngineError, Result};
use crate::ops::pattern::{PatternKind, PatternSpec, PatternTile};

/// Hard ceiling on pixels a single fill may visit.
pub const MAX_FILL_VISITED: usize = 10_000_000;
/// Hard ceiling on the pending work list.
pub const MAX_FILL_QUEUED: usize = 1_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillLimits {
    pub max_visited: usize,
    pub max_queued: usize,
}

impl Default for FillLimits {
    fn default() -> Self {
        Self {
            max_visited: MAX_FILL_VISITED,
            max_queued: MAX_FILL_QUEUED,
        }
    }
}

/// What a completed fill touched.  `bounds == None` means nothing changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FillOutcome {
    pub bounds: Option<PixelRect>,
    pub pixels_changed: usize,
}

impl FillOutcome {
    pub const NONE: FillOutcome = FillOutcome {
        bounds: None,
        pixels_changed: 0,
    };

    pub fn is_noop(&self) -> bool {
        self.bounds.is_none()
    }
}

/// The connected component of pixels matching the seed colour.
pub struct FillRegion {
    width: u32,
    /// `width * height` bytes, 255 = member of the region.
    mask: Vec<u8>,
    pub bounds: PixelRect,
    pub pixel_count: usize,
    pub seed_color: Rgba<u8>,
}

impl FillRegion {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        let idx = y as usize * self.width as usize + x as usize;
        self.mask.get(idx).is_some_and(|m| *m != 0)
    }
}

/// Scan the 4-connected region of pixels exactly equal to the seed pixel.
///
/// Scanline fill: each popped seed is widened into a horizontal run, then
/// one seed per matching run is queued in the rows above and below, so the
/// work list grows with the number of spans, not pixels.  Aborts with
/// [`EngineError::FillAborted`] once either limit is exceeded; nothing is written.
pub fn find_region(
    pixels: &[[u8; 4]],
    width: u32,
    height: u32,
    seed: (u32, u32),
    limits: FillLimits,
) -> Result<FillRegion> {
    let wu = width as usize;
    let hu = height as usize;
    let (sx, sy) = seed;
    if sx >= width || sy >= height || pixels.len() != wu * hu {
        return Err(EngineError::InvalidDimensions { width, height });
    }

    // mask doubles as the visited array and the output
    let mut mask = try_alloc_bytes(wu * hu)?;
    let target = pixels[sy as usize * wu + sx as usize];

    let mut min_x = sx;
    let mut min_y = sy;
    let mut max_x = sx;
    let mut max_y = sy;

    let mut stack: Vec<(u32, u32)> = Vec::with_capacity(1024);
    stack.push((sx, sy));
    let mut visited = 0usize;

    while let Some((x, y)) = stack.pop() {
        let row = y as usize * wu;
        if !fillable(pixels, &mask, target, row + x as usize) {
            continue;
        }

        let mut left = x;
        while left > 0 && fillable(pixels, &mask, target, row + left as usize - 1) {
            left -= 1;
        }
        let mut right = x;
        while right + 1 < width && fillable(pixels, &mask, target, row + right as usize + 1) {
            right += 1;
        }
        mask[row + left as usize..=row + right as usize].fill(255);
        visited += (right - left) as usize + 1;
        if visited > limits.max_visited {
            return Err(EngineError::FillAborted {
                visited,
                queued: stack.len(),
            });
        }

        min_x = min_x.min(left);
        max_x = max_x.max(right);
        min_y = min_y.min(y);
        max_y = max_y.max(y);

        // One seed per run of fillable pixels in each neighbouring row
        let above = y.checked_sub(1);
        let below = (y + 1 < height).then_some(y + 1);
        for ny in [above, below].into_iter().flatten() {
            let nrow = ny as usize * wu;
            let mut in_run = false;
            for nx in left..=right {
                let open = fillable(pixels, &mask, target, nrow + nx as usize);
                if open && !in_run {
                    stack.push((nx, ny));
                    if stack.len() > limits.max_queued {
                        return Err(EngineError::FillAborted {
                            visited,
                            queued: stack.len(),
                        });
                    }
                }
                in_run = open;
            }
        }
    }

    Ok(FillRegion {
        width,
        mask,
        bounds: PixelRect::from_inclusive(min_x, min_y, max_x, max_y),
        pixel_count: visited,
        seed_color: Rgba(target),
    })
}

#[inline]
fn fillable(pixels: &[[u8; 4]], mask: &[u8], target: [u8; 4], idx: usize) -> bool {
    mask[idx] == 0 && pixels[idx] == target
}

/// Solid flood fills always paint opaque.
fn opaque(color: Rgba<u8>) -> Rgba<u8> {
    Rgba([color[0], color[1], color[2], 255])
}

/// True when filling a region of `seed_color` with `spec` would not change a byte.
pub fn is_noop_fill(seed_color: Rgba<u8>, spec: &PatternSpec) -> bool {
    match spec.kind {
        PatternKind::Solid => opaque(spec.primary) == seed_color,
        PatternKind::Transparent => seed_color[3] == 0,
        kind => PatternTile::new(kind, spec.primary, spec.secondary)
            .and_then(|tile| tile.uniform_color())
            .is_some_and(|c| c == seed_color),
    }
}

/// Rewrite exactly the pixels of `region` according to `spec`.
///
/// Pattern fills render the tile over the region's bounding box and copy
/// only masked pixels, indexed by their position inside the box, so
/// unconnected holes keep their colour.
pub fn apply_region(surface: &mut PixelSurface, region: &FillRegion, spec: &PatternSpec) -> Result<usize> {
    let (width, height) = surface.dimensions();
    if region.width != width || region.mask.len() != width as usize * height as usize {
        return Err(EngineError::InvalidDimensions { width, height });
    }
    let bounds = region.bounds;
    let band = match spec.kind {
        PatternKind::Solid | PatternKind::Transparent => None,
        kind => match PatternTile::new(kind, spec.primary, spec.secondary) {
            Some(tile) => Some(tile.render(bounds.width, bounds.height)?),
            None => None,
        },
    };
    let solid = opaque(spec.primary).0;
    let erase = spec.kind == PatternKind::Transparent;

    let row_px = surface.width() as usize;
    let (x0, y0) = (bounds.x as usize, bounds.y as usize);
    let mask = &region.mask;
    surface
        .pixels_mut()
        .par_chunks_mut(row_px)
        .enumerate()
        .skip(y0)
        .take(bounds.height as usize)
        .for_each(|(y, row)| {
            let mask_row = &mask[y * row_px..(y + 1) * row_px];
            for x in x0..x0 + bounds.width as usize {
                if mask_row[x] == 0 {
                    continue;
                }
                let px = &mut row[x];
                if erase {
                    px[3] = 0;
                } else if let Some(band) = &band {
                    *px = band.get_pixel((x - x0) as u32, (y - y0) as u32).0;
                } else {
                    *px = solid;
                }
            }
        });
    Ok(region.pixel_count)
}

/// Flood fill `surface` from `seed` (canvas pixel, top-left origin).
///
/// Out-of-range seeds and fills that would not change anything return
/// [`FillOutcome::NONE`].  Exceeding `limits` returns an error and leaves the
/// surface untouched.
pub fn flood_fill(
    surface: &mut PixelSurface,
    seed: (i32, i32),
    spec: &PatternSpec,
    limits: FillLimits,
) -> Result<FillOutcome> {
    let Some(seed_color) = surface.get(seed.0, seed.1) else {
        return Ok(FillOutcome::NONE);
    };
    if is_noop_fill(seed_color, spec) {
        return Ok(FillOutcome::NONE);
    }
    let (width, height) = surface.dimensions();
    let region = find_region(surface.pixels(), width, height, (seed.0 as u32, seed.1 as u32), limits)?;
    let changed = apply_region(surface, &region, spec)?;
    Ok(FillOutcome {
        bounds: Some(region.bounds),
        pixels_changed: changed,
    })
}

// ============================================================================
// BACKGROUND FILL JOB
// ============================================================================

/// Result of a background fill: the filled private copy plus what changed.
pub struct FillJobOutput {
    pub surface: PixelSurface,
    pub outcome: FillOutcome,
}

/// A flood fill running on a rayon worker against a private pixel copy.
///
/// The live layer is only touched when the owner hands the output back on
/// the drawing thread.
pub struct FillJob {
    receiver: mpsc::Receiver<Result<FillJobOutput>>,
}

impl FillJob {
    pub fn spawn(surface: PixelSurface, seed: (i32, i32), spec: PatternSpec, limits: FillLimits) -> Self {
        let (tx, rx) = mpsc::channel();
        rayon::spawn(move || {
            let mut surface = surface;
            let result = flood_fill(&mut surface, seed, &spec, limits).map(|outcome| FillJobOutput { surface, outcome });
            let _ = tx.send(result);
        });
        Self { receiver: rx }
    }

    /// Non-blocking check; `None` while the worker is still running.
    pub fn poll(&self) -> Option<Result<FillJobOutput>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(EngineError::WorkerDisconnected)),
        }
    }

    /// Block until the worker finishes.
    pub fn wait(self) -> Result<FillJobOutput> {
        self.receiver.recv().map_err(|_| EngineError::WorkerDisconnected)?
    }
}
