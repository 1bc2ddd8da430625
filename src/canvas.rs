use image::{imageops, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::coords::PixelRect;
use crate::error::{try_alloc_bytes, try_copy_bytes, EngineError, Result};

/// Largest width or height a surface may have.
pub const MAX_DIMENSION: u32 = 10_000;
/// Largest pixel count a surface may have (width × height).
pub const MAX_PIXELS: u64 = 100_000_000;

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Reject dimensions that are zero, exceed [`MAX_DIMENSION`] on either axis,
/// or exceed [`MAX_PIXELS`] in area.
pub fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    let area = width as u64 * height as u64;
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION || area > MAX_PIXELS {
        return Err(EngineError::InvalidDimensions { width, height });
    }
    Ok(())
}

// ============================================================================
// PIXEL SURFACE: one contiguous RGBA buffer, row-major, top-left origin
// ============================================================================

/// Raw RGBA pixel storage for a single layer.
///
/// The buffer length is always `width * height * 4`; every resize builds a
/// new surface.  Coordinate accessors silently ignore out-of-range input so
/// noisy pointer streams can be fed straight in.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelSurface {
    image: RgbaImage,
}

impl PixelSurface {
    // ---- construction -------------------------------------------------------

    /// Fully transparent surface.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        validate_dimensions(width, height)?;
        let len = width as usize * height as usize * 4;
        let buf = try_alloc_bytes(len)?;
        let image = RgbaImage::from_raw(width, height, buf)
            .ok_or(EngineError::InvalidDimensions { width, height })?;
        Ok(Self { image })
    }

    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Result<Self> {
        let mut surface = Self::new(width, height)?;
        if color != TRANSPARENT {
            surface.clear(color);
        }
        Ok(surface)
    }

    /// Adopt an existing image buffer (dimensions are validated).
    pub fn from_image(image: RgbaImage) -> Result<Self> {
        validate_dimensions(image.width(), image.height())?;
        Ok(Self { image })
    }

    /// Deep copy that reports allocation failure instead of aborting.
    pub fn try_clone(&self) -> Result<Self> {
        let buf = try_copy_bytes(self.image.as_raw())?;
        let (width, height) = self.image.dimensions();
        let image = RgbaImage::from_raw(width, height, buf)
            .ok_or(EngineError::InvalidDimensions { width, height })?;
        Ok(Self { image })
    }

    // ---- geometry -------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    pub fn bounds(&self) -> PixelRect {
        PixelRect::new(0, 0, self.width(), self.height())
    }

    // ---- pixel access -------------------------------------------------------

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<Rgba<u8>> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some(*self.image.get_pixel(x as u32, y as u32))
    }

    /// Overwrite a pixel.  Out-of-range writes are ignored.
    #[inline]
    pub fn set(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if self.in_bounds(x, y) {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }

    /// Source-over blend `color` onto a pixel.  Out-of-range writes are ignored.
    #[inline]
    pub fn blend(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if self.in_bounds(x, y) {
            let px = self.image.get_pixel_mut(x as u32, y as u32);
            *px = blend_pixel(*px, color, 1.0);
        }
    }

    /// Set a pixel's alpha to zero.
    #[inline]
    pub fn erase(&mut self, x: i32, y: i32) {
        if self.in_bounds(x, y) {
            self.image.get_pixel_mut(x as u32, y as u32)[3] = 0;
        }
    }

    pub fn clear(&mut self, color: Rgba<u8>) {
        self.pixels_mut().par_iter_mut().for_each(|px| *px = color.0);
    }

    /// Flat RGBA bytes.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Pixels viewed as `[r, g, b, a]` quads.
    pub fn pixels(&self) -> &[[u8; 4]] {
        bytemuck::cast_slice::<u8, [u8; 4]>(self.image.as_raw())
    }

    pub fn pixels_mut(&mut self) -> &mut [[u8; 4]] {
        bytemuck::cast_slice_mut::<u8, [u8; 4]>(&mut self.image)
    }

    /// Borrow the backing image.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Renderable copy of the current buffer (never cached).
    pub fn to_image(&self) -> RgbaImage {
        self.image.clone()
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn memory_bytes(&self) -> usize {
        self.image.as_raw().len()
    }

    // ---- bulk operations ----------------------------------------------------

    /// Draw `src` scaled into `dest` (source-over).  Empty rects are no-ops.
    pub fn draw_image(&mut self, src: &RgbaImage, dest: PixelRect) {
        if dest.is_empty() || src.width() == 0 || src.height() == 0 {
            return;
        }
        if dest.width as u64 * dest.height as u64 > MAX_PIXELS {
            log::warn!("draw_image: destination {}x{} exceeds pixel cap", dest.width, dest.height);
            return;
        }
        if src.dimensions() == (dest.width, dest.height) {
            self.blit(src, dest.x, dest.y, 1.0);
        } else {
            let scaled = imageops::resize(src, dest.width, dest.height, imageops::FilterType::Triangle);
            self.blit(&scaled, dest.x, dest.y, 1.0);
        }
    }

    /// Blend `src` with its top-left corner at (`dst_x`, `dst_y`), clipped.
    pub fn blit(&mut self, src: &RgbaImage, dst_x: i32, dst_y: i32, opacity: f32) {
        let rect = PixelRect::new(dst_x, dst_y, src.width(), src.height());
        let Some(clip) = rect.clip(self.width(), self.height()) else {
            return;
        };
        let row_px = self.width() as usize;
        let src_x0 = (clip.x - dst_x) as u32;
        let src_y0 = (clip.y - dst_y) as u32;
        let pixels = self.pixels_mut();
        pixels
            .par_chunks_mut(row_px)
            .enumerate()
            .skip(clip.y as usize)
            .take(clip.height as usize)
            .for_each(|(y, row)| {
                let sy = src_y0 + (y as u32 - clip.y as u32);
                for i in 0..clip.width {
                    let sx = src_x0 + i;
                    let top = *src.get_pixel(sx, sy);
                    let dst = &mut row[clip.x as usize + i as usize];
                    *dst = blend_pixel(Rgba(*dst), top, opacity).0;
                }
            });
    }

    /// Copy the surface into a new size, top-left aligned.  Area that did not
    /// exist before is filled with `fill`; content outside the new bounds is dropped.
    pub fn resized(&self, width: u32, height: u32, fill: Rgba<u8>) -> Result<PixelSurface> {
        let mut out = PixelSurface::new_filled(width, height, fill)?;
        let copy_w = self.width().min(width) as usize * 4;
        let copy_h = self.height().min(height) as usize;
        let src_stride = self.width() as usize * 4;
        let dst_stride = width as usize * 4;
        let src = self.image.as_raw();
        let dst: &mut [u8] = &mut out.image;
        for y in 0..copy_h {
            dst[y * dst_stride..y * dst_stride + copy_w]
                .copy_from_slice(&src[y * src_stride..y * src_stride + copy_w]);
        }
        Ok(out)
    }

    /// Copy the pixels under `rect` (clipped) into a new image.
    pub fn extract(&self, rect: PixelRect) -> Option<RgbaImage> {
        let clip = rect.clip(self.width(), self.height())?;
        Some(imageops::crop_imm(&self.image, clip.x as u32, clip.y as u32, clip.width, clip.height).to_image())
    }
}

// ============================================================================
// LAYER
// ============================================================================

pub type LayerId = u64;

#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    /// Stable id, assigned monotonically by the owning [`LayerStack`].
    pub id: LayerId,
    pub name: String,
    pub visible: bool,
    /// 0.0 ..= 1.0
    pub opacity: f32,
    pub surface: PixelSurface,
}

impl Layer {
    pub fn new(id: LayerId, name: String, width: u32, height: u32, fill_color: Rgba<u8>) -> Result<Self> {
        let surface = PixelSurface::new_filled(width, height, fill_color)?;
        Ok(Self::with_surface(id, name, surface))
    }

    pub fn with_surface(id: LayerId, name: String, surface: PixelSurface) -> Self {
        Self {
            id,
            name,
            visible: true,
            opacity: 1.0,
            surface,
        }
    }

    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            id: self.id,
            name: self.name.clone(),
            visible: self.visible,
            opacity: self.opacity,
            surface: self.surface.try_clone()?,
        })
    }

    /// Clamp into [0, 1]; non-finite values are ignored.
    pub fn set_opacity(&mut self, opacity: f32) -> bool {
        if !opacity.is_finite() {
            return false;
        }
        self.opacity = opacity.clamp(0.0, 1.0);
        true
    }
}

// ============================================================================
// LAYER STACK: index 0 is the bottom-most layer
// ============================================================================

#[derive(Clone, Debug)]
pub struct LayerStack {
    pub(crate) layers: Vec<Layer>,
    pub(crate) active_layer_index: usize,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) next_layer_id: LayerId,
}

impl LayerStack {
    /// New stack with a single opaque white "Background" layer.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::with_background(width, height, WHITE)
    }

    pub fn with_background(width: u32, height: u32, background: Rgba<u8>) -> Result<Self> {
        validate_dimensions(width, height)?;
        let background = Layer::new(1, "Background".to_string(), width, height, background)?;
        Ok(Self {
            layers: vec![background],
            active_layer_index: 0,
            width,
            height,
            next_layer_id: 2,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Bottom-to-top.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn active_layer_index(&self) -> usize {
        self.active_layer_index
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.layers.get(self.active_layer_index)
    }

    pub fn active_layer_mut(&mut self) -> Option<&mut Layer> {
        self.layers.get_mut(self.active_layer_index)
    }

    pub fn set_active_layer(&mut self, index: usize) -> bool {
        if index >= self.layers.len() {
            return false;
        }
        self.active_layer_index = index;
        true
    }

    pub(crate) fn allocate_layer_id(&mut self) -> LayerId {
        let id = self.next_layer_id;
        self.next_layer_id += 1;
        id
    }

    /// Restore the structural invariants: at least one layer, a valid active
    /// index.  Returns `true` when something had to be repaired.
    pub fn repair(&mut self) -> bool {
        let mut repaired = false;
        if self.layers.is_empty() {
            let id = self.allocate_layer_id();
            match Layer::new(id, "Layer 1".to_string(), self.width, self.height, TRANSPARENT) {
                Ok(layer) => self.layers.push(layer),
                Err(e) => log::error!("LayerStack::repair: could not recreate a layer: {}", e),
            }
            self.active_layer_index = 0;
            repaired = true;
        }
        if self.active_layer_index >= self.layers.len() {
            self.active_layer_index = 0;
            repaired = true;
        }
        if repaired {
            log::warn!("LayerStack::repair: active index reset to {}", self.active_layer_index);
        }
        repaired
    }

    /// Approximate pixel memory held by all layers.
    pub fn memory_bytes(&self) -> usize {
        self.layers.iter().map(|l| l.surface.memory_bytes() + l.name.len()).sum()
    }

    /// Deep copy reporting allocation failure.
    pub fn try_clone(&self) -> Result<Self> {
        let mut layers = Vec::new();
        layers
            .try_reserve_exact(self.layers.len())
            .map_err(|_| EngineError::Allocation { bytes: self.memory_bytes() })?;
        for layer in &self.layers {
            layers.push(layer.try_clone()?);
        }
        Ok(Self {
            layers,
            active_layer_index: self.active_layer_index,
            width: self.width,
            height: self.height,
            next_layer_id: self.next_layer_id,
        })
    }

    // ---- compositing ----------------------------------------------------------

    /// Flatten every visible layer bottom-to-top at its opacity.
    ///
    /// Always recomputed from scratch; rows are processed in parallel.
    pub fn composite(&self) -> Result<RgbaImage> {
        let (width, height) = (self.width, self.height);
        let buf = try_alloc_bytes(width as usize * height as usize * 4)?;
        let mut result = RgbaImage::from_raw(width, height, buf)
            .ok_or(EngineError::InvalidDimensions { width, height })?;

        let visible: Vec<&Layer> = self
            .layers
            .iter()
            .filter(|l| l.visible && l.opacity > 0.0)
            .filter(|l| {
                let matches = l.surface.dimensions() == (width, height);
                if !matches {
                    log::warn!("composite: skipping layer {} with mismatched size", l.id);
                }
                matches
            })
            .collect();

        let row_px = width as usize;
        let out: &mut [[u8; 4]] = bytemuck::cast_slice_mut::<u8, [u8; 4]>(&mut result);
        out.par_chunks_mut(row_px).enumerate().for_each(|(y, row)| {
            for layer in &visible {
                let src = &layer.surface.pixels()[y * row_px..(y + 1) * row_px];
                for (dst, top) in row.iter_mut().zip(src) {
                    *dst = blend_pixel(Rgba(*dst), Rgba(*top), layer.opacity).0;
                }
            }
        });
        Ok(result)
    }
}

/// Source-over blend of `top` onto `base` with `top`'s alpha scaled by `opacity`.
/// Channels are straight (non-premultiplied) and rounded to nearest.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    // Fast path: nothing to blend
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    // Fast path: opaque top at full opacity just overwrites
    if opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);
    let top_a = (top[3] as f32 / 255.0) * opacity;
    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return TRANSPARENT;
    }

    let channel = |t: u8, b: u8| -> u8 {
        let v = (t as f32 * top_a + b as f32 * base_a * (1.0 - top_a)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(top[0], base[0]),
        channel(top[1], base[1]),
        channel(top[2], base[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
