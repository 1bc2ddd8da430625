// ============================================================================
// CANVAS-LEVEL OPERATIONS: add / delete / duplicate / merge / reorder / resize
// ============================================================================
//
// None of these push history themselves; the engine commits a snapshot after
// each one that reports a change.

use image::{imageops, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{blend_pixel, validate_dimensions, Layer, LayerStack, PixelSurface, TRANSPARENT};
use crate::error::{EngineError, Result};

/// Push a new transparent layer on top of the stack and make it active.
/// Returns the new layer's index.
pub fn add_layer(stack: &mut LayerStack) -> Result<usize> {
    let name = format!("Layer {}", stack.next_layer_id);
    let surface = PixelSurface::new(stack.width, stack.height)?;
    let id = stack.allocate_layer_id();
    stack.layers.push(Layer::with_surface(id, name, surface));
    stack.active_layer_index = stack.layers.len() - 1;
    Ok(stack.active_layer_index)
}

/// Remove the active layer.  Refused (returns `false`) for the last layer.
pub fn delete_active_layer(stack: &mut LayerStack) -> bool {
    if stack.layers.len() <= 1 {
        return false;
    }
    let idx = stack.active_layer_index.min(stack.layers.len() - 1);
    stack.layers.remove(idx);
    if stack.active_layer_index >= stack.layers.len() {
        stack.active_layer_index = stack.layers.len() - 1;
    }
    true
}

/// Deep-copy the active layer directly above itself and make the copy active.
pub fn duplicate_active_layer(stack: &mut LayerStack) -> Result<usize> {
    let idx = stack.active_layer_index;
    let src = stack
        .layers
        .get(idx)
        .ok_or(EngineError::LayerIndex { index: idx, len: stack.layers.len() })?;
    let mut dup = src.try_clone()?;
    dup.name = format!("{} Copy", src.name);
    dup.id = stack.allocate_layer_id();

    let new_idx = idx + 1;
    stack.layers.insert(new_idx, dup);
    stack.active_layer_index = new_idx;
    Ok(new_idx)
}

/// Composite the active layer onto the one below at the active layer's
/// opacity, then remove it.  No-op for the bottom-most layer.
pub fn merge_down(stack: &mut LayerStack) -> bool {
    let idx = stack.active_layer_index;
    if idx == 0 || idx >= stack.layers.len() {
        return false;
    }
    let top = stack.layers.remove(idx);
    let below = &mut stack.layers[idx - 1];
    if top.surface.dimensions() == below.surface.dimensions() {
        let opacity = top.opacity;
        below
            .surface
            .pixels_mut()
            .par_iter_mut()
            .zip(top.surface.pixels().par_iter())
            .for_each(|(dst, src)| {
                *dst = blend_pixel(Rgba(*dst), Rgba(*src), opacity).0;
            });
    } else {
        log::warn!("merge_down: layer {} has mismatched size, contents dropped", top.id);
    }
    stack.active_layer_index = idx - 1;
    true
}

/// Move the layer at `from` to position `to`.  The active index follows the
/// layer it pointed at before the move.
pub fn move_layer(stack: &mut LayerStack, from: usize, to: usize) -> bool {
    let len = stack.layers.len();
    if from >= len || to >= len || from == to {
        return false;
    }
    let active_id = stack.active_layer().map(|l| l.id);
    let layer = stack.layers.remove(from);
    stack.layers.insert(to, layer);
    stack.active_layer_index = active_id
        .and_then(|id| stack.index_of(id))
        .unwrap_or(0);
    true
}

/// Reallocate every layer at the new size, copying content top-left aligned.
///
/// The bottom layer's new area takes `background`; all other layers grow
/// transparent.  Either every layer is resized or none is.
pub fn resize_canvas(stack: &mut LayerStack, width: u32, height: u32, background: Rgba<u8>) -> Result<bool> {
    validate_dimensions(width, height)?;
    if (width, height) == (stack.width, stack.height) {
        return Ok(false);
    }
    let mut resized = Vec::with_capacity(stack.layers.len());
    for (i, layer) in stack.layers.iter().enumerate() {
        let fill = if i == 0 { background } else { TRANSPARENT };
        resized.push(layer.surface.resized(width, height, fill)?);
    }
    for (layer, surface) in stack.layers.iter_mut().zip(resized) {
        layer.surface = surface;
    }
    stack.width = width;
    stack.height = height;
    Ok(true)
}

/// Insert `image`, scaled to the canvas, as a new bottom "Background" layer.
pub fn load_image_as_background(stack: &mut LayerStack, image: &RgbaImage) -> Result<bool> {
    if image.width() == 0 || image.height() == 0 {
        return Ok(false);
    }
    let (w, h) = (stack.width, stack.height);
    let scaled = if image.dimensions() == (w, h) {
        image.clone()
    } else {
        imageops::resize(image, w, h, imageops::FilterType::Triangle)
    };
    let surface = PixelSurface::from_image(scaled)?;
    let id = stack.allocate_layer_id();
    stack.layers.insert(0, Layer::with_surface(id, "Background".to_string(), surface));
    stack.active_layer_index += 1;
    Ok(true)
}

/// Fill the whole active layer with `color` (transparent erases it).
pub fn clear_active_layer(stack: &mut LayerStack, color: Rgba<u8>) -> bool {
    match stack.active_layer_mut() {
        Some(layer) => {
            layer.surface.clear(color);
            true
        }
        None => false,
    }
}

/// Flatten all visible layers into a single "Background" layer.
pub fn flatten_image(stack: &mut LayerStack) -> Result<bool> {
    if stack.layers.len() == 1 && stack.layers[0].visible && stack.layers[0].opacity >= 1.0 {
        return Ok(false);
    }
    let composite = stack.composite()?;
    let surface = PixelSurface::from_image(composite)?;
    let id = stack.allocate_layer_id();
    stack.layers.clear();
    stack.layers.push(Layer::with_surface(id, "Background".to_string(), surface));
    stack.active_layer_index = 0;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::WHITE;

    #[test]
    fn test_add_layer_goes_on_top_and_activates() {
        let mut stack = LayerStack::new(8, 8).unwrap();
        let idx = add_layer(&mut stack).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(stack.active_layer_index(), 1);
        assert_eq!(stack.layers()[1].surface.get(0, 0), Some(TRANSPARENT));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut stack = LayerStack::new(4, 4).unwrap();
        add_layer(&mut stack).unwrap();
        let deleted_id = stack.active_layer().unwrap().id;
        assert!(delete_active_layer(&mut stack));
        add_layer(&mut stack).unwrap();
        assert!(stack.active_layer().unwrap().id > deleted_id);
    }

    #[test]
    fn test_merge_down_bottom_is_noop() {
        let mut stack = LayerStack::new(4, 4).unwrap();
        assert!(!merge_down(&mut stack));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_flatten_collapses_to_composite() {
        let mut stack = LayerStack::new(2, 2).unwrap();
        add_layer(&mut stack).unwrap();
        stack.active_layer_mut().unwrap().surface.set(0, 0, Rgba([0, 0, 0, 255]));
        let expected = stack.composite().unwrap();
        assert!(flatten_image(&mut stack).unwrap());
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.layers()[0].surface.image(), &expected);
        assert_eq!(stack.layers()[0].surface.get(1, 1), Some(WHITE));
    }

    #[test]
    fn test_load_background_keeps_active_layer() {
        let mut stack = LayerStack::new(4, 4).unwrap();
        add_layer(&mut stack).unwrap();
        let active_id = stack.active_layer().unwrap().id;
        let img = RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255]));
        assert!(load_image_as_background(&mut stack, &img).unwrap());
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.layers()[0].name, "Background");
        assert_eq!(stack.active_layer().unwrap().id, active_id);
        let px = stack.layers()[0].surface.get(3, 3).unwrap();
        assert!(px[1] >= 254 && px[0] <= 1 && px[3] >= 254);
    }

    #[test]
    fn test_duplicate_copies_layer_above_and_activates() {
        let mut stack = LayerStack::new(6, 6).unwrap();
        add_layer(&mut stack).unwrap();
        assert!(stack.set_active_layer(0));
        {
            let layer = stack.active_layer_mut().unwrap();
            layer.surface.set(2, 3, Rgba([10, 20, 30, 255]));
            layer.visible = false;
            layer.set_opacity(0.4);
        }
        let original_id = stack.layers()[0].id;

        let idx = duplicate_active_layer(&mut stack).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(stack.active_layer_index(), 1);
        assert_eq!(stack.layers().len(), 3);

        let (orig, copy) = (&stack.layers()[0], &stack.layers()[1]);
        assert_eq!(copy.name, format!("{} Copy", orig.name));
        assert_eq!(copy.surface, orig.surface);
        assert_eq!(copy.visible, orig.visible);
        assert_eq!(copy.opacity, orig.opacity);
        assert_ne!(copy.id, original_id);
        assert!(stack.layers().iter().filter(|l| l.id == copy.id).count() == 1);

        stack.active_layer_mut().unwrap().surface.set(0, 0, Rgba([1, 2, 3, 255]));
        assert_eq!(stack.layers()[0].surface.get(0, 0), Some(WHITE));
        assert_eq!(stack.layers()[1].surface.get(0, 0), Some(Rgba([1, 2, 3, 255])));
    }
}
