// ============================================================================
// COORDINATES: canvas geometry and device-to-canvas mapping
// ============================================================================
//
// The whole core addresses pixels with a top-left origin.  The only place a
// Y flip happens is `CoordinateMapper::map` when the input device reports a
// bottom-left origin; nothing downstream re-derives flipped coordinates.

use serde::{Deserialize, Serialize};

/// Pointer coordinates outside ±this bound are treated as malformed input.
pub const COORDINATE_SANITY_BOUND: f32 = 1_000_000.0;

/// A point in canvas (or device) space.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// True when both coordinates are finite and inside the sanity bound.
    pub fn is_sane(&self) -> bool {
        self.is_finite()
            && self.x.abs() <= COORDINATE_SANITY_BOUND
            && self.y.abs() <= COORDINATE_SANITY_BOUND
    }

    pub fn distance(&self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Integer pixel containing this point.
    pub fn to_pixel(&self) -> (i32, i32) {
        (self.x.floor() as i32, self.y.floor() as i32)
    }
}

/// Width/height of a view in device units.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Both dimensions finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Axis-aligned pixel rectangle.  `x`/`y` may be negative before clipping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle spanning two inclusive pixel corners.
    pub fn from_inclusive(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            x: min_x as i32,
            y: min_y as i32,
            width: max_x.saturating_sub(min_x) + 1,
            height: max_y.saturating_sub(min_y) + 1,
        }
    }

    /// Smallest rectangle covering both points (floor of the min, ceil of the max).
    pub fn from_points(a: Point, b: Point) -> Self {
        let min_x = a.x.min(b.x).floor();
        let min_y = a.y.min(b.y).floor();
        let max_x = a.x.max(b.x).ceil();
        let max_y = a.y.max(b.y).ceil();
        Self {
            x: min_x as i32,
            y: min_y as i32,
            width: (max_x - min_x).max(0.0) as u32,
            height: (max_y - min_y).max(0.0) as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && (x as i64) < self.right() && (y as i64) < self.bottom()
    }

    /// Intersection with a `width`×`height` canvas; `None` when nothing remains.
    pub fn clip(&self, width: u32, height: u32) -> Option<PixelRect> {
        let x0 = (self.x as i64).max(0);
        let y0 = (self.y as i64).max(0);
        let x1 = self.right().min(width as i64);
        let y1 = self.bottom().min(height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect::new(x0 as i32, y0 as i32, (x1 - x0) as u32, (y1 - y0) as u32))
    }

    pub fn union(&self, other: &PixelRect) -> PixelRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        PixelRect::new(x0, y0, (x1 - x0 as i64) as u32, (y1 - y0 as i64) as u32)
    }

    /// Grow by `amount` pixels on every side.
    pub fn inflate(&self, amount: u32) -> PixelRect {
        let shift = amount.min(i32::MAX as u32) as i32;
        let grow = amount.saturating_mul(2);
        PixelRect::new(
            self.x.saturating_sub(shift),
            self.y.saturating_sub(shift),
            self.width.saturating_add(grow),
            self.height.saturating_add(grow),
        )
    }
}

/// Where the input device puts its origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOrigin {
    #[default]
    TopLeft,
    BottomLeft,
}

/// Converts input-device coordinates (possibly zoomed/scaled) into canvas space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoordinateMapper {
    pub origin: DeviceOrigin,
}

impl CoordinateMapper {
    pub fn new(origin: DeviceOrigin) -> Self {
        Self { origin }
    }

    /// Map a device point to canvas space.
    ///
    /// Fails closed to the canvas origin for degenerate views, non-finite
    /// points, and points beyond [`COORDINATE_SANITY_BOUND`].  The result is
    /// clamped into `[0, canvas_w] × [0, canvas_h]`.
    pub fn map(&self, device: Point, view: Size, canvas_w: u32, canvas_h: u32) -> Point {
        if !view.is_valid() || !device.is_sane() {
            return Point::ZERO;
        }
        let cw = canvas_w as f32;
        let ch = canvas_h as f32;
        let x = device.x * (cw / view.width);
        let mut y = device.y * (ch / view.height);
        if self.origin == DeviceOrigin::BottomLeft {
            y = ch - y;
        }
        if !x.is_finite() || !y.is_finite() {
            return Point::ZERO;
        }
        Point::new(x.clamp(0.0, cw), y.clamp(0.0, ch))
    }

    /// Map a device point to the pixel it lands on, clamped to the last
    /// row/column.  `None` for an empty canvas.
    pub fn map_to_pixel(&self, device: Point, view: Size, canvas_w: u32, canvas_h: u32) -> Option<(u32, u32)> {
        if canvas_w == 0 || canvas_h == 0 {
            return None;
        }
        let p = self.map(device, view, canvas_w, canvas_h);
        let x = (p.x.floor() as u32).min(canvas_w - 1);
        let y = (p.y.floor() as u32).min(canvas_h - 1);
        Some((x, y))
    }
}

/// Top-left mapping shorthand.
pub fn map_to_canvas(device: Point, view: Size, canvas_w: u32, canvas_h: u32) -> Point {
    CoordinateMapper::default().map(device, view, canvas_w, canvas_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_scales_per_axis() {
        let p = map_to_canvas(Point::new(50.0, 25.0), Size::new(100.0, 100.0), 800, 600);
        assert_eq!(p, Point::new(400.0, 150.0));
    }

    #[test]
    fn test_map_fails_closed() {
        let view = Size::new(100.0, 100.0);
        assert_eq!(map_to_canvas(Point::new(f32::NAN, 1.0), view, 800, 600), Point::ZERO);
        assert_eq!(map_to_canvas(Point::new(2_000_000.0, 1.0), view, 800, 600), Point::ZERO);
        assert_eq!(map_to_canvas(Point::new(10.0, 10.0), Size::new(0.0, 100.0), 800, 600), Point::ZERO);
        assert_eq!(map_to_canvas(Point::new(10.0, 10.0), Size::new(-5.0, 100.0), 800, 600), Point::ZERO);
        assert_eq!(
            map_to_canvas(Point::new(10.0, 10.0), Size::new(f32::INFINITY, 100.0), 800, 600),
            Point::ZERO
        );
    }

    #[test]
    fn test_map_clamps_to_canvas() {
        let p = map_to_canvas(Point::new(150.0, -20.0), Size::new(100.0, 100.0), 800, 600);
        assert_eq!(p, Point::new(800.0, 0.0));
    }

    #[test]
    fn test_bottom_left_origin_flips_once() {
        let mapper = CoordinateMapper::new(DeviceOrigin::BottomLeft);
        let p = mapper.map(Point::new(0.0, 10.0), Size::new(100.0, 100.0), 100, 100);
        assert_eq!(p, Point::new(0.0, 90.0));
        assert_eq!(mapper.map_to_pixel(Point::new(0.0, 0.0), Size::new(100.0, 100.0), 100, 100), Some((0, 99)));
    }

    #[test]
    fn test_rect_clip_and_union() {
        let r = PixelRect::new(-5, -5, 10, 10);
        assert_eq!(r.clip(100, 100), Some(PixelRect::new(0, 0, 5, 5)));
        assert_eq!(PixelRect::new(200, 0, 5, 5).clip(100, 100), None);
        let u = PixelRect::new(0, 0, 2, 2).union(&PixelRect::new(5, 5, 1, 1));
        assert_eq!(u, PixelRect::new(0, 0, 6, 6));
    }

    #[test]
    fn test_inflate_saturates_on_huge_amounts() {
        let r = PixelRect::new(4, 4, 10, 10).inflate(u32::MAX);
        assert_eq!(r.x, 4 - i32::MAX);
        assert_eq!(r.width, u32::MAX);
        assert_eq!(r.clip(50, 50), Some(PixelRect::new(0, 0, 50, 50)));
        assert_eq!(PixelRect::new(4, 4, 2, 2).inflate(1), PixelRect::new(3, 3, 4, 4));
    }
}
