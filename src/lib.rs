//! Raster layer engine: pixel surfaces, layer stacks, compositing, flood
//! fill, pattern tiles and snapshot undo/redo, driven through
//! [`engine::DrawingEngine`].

pub mod canvas;
pub mod cli;
pub mod components;
pub mod config;
pub mod coords;
pub mod engine;
pub mod error;
pub mod logger;
pub mod ops;

pub use canvas::{blend_pixel, Layer, LayerId, LayerStack, PixelSurface};
pub use components::history::{HistoryManager, LayerStackSnapshot};
pub use config::EngineConfig;
pub use coords::{CoordinateMapper, DeviceOrigin, PixelRect, Point, Size};
pub use engine::{DrawingEngine, DrawingState, Tool};
pub use error::{EngineError, Result};
pub use ops::pattern::{PatternKind, PatternSpec};
pub use ops::shapes::{ShapeKind, ShapeStyle};
