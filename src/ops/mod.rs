pub mod brush;
pub mod canvas_ops;
pub mod clipboard;
pub mod effects;
pub mod fill;
pub mod pattern;
pub mod scripting;
pub mod shapes;
pub mod text;
