use thiserror::Error;

/// Errors surfaced by the raster engine.
///
/// Invalid geometry never shows up here: noisy pointer input is answered with
/// a silent no-op (`Ok(false)`), not an error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid canvas dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("could not allocate {bytes} bytes for pixel data")]
    Allocation { bytes: usize },

    #[error("flood fill aborted after visiting {visited} pixels ({queued} queued)")]
    FillAborted { visited: usize, queued: usize },

    #[error("background fill worker exited without a result")]
    WorkerDisconnected,

    #[error("layer index {index} out of range ({len} layers)")]
    LayerIndex { index: usize, len: usize },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("script line {line}: {message}")]
    Script { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Allocate a zeroed byte buffer, reporting failure instead of aborting.
pub(crate) fn try_alloc_bytes(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| EngineError::Allocation { bytes: len })?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Copy a byte slice into a freshly allocated buffer, reporting failure.
pub(crate) fn try_copy_bytes(src: &[u8]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(src.len())
        .map_err(|_| EngineError::Allocation { bytes: src.len() })?;
    buf.extend_from_slice(src);
    Ok(buf)
}

/// Allocate `len` zeroed coverage samples, reporting failure.
pub(crate) fn try_alloc_coverage(len: usize) -> Result<Vec<f32>> {
    let bytes = len.saturating_mul(std::mem::size_of::<f32>());
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| EngineError::Allocation { bytes })?;
    buf.resize(len, 0.0);
    Ok(buf)
}
