use thiserror::Error;

/// Errors surfaced by the engine.
///
/// "Nothing found" conditions (empty masks, no detections, degenerate
/// overlay placements) are not errors and never appear here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No frame could be acquired this tick. The tick is skipped.
    #[error("no frame available: {0}")]
    InputUnavailable(String),

    /// A parameter was rejected before reaching the core.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The capture device could not be opened at session start.
    #[error("failed to open device: {0}")]
    DeviceOpen(String),

    /// Buffers that must be consumed together have different sizes.
    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        EngineError::Configuration(msg.into())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
