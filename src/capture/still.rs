use super::CaptureSource;
use crate::frame::{self, Frame};
use anyhow::{Context, Result};
use std::path::Path;

/// Replays one decoded image as every frame.
///
/// Stands in for a camera when none is available; also what the one-shot
/// commands use to read their input.
#[derive(Debug, Clone)]
pub struct StillImage {
    frame: Frame,
}

impl StillImage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading still input from {}", path.display());
        let frame = frame::load(path).context("Failed to initialize still image input")?;
        Ok(Self { frame })
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }
}

impl CaptureSource for StillImage {
    fn capture_frame(&mut self) -> Result<Frame> {
        Ok(self.frame.clone())
    }

    fn resolution(&self) -> (u32, u32) {
        self.frame.dimensions()
    }
}
