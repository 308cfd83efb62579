mod still;
#[cfg(feature = "webcam")]
mod webcam;

pub use still::StillImage;
#[cfg(feature = "webcam")]
pub use webcam::WebcamCapture;

use crate::frame::Frame;
use anyhow::Result;

/// Trait for frame sources
pub trait CaptureSource {
    /// Capture a single frame
    fn capture_frame(&mut self) -> Result<Frame>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);
}

impl<C: CaptureSource + ?Sized> CaptureSource for Box<C> {
    fn capture_frame(&mut self) -> Result<Frame> {
        (**self).capture_frame()
    }

    fn resolution(&self) -> (u32, u32) {
        (**self).resolution()
    }
}
