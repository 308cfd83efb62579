mod file;
mod loopback;

pub use file::FileOutput;
pub use loopback::V4L2Output;

use crate::frame::Frame;
use anyhow::Result;

/// Trait for output destinations
pub trait OutputSink {
    /// Write a frame to the output
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Get the expected output resolution
    fn resolution(&self) -> (u32, u32);
}

impl<O: OutputSink + ?Sized> OutputSink for Box<O> {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn resolution(&self) -> (u32, u32) {
        (**self).resolution()
    }
}
