use super::OutputSink;
use crate::frame::{self, Frame};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Writes frames to an image file; the format follows the extension.
///
/// Each write replaces the previous file, so a live session leaves its last
/// frame behind.
#[derive(Debug, Clone)]
pub struct FileOutput {
    path: PathBuf,
    last: Option<(u32, u32)>,
    written: u64,
}

impl FileOutput {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            last: None,
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }
}

impl OutputSink for FileOutput {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        frame::save(frame, &self.path)?;
        self.last = Some(frame.dimensions());
        self.written += 1;
        Ok(())
    }

    /// Size of the last frame written, or zero before the first write.
    fn resolution(&self) -> (u32, u32) {
        self.last.unwrap_or((0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn writes_and_overwrites() {
        let path = std::env::temp_dir().join(format!("cutout-file-output-{}.png", std::process::id()));
        let mut out = FileOutput::new(&path);
        out.write_frame(&Frame::from_pixel(4, 4, Rgb([1, 2, 3]))).unwrap();
        out.write_frame(&Frame::from_pixel(6, 5, Rgb([9, 9, 9]))).unwrap();
        assert_eq!(out.frames_written(), 2);
        assert_eq!(out.resolution(), (6, 5));
        let back = frame::load(&path).unwrap();
        assert_eq!(back.get_pixel(0, 0), &Rgb([9, 9, 9]));
        std::fs::remove_file(&path).unwrap();
    }
}
