use super::OutputSink;
use crate::error::EngineError;
use crate::frame::Frame;
use anyhow::{Context, Result};
use image::imageops;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Raw YUYV frames written to a v4l2loopback device node.
pub struct V4L2Output {
    file: File,
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl V4L2Output {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            path.display(),
            width,
            height
        );

        // v4l2loopback accepts raw frame data written to the device file
        let file = File::options()
            .write(true)
            .open(path)
            .map_err(|e| EngineError::DeviceOpen(format!("{}: {e}", path.display())))?;

        tracing::info!("v4l2loopback device opened successfully");

        Ok(Self {
            file,
            width,
            height,
            buffer: Vec::with_capacity((width * height * 2) as usize),
        })
    }
}

/// Pack an RGB frame as YUYV 4:2:2; each horizontal pixel pair shares chroma.
/// An odd last column is paired with itself.
pub(crate) fn pack_yuyv(frame: &Frame, out: &mut Vec<u8>) {
    let (width, height) = frame.dimensions();
    out.clear();
    for y in 0..height {
        for x in (0..width).step_by(2) {
            let a = frame.get_pixel(x, y);
            let b = frame.get_pixel((x + 1).min(width - 1), y);
            let (y0, u0, v0) = yuv(a[0], a[1], a[2]);
            let (y1, u1, v1) = yuv(b[0], b[1], b[2]);
            out.extend_from_slice(&[
                y0,
                ((u0 as u16 + u1 as u16) / 2) as u8,
                y1,
                ((v0 as u16 + v1 as u16) / 2) as u8,
            ]);
        }
    }
}

/// BT.601 full range.
fn yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = 128.0 + 0.564 * (b - y);
    let v = 128.0 + 0.713 * (r - y);
    let clip = |c: f32| c.round().clamp(0.0, 255.0) as u8;
    (clip(y), clip(u), clip(v))
}

impl OutputSink for V4L2Output {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let resized;
        let frame = if frame.dimensions() != (self.width, self.height) {
            resized = imageops::resize(
                frame,
                self.width,
                self.height,
                imageops::FilterType::Triangle,
            );
            &resized
        } else {
            frame
        };

        pack_yuyv(frame, &mut self.buffer);
        self.file
            .write_all(&self.buffer)
            .context("Failed to write frame to v4l2loopback device")?;
        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn yuyv_is_two_bytes_per_pixel() {
        let mut out = Vec::new();
        pack_yuyv(&Frame::new(4, 3), &mut out);
        assert_eq!(out.len(), 4 * 3 * 2);
        pack_yuyv(&Frame::new(3, 1), &mut out);
        assert_eq!(out.len(), 8);
    }

    #[test]
    fn gray_has_neutral_chroma() {
        let mut out = Vec::new();
        pack_yuyv(&Frame::from_pixel(2, 1, Rgb([100, 100, 100])), &mut out);
        assert_eq!(out, vec![100, 128, 100, 128]);
    }

    #[test]
    fn missing_device_fails_to_open() {
        let err = V4L2Output::new("/nonexistent/video99", 4, 4).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::DeviceOpen(_))
        ));
    }
}
