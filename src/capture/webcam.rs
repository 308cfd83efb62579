use super::CaptureSource;
use crate::error::EngineError;
use crate::frame::Frame;
use anyhow::{anyhow, Context, Result};
use image::imageops;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

/// Live camera input. Frames are delivered at the requested resolution.
pub struct WebcamCapture {
    camera: Camera,
    width: u32,
    height: u32,
}

impl WebcamCapture {
    /// Open the camera and start streaming. Failure here is fatal for a session.
    pub fn new(device_index: u32, width: u32, height: u32) -> Result<Self> {
        tracing::info!(
            "Initializing webcam {} at {}x{}",
            device_index,
            width,
            height
        );

        let index = CameraIndex::Index(device_index);
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let mut camera = Camera::new(index, requested)
            .map_err(|e| EngineError::DeviceOpen(format!("camera {device_index}: {e}")))?;
        camera
            .open_stream()
            .map_err(|e| EngineError::DeviceOpen(format!("camera {device_index} stream: {e}")))?;

        tracing::info!("Webcam initialized successfully");

        Ok(Self {
            camera,
            width,
            height,
        })
    }
}

impl CaptureSource for WebcamCapture {
    fn capture_frame(&mut self) -> Result<Frame> {
        let buffer = self.camera.frame().context("Failed to capture frame")?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        // nokhwa may link a different `image` release; move the raw bytes over.
        let (w, h) = (decoded.width(), decoded.height());
        let frame = Frame::from_raw(w, h, decoded.into_raw())
            .ok_or_else(|| anyhow!("decoded frame of {w}x{h} has a short buffer"))?;

        if (w, h) == (self.width, self.height) {
            return Ok(frame);
        }
        Ok(imageops::resize(
            &frame,
            self.width,
            self.height,
            imageops::FilterType::Triangle,
        ))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
