//! Filters that derive a replacement background from the current frame.

use crate::error::{EngineError, EngineResult};
use crate::frame::{ChannelOrder, Frame};
use image::{GrayImage, Luma, Rgb};
use imageproc::filter::{box_filter, gaussian_blur_f32};

const SEPIA: [[f32; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackgroundFilter {
    GaussianBlur { sigma: f32 },
    /// Mean over a `size` x `size` window.
    BoxFilter { size: u32 },
    Sepia,
    Invert,
}

impl BackgroundFilter {
    pub fn gaussian_blur(sigma: f32) -> EngineResult<Self> {
        if !(sigma > 0.0) {
            return Err(EngineError::config(format!(
                "blur sigma must be positive, got {sigma}"
            )));
        }
        Ok(BackgroundFilter::GaussianBlur { sigma })
    }

    pub fn box_filter(size: u32) -> EngineResult<Self> {
        if size == 0 {
            return Err(EngineError::config("box filter size must be at least 1"));
        }
        Ok(BackgroundFilter::BoxFilter { size })
    }

    /// Produce a same-size filtered copy of `frame`.
    pub fn apply(&self, frame: &Frame, order: ChannelOrder) -> Frame {
        match *self {
            BackgroundFilter::GaussianBlur { sigma } => gaussian_blur_f32(frame, sigma),
            BackgroundFilter::BoxFilter { size } => per_channel(frame, |channel| {
                let radius = size / 2;
                box_filter(channel, radius, radius)
            }),
            BackgroundFilter::Sepia => sepia(frame, order),
            BackgroundFilter::Invert => {
                let mut out = frame.clone();
                for v in out.iter_mut() {
                    *v = 255 - *v;
                }
                out
            }
        }
    }
}

fn per_channel<F>(frame: &Frame, mut f: F) -> Frame
where
    F: FnMut(&GrayImage) -> GrayImage,
{
    let (w, h) = frame.dimensions();
    let channels: Vec<GrayImage> = (0..3)
        .map(|c| {
            let plane = GrayImage::from_fn(w, h, |x, y| Luma([frame.get_pixel(x, y)[c]]));
            f(&plane)
        })
        .collect();
    Frame::from_fn(w, h, |x, y| {
        Rgb([
            channels[0].get_pixel(x, y)[0],
            channels[1].get_pixel(x, y)[0],
            channels[2].get_pixel(x, y)[0],
        ])
    })
}

fn sepia(frame: &Frame, order: ChannelOrder) -> Frame {
    let mut out = frame.clone();
    for p in out.pixels_mut() {
        let (r, g, b) = match order {
            ChannelOrder::Rgb => (p[0], p[1], p[2]),
            ChannelOrder::Bgr => (p[2], p[1], p[0]),
        };
        let tone = |row: &[f32; 3]| -> u8 {
            (row[0] * r as f32 + row[1] * g as f32 + row[2] * b as f32).clamp(0.0, 255.0) as u8
        };
        *p = order.from_rgb(Rgb([tone(&SEPIA[0]), tone(&SEPIA[1]), tone(&SEPIA[2])]));
    }
    out
}
