use crate::error::{EngineError, EngineResult};
use anyhow::{Context, Result};
use image::{imageops, DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use std::path::Path;

/// Raster frame: 8 bits per channel, three channels, row-major.
pub type Frame = RgbImage;

/// Channel order of a frame's three channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// Express an RGB triple in this channel order.
    pub fn from_rgb(self, color: Rgb<u8>) -> Rgb<u8> {
        match self {
            ChannelOrder::Rgb => color,
            ChannelOrder::Bgr => Rgb([color[2], color[1], color[0]]),
        }
    }
}

/// Integer point in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Unclamped rectangle as reported by a detector or drawn by the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Carried along for callers; nothing downstream reads it.
    pub confidence: Option<f32>,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Axis-aligned rectangle clamped to frame bounds.
///
/// `x + width <= frame width` and `y + height <= frame height` always hold
/// for regions built with [`Region::clamped`]. A zero width or height means
/// "no selection".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const EMPTY: Region = Region {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    /// Intersect a signed rectangle with a `frame_width` x `frame_height` frame.
    pub fn clamped(
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let x1 = x.clamp(0, frame_width as i64);
        let y1 = y.clamp(0, frame_height as i64);
        let x2 = (x + width.max(0)).clamp(0, frame_width as i64);
        let y2 = (y + height.max(0)).clamp(0, frame_height as i64);
        if x2 <= x1 || y2 <= y1 {
            return Region::EMPTY;
        }
        Region {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
        }
    }

    pub fn from_box(bbox: &BoundingBox, frame_width: u32, frame_height: u32) -> Self {
        Self::clamped(
            bbox.x as i64,
            bbox.y as i64,
            bbox.width as i64,
            bbox.height as i64,
            frame_width,
            frame_height,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    /// Map into a resampled frame of `frame_width` x `frame_height`, flooring
    /// the origin and the size by the per-axis factors and clamping.
    pub fn scaled(&self, sx: f64, sy: f64, frame_width: u32, frame_height: u32) -> Region {
        Region::clamped(
            (self.x as f64 * sx) as i64,
            (self.y as f64 * sy) as i64,
            (self.width as f64 * sx) as i64,
            (self.height as f64 * sy) as i64,
            frame_width,
            frame_height,
        )
    }
}

/// Binary single-channel classification over frame pixels.
///
/// Every pixel is exactly 0 or 255; no constructor can produce anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(GrayImage);

impl Mask {
    pub const ON: u8 = 255;
    pub const OFF: u8 = 0;

    /// All-background mask.
    pub fn empty(width: u32, height: u32) -> Self {
        Mask(GrayImage::new(width, height))
    }

    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        Mask(GrayImage::from_fn(width, height, |x, y| {
            Luma([if f(x, y) { Self::ON } else { Self::OFF }])
        }))
    }

    /// Any non-zero pixel of `image` becomes foreground.
    pub fn from_nonzero(image: &GrayImage) -> Self {
        Self::from_fn(image.width(), image.height(), |x, y| image.get_pixel(x, y)[0] != 0)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y)[0] == Self::ON
    }

    pub fn set(&mut self, x: u32, y: u32, on: bool) {
        self.0
            .put_pixel(x, y, Luma([if on { Self::ON } else { Self::OFF }]));
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.0.as_raw().iter().filter(|&&v| v == Self::ON).count()
    }

    /// True when no pixel is foreground.
    pub fn is_empty(&self) -> bool {
        self.0.as_raw().iter().all(|&v| v == Self::OFF)
    }

    pub fn inverted(&self) -> Mask {
        let mut out = self.0.clone();
        for v in out.iter_mut() {
            *v = Self::ON - *v;
        }
        Mask(out)
    }

    pub fn union(&mut self, other: &Mask) -> EngineResult<()> {
        ensure_same_size(self.dimensions(), other.dimensions())?;
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a |= *b;
        }
        Ok(())
    }

    /// Clear everything outside `region`. An empty region clears the mask.
    pub fn restrict_to(&mut self, region: &Region) {
        for (x, y, p) in self.0.enumerate_pixels_mut() {
            if !region.contains(x, y) {
                p[0] = Self::OFF;
            }
        }
    }

    /// Nearest-neighbor resize; preserves the binary property.
    pub fn resized(&self, width: u32, height: u32) -> Mask {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        Mask(imageops::resize(
            &self.0,
            width,
            height,
            imageops::FilterType::Nearest,
        ))
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }

    pub fn into_image(self) -> GrayImage {
        self.0
    }

    /// Grayscale RGB rendering for previews and saving.
    pub fn to_frame(&self) -> Frame {
        RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let v = self.0.get_pixel(x, y)[0];
            Rgb([v, v, v])
        })
    }
}

pub(crate) fn ensure_same_size(expected: (u32, u32), actual: (u32, u32)) -> EngineResult<()> {
    if expected != actual {
        return Err(EngineError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Expand any decoded image to a three-channel frame.
pub fn from_dynamic(image: DynamicImage) -> Frame {
    image.to_rgb8()
}

/// Load a PNG/JPEG/BMP file as a frame.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Frame> {
    let path = path.as_ref();
    let image = image::open(path)
        .with_context(|| format!("Failed to open image {}", path.display()))?;
    Ok(from_dynamic(image))
}

/// Save a frame; the format follows the file extension.
pub fn save<P: AsRef<Path>>(frame: &Frame, path: P) -> Result<()> {
    let path = path.as_ref();
    frame
        .save(path)
        .with_context(|| format!("Failed to save image {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamping_keeps_region_inside_frame() {
        let r = Region::clamped(-10, 90, 50, 50, 100, 100);
        assert_eq!(
            r,
            Region {
                x: 0,
                y: 90,
                width: 40,
                height: 10
            }
        );
        assert!(r.x + r.width <= 100 && r.y + r.height <= 100);
    }

    #[test]
    fn scaling_floors_and_clamps() {
        let r = Region {
            x: 10,
            y: 7,
            width: 21,
            height: 30,
        };
        let half = Region {
            x: 5,
            y: 3,
            width: 10,
            height: 15,
        };
        assert_eq!(r.scaled(0.5, 0.5, 20, 20), half);
        assert_eq!(
            r.scaled(0.5, 0.5, 12, 12),
            Region {
                width: 7,
                height: 9,
                ..half
            }
        );
    }

    #[test]
    fn region_outside_frame_is_empty() {
        assert!(Region::clamped(120, 10, 20, 20, 100, 100).is_empty());
        assert!(Region::clamped(10, -50, 20, 20, 100, 100).is_empty());
        assert!(Region::clamped(10, 10, 0, 20, 100, 100).is_empty());
    }

    #[test]
    fn mask_resize_stays_binary() {
        let mask = Mask::from_fn(7, 5, |x, y| (x + y) % 3 == 0);
        let big = mask.resized(23, 17);
        assert_eq!(big.dimensions(), (23, 17));
        assert!(big.as_image().iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn restrict_clears_outside_region() {
        let mut mask = Mask::from_fn(10, 10, |_, _| true);
        mask.restrict_to(&Region {
            x: 2,
            y: 2,
            width: 3,
            height: 3,
        });
        assert_eq!(mask.count(), 9);
        assert!(mask.get(2, 2) && !mask.get(5, 5));
    }

    #[test]
    fn union_rejects_mismatched_sizes() {
        let mut a = Mask::empty(4, 4);
        assert!(a.union(&Mask::empty(4, 5)).is_err());
    }

    #[test]
    fn bgr_order_swaps_red_and_blue() {
        assert_eq!(ChannelOrder::Bgr.from_rgb(Rgb([1, 2, 3])), Rgb([3, 2, 1]));
        assert_eq!(ChannelOrder::Rgb.from_rgb(Rgb([1, 2, 3])), Rgb([1, 2, 3]));
    }
}
