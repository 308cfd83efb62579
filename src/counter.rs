//! Counting distinct objects inside a segmented subject.
//!
//! The subject mask comes from any [`MaskStrategy`](crate::mask::MaskStrategy),
//! usually the region-seeded classifier. Subject pixels brighter than the
//! threshold form the binary image whose external contours are counted.

use crate::color;
use crate::contour::{self, ObjectBlob};
use crate::error::{EngineError, EngineResult};
use crate::frame::{ensure_same_size, ChannelOrder, Frame, Mask};
use image::Rgb;
use imageproc::drawing::draw_filled_circle_mut;

/// Blobs enclosing less than this many pixels are noise.
pub const DEFAULT_MIN_AREA: f64 = 100.0;

const PALETTE: [Rgb<u8>; 8] = [
    Rgb([230, 25, 75]),
    Rgb([60, 180, 75]),
    Rgb([255, 225, 25]),
    Rgb([0, 130, 200]),
    Rgb([245, 130, 48]),
    Rgb([145, 30, 180]),
    Rgb([70, 240, 240]),
    Rgb([240, 50, 230]),
];
const CENTROID_MARK: Rgb<u8> = Rgb([255, 255, 255]);

/// Objects found in one image.
#[derive(Debug, Clone)]
pub struct CountResult {
    /// Thresholded subject the contours were traced on.
    pub binary: Mask,
    pub objects: Vec<ObjectBlob>,
}

impl CountResult {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Black frame with every counted blob filled in its own color and a
    /// white dot at each centroid. Colors cycle through a fixed palette.
    pub fn render(&self) -> Frame {
        let (width, height) = self.binary.dimensions();
        let mut out = Frame::new(width, height);
        for (i, object) in self.objects.iter().enumerate() {
            let color = PALETTE[i % PALETTE.len()];
            let shape = object.contour.fill(&self.binary);
            for (x, y, p) in out.enumerate_pixels_mut() {
                if shape.get(x, y) {
                    *p = color;
                }
            }
        }
        for c in self.objects.iter().filter_map(|o| o.centroid) {
            draw_filled_circle_mut(&mut out, (c.x, c.y), 2, CENTROID_MARK);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct ObjectCounter {
    threshold: u8,
    min_area: f64,
    order: ChannelOrder,
}

impl ObjectCounter {
    pub fn new(threshold: u8, min_area: f64) -> EngineResult<Self> {
        if !(min_area >= 0.0) {
            return Err(EngineError::config(format!(
                "minimum area must not be negative, got {min_area}"
            )));
        }
        Ok(Self {
            threshold,
            min_area,
            order: ChannelOrder::Rgb,
        })
    }

    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.order = order;
        self
    }

    /// Subject pixels whose luminance is strictly above the threshold.
    pub fn subject_binary(&self, frame: &Frame, subject: &Mask) -> EngineResult<Mask> {
        ensure_same_size(frame.dimensions(), subject.dimensions())?;
        let gray = color::to_luminance(frame, self.order);
        Ok(Mask::from_fn(frame.width(), frame.height(), |x, y| {
            subject.get(x, y) && gray.get_pixel(x, y)[0] > self.threshold
        }))
    }

    pub fn count(&self, frame: &Frame, subject: &Mask) -> EngineResult<CountResult> {
        let _span = tracing::debug_span!("count_objects", threshold = self.threshold).entered();
        let binary = self.subject_binary(frame, subject)?;
        let objects = contour::count_objects(&binary, self.min_area);
        tracing::debug!("{} object(s) at least {} px", objects.len(), self.min_area);
        Ok(CountResult { binary, objects })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Point;

    /// Bright blob on the left, mid-gray blob on the right, black elsewhere.
    fn two_blobs() -> Frame {
        Frame::from_fn(60, 30, |x, y| {
            if (5..20).contains(&x) && (5..20).contains(&y) {
                Rgb([220, 220, 220])
            } else if (35..50).contains(&x) && (5..20).contains(&y) {
                Rgb([90, 90, 90])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    fn whole(frame: &Frame) -> Mask {
        Mask::from_fn(frame.width(), frame.height(), |_, _| true)
    }

    #[test]
    fn raising_threshold_drops_dim_blob() {
        let frame = two_blobs();
        let subject = whole(&frame);

        let low = ObjectCounter::new(50, DEFAULT_MIN_AREA).unwrap();
        assert_eq!(low.count(&frame, &subject).unwrap().len(), 2);

        let high = ObjectCounter::new(120, DEFAULT_MIN_AREA).unwrap();
        let result = high.count(&frame, &subject).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.objects[0].centroid, Some(Point::new(12, 12)));
    }

    #[test]
    fn pixels_outside_subject_never_count() {
        let frame = two_blobs();
        let left_only = Mask::from_fn(60, 30, |x, _| x < 30);
        let result = ObjectCounter::new(50, DEFAULT_MIN_AREA)
            .unwrap()
            .count(&frame, &left_only)
            .unwrap();
        assert_eq!(result.len(), 1);
        assert!(!result.binary.get(40, 10));
    }

    #[test]
    fn small_blobs_are_ignored() {
        let frame = two_blobs();
        let result = ObjectCounter::new(50, 500.0)
            .unwrap()
            .count(&frame, &whole(&frame))
            .unwrap();
        assert!(result.is_empty());
        assert!(ObjectCounter::new(50, -1.0).is_err());
    }

    #[test]
    fn render_fills_each_blob_in_its_own_color() {
        let frame = two_blobs();
        let result = ObjectCounter::new(50, DEFAULT_MIN_AREA)
            .unwrap()
            .count(&frame, &whole(&frame))
            .unwrap();
        let out = result.render();
        assert_eq!(out.dimensions(), (60, 30));
        let a = *out.get_pixel(6, 6);
        let b = *out.get_pixel(48, 18);
        assert_ne!(a, Rgb([0, 0, 0]));
        assert_ne!(b, Rgb([0, 0, 0]));
        assert_ne!(a, b);
        assert_eq!(out.get_pixel(28, 25), &Rgb([0, 0, 0]));
        for c in result.objects.iter().filter_map(|o| o.centroid) {
            assert_eq!(out.get_pixel(c.x as u32, c.y as u32), &CENTROID_MARK);
        }
    }

    #[test]
    fn mismatched_subject_rejected() {
        let counter = ObjectCounter::new(50, DEFAULT_MIN_AREA).unwrap();
        assert!(counter.count(&two_blobs(), &Mask::empty(10, 10)).is_err());
    }
}
