mod color_range;
mod grabcut;
mod threshold;

pub use color_range::{ColorRangeMask, HsvBounds};
pub use grabcut::IterativeForegroundMask;
pub use threshold::{inverse_threshold, FloodFillMask, ThresholdContourMask};

use crate::frame::{Frame, Mask, Region};

/// Interchangeable producer of subject masks.
///
/// Implementations are deterministic for identical inputs and never modify
/// the frame. The returned mask always has the frame's dimensions; an
/// all-zero mask means no subject was found.
pub trait MaskStrategy {
    /// Classify `frame` into subject (255) and everything else (0).
    ///
    /// `regions` are the current detections; strategies that are not seeded
    /// by a region ignore them.
    fn extract(&self, frame: &Frame, regions: &[Region]) -> Mask;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether this strategy needs at least one region to produce anything.
    fn needs_region(&self) -> bool {
        false
    }
}

impl<S: MaskStrategy + ?Sized> MaskStrategy for Box<S> {
    fn extract(&self, frame: &Frame, regions: &[Region]) -> Mask {
        (**self).extract(frame, regions)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn needs_region(&self) -> bool {
        (**self).needs_region()
    }
}

/// Restrict a strategy's output to one region of interest.
///
/// Everything outside the region is classified as background.
pub struct RegionOfInterest<S> {
    inner: S,
    region: Region,
}

impl<S: MaskStrategy> RegionOfInterest<S> {
    pub fn new(inner: S, region: Region) -> Self {
        Self { inner, region }
    }
}

impl<S: MaskStrategy> MaskStrategy for RegionOfInterest<S> {
    fn extract(&self, frame: &Frame, regions: &[Region]) -> Mask {
        let mut mask = self.inner.extract(frame, regions);
        mask.restrict_to(&self.region);
        mask
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn needs_region(&self) -> bool {
        self.inner.needs_region()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flood::Connectivity;
    use image::Rgb;

    fn strategies() -> Vec<Box<dyn MaskStrategy>> {
        vec![
            Box::new(ThresholdContourMask::new(100)),
            Box::new(FloodFillMask::new(100, Connectivity::Four)),
            Box::new(ColorRangeMask::new(HsvBounds::new([0, 100, 100], [10, 255, 255]))),
            Box::new(IterativeForegroundMask::new(2).expect("valid iterations")),
        ]
    }

    fn scene() -> Frame {
        Frame::from_fn(40, 30, |x, y| {
            if (12..28).contains(&x) && (8..22).contains(&y) {
                Rgb([200, 20, 20])
            } else if (x + y) % 7 == 0 {
                Rgb([230, 230, 230])
            } else {
                Rgb([250, 250, 245])
            }
        })
    }

    #[test]
    fn every_strategy_returns_binary_mask_of_frame_size() {
        let frame = scene();
        let regions = [Region {
            x: 8,
            y: 4,
            width: 24,
            height: 22,
        }];
        for strategy in strategies() {
            let mask = strategy.extract(&frame, &regions);
            assert_eq!(mask.dimensions(), frame.dimensions(), "{}", strategy.name());
            assert!(
                mask.as_image().iter().all(|&v| v == 0 || v == 255),
                "{}",
                strategy.name()
            );
        }
    }

    #[test]
    fn region_of_interest_clears_outside() {
        let frame = Frame::from_pixel(20, 20, Rgb([0, 0, 0]));
        let roi = Region {
            x: 5,
            y: 5,
            width: 4,
            height: 6,
        };
        let strategy = RegionOfInterest::new(ThresholdContourMask::new(128), roi);
        let mask = strategy.extract(&frame, &[]);
        assert_eq!(mask.count(), 24);
    }
}
