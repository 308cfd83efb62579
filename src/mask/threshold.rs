use super::MaskStrategy;
use crate::color;
use crate::contour;
use crate::flood::{self, Connectivity};
use crate::frame::{ChannelOrder, Frame, Mask, Region};
use image::{GrayImage, Luma};

/// Inverse binary threshold: luminance `<= threshold` becomes 255, brighter
/// pixels become 0.
pub fn inverse_threshold(frame: &Frame, threshold: u8, order: ChannelOrder) -> GrayImage {
    let mut gray = color::to_luminance(frame, order);
    for p in gray.pixels_mut() {
        *p = Luma([if p[0] > threshold { 0 } else { 255 }]);
    }
    gray
}

/// Dark subject on a light background, cleaned up by contour closure.
///
/// Thresholds the luminance, then fills every external contour of the
/// result so isolated specks inside the subject disappear. Holes are
/// ignored.
#[derive(Debug, Clone)]
pub struct ThresholdContourMask {
    threshold: u8,
    order: ChannelOrder,
}

impl ThresholdContourMask {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            order: ChannelOrder::Rgb,
        }
    }

    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.order = order;
        self
    }
}

impl MaskStrategy for ThresholdContourMask {
    fn extract(&self, frame: &Frame, _regions: &[Region]) -> Mask {
        let _span = tracing::debug_span!("threshold_contour", threshold = self.threshold).entered();
        let binary = inverse_threshold(frame, self.threshold, self.order);
        contour::fill_external(&binary)
    }

    fn name(&self) -> &'static str {
        "threshold-contour"
    }
}

/// Subject found as the complement of the background region connected to
/// the top-left corner.
///
/// Only correct when the background is one connected region touching the
/// border at (0, 0). A subject that touches that corner leaks: the flood
/// then covers the subject itself and the mask comes out wrong. Callers
/// pick this strategy only when the assumption holds, so no check is made.
#[derive(Debug, Clone)]
pub struct FloodFillMask {
    threshold: u8,
    connectivity: Connectivity,
    order: ChannelOrder,
}

impl FloodFillMask {
    pub fn new(threshold: u8, connectivity: Connectivity) -> Self {
        Self {
            threshold,
            connectivity,
            order: ChannelOrder::Rgb,
        }
    }

    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.order = order;
        self
    }
}

impl MaskStrategy for FloodFillMask {
    fn extract(&self, frame: &Frame, _regions: &[Region]) -> Mask {
        let _span = tracing::debug_span!("flood_fill", threshold = self.threshold).entered();
        let binary = inverse_threshold(frame, self.threshold, self.order);
        let (width, height) = binary.dimensions();
        let background = flood::flood_region(&binary, (0, 0), self.connectivity);
        Mask::from_fn(width, height, |x, y| !background[(y * width + x) as usize])
    }

    fn name(&self) -> &'static str {
        "flood-fill"
    }
}
