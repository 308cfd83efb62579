use super::MaskStrategy;
use crate::color::{self, HUE_MAX};
use crate::error::{EngineError, EngineResult};
use crate::frame::{ChannelOrder, Frame, Mask, Region};

/// Inclusive per-channel HSV bounds.
///
/// `min <= max` is expected but not enforced; inverted bounds simply select
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvBounds {
    pub min: [u8; 3],
    pub max: [u8; 3],
}

impl HsvBounds {
    pub fn new(min: [u8; 3], max: [u8; 3]) -> Self {
        Self { min, max }
    }

    /// Reject hue values outside `0..=179`.
    pub fn validated(min: [u8; 3], max: [u8; 3]) -> EngineResult<Self> {
        if min[0] > HUE_MAX || max[0] > HUE_MAX {
            return Err(EngineError::config(format!(
                "hue bounds must be within 0..={HUE_MAX}, got {}..{}",
                min[0], max[0]
            )));
        }
        Ok(Self::new(min, max))
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.min[c] && hsv[c] <= self.max[c])
    }
}

/// Pixels whose HSV representation falls inside [`HsvBounds`].
#[derive(Debug, Clone)]
pub struct ColorRangeMask {
    bounds: HsvBounds,
    order: ChannelOrder,
}

impl ColorRangeMask {
    pub fn new(bounds: HsvBounds) -> Self {
        Self {
            bounds,
            order: ChannelOrder::Rgb,
        }
    }

    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.order = order;
        self
    }
}

impl MaskStrategy for ColorRangeMask {
    fn extract(&self, frame: &Frame, _regions: &[Region]) -> Mask {
        let hsv = color::to_hsv(frame, self.order);
        Mask::from_fn(frame.width(), frame.height(), |x, y| {
            self.bounds.contains(hsv.get_pixel(x, y).0)
        })
    }

    fn name(&self) -> &'static str {
        "color-range"
    }
}
