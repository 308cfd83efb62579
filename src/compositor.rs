use crate::error::EngineResult;
use crate::filter::BackgroundFilter;
use crate::frame::{ensure_same_size, ChannelOrder, Frame, Mask};
use image::{imageops, Rgb};

/// Where replacement background pixels come from.
///
/// Exactly one source is active; choosing another replaces it.
#[derive(Debug, Clone)]
pub enum BackgroundSource {
    /// Solid color, always given as RGB regardless of frame channel order.
    SolidColor(Rgb<u8>),
    /// Image stretched to the frame size. Must share the frame's channel order.
    Image(Frame),
    /// Filtered copy of the current frame.
    Filter(BackgroundFilter),
}

/// Merges a frame's subject with a replacement background.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor {
    order: ChannelOrder,
}

impl Compositor {
    pub fn new(order: ChannelOrder) -> Self {
        Self { order }
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.order
    }

    /// Background buffer with exactly the frame's dimensions and channel order.
    pub fn resolve_background(&self, frame: &Frame, source: &BackgroundSource) -> Frame {
        let (width, height) = frame.dimensions();
        match source {
            BackgroundSource::Image(image) if image.dimensions() == (width, height) => {
                image.clone()
            }
            BackgroundSource::Image(image) => {
                imageops::resize(image, width, height, imageops::FilterType::Triangle)
            }
            BackgroundSource::SolidColor(rgb) => {
                // convert before blending; the result must never be flipped afterwards
                Frame::from_pixel(width, height, self.order.from_rgb(*rgb))
            }
            BackgroundSource::Filter(filter) => filter.apply(frame, self.order),
        }
    }

    /// Subject pixels from `frame` where the mask is set, background elsewhere.
    ///
    /// An empty mask yields the background alone. The output always has the
    /// frame's dimensions.
    pub fn compose(
        &self,
        frame: &Frame,
        mask: &Mask,
        background: &BackgroundSource,
    ) -> EngineResult<Frame> {
        ensure_same_size(frame.dimensions(), mask.dimensions())?;
        let _span = tracing::debug_span!("compose").entered();

        let resolved = self.resolve_background(frame, background);
        let mut out = Frame::new(frame.width(), frame.height());
        for (x, y, px) in out.enumerate_pixels_mut() {
            let selected = mask.get(x, y);
            let fg = if selected { *frame.get_pixel(x, y) } else { Rgb([0, 0, 0]) };
            let bg = if selected { Rgb([0, 0, 0]) } else { *resolved.get_pixel(x, y) };
            *px = Rgb([
                fg[0].saturating_add(bg[0]),
                fg[1].saturating_add(bg[1]),
                fg[2].saturating_add(bg[2]),
            ]);
        }
        Ok(out)
    }
}
