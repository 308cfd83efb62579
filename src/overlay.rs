//! Placement of an auxiliary asset (e.g. a hat) relative to a detected region.

use crate::color;
use crate::contour;
use crate::error::{EngineError, EngineResult};
use crate::frame::{ensure_same_size, ChannelOrder, Frame, Mask, Region};
use image::{imageops, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, dilate, erode};

/// Luminance above which an asset pixel counts as opaque.
const ASSET_THRESHOLD: u8 = 5;

/// An overlay image together with its opacity mask.
#[derive(Debug, Clone)]
pub struct OverlayAsset {
    image: Frame,
    mask: Mask,
}

impl OverlayAsset {
    /// Derive the opacity mask from the image itself: everything brighter
    /// than near-black, cleaned up morphologically and hole-filled.
    pub fn new(image: Frame, order: ChannelOrder) -> Self {
        let mask = asset_mask(&image, order);
        Self { image, mask }
    }

    pub fn with_mask(image: Frame, mask: Mask) -> EngineResult<Self> {
        ensure_same_size(image.dimensions(), mask.dimensions())?;
        Ok(Self { image, mask })
    }

    pub fn image(&self) -> &Frame {
        &self.image
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }
}

fn asset_mask(image: &Frame, order: ChannelOrder) -> Mask {
    let gray = color::to_luminance(image, order);
    let binary = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([if gray.get_pixel(x, y)[0] > ASSET_THRESHOLD { 255 } else { 0 }])
    });
    let binary = erode(&erode(&binary, Norm::LInf, 1), Norm::LInf, 1);
    let binary = dilate(&binary, Norm::LInf, 1);
    let binary = close(&binary, Norm::LInf, 1);
    let filled = contour::fill_external(&binary).into_image();
    Mask::from_nonzero(&dilate(&filled, Norm::LInf, 1))
}

/// User-tunable placement parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementOffsets {
    /// Asset width as a multiple of the region width.
    pub width_scale: f32,
    /// Extra pixels added above the asset.
    pub top: i32,
    /// Pixels the asset extends below the anchor point.
    pub bottom: i32,
}

impl PlacementOffsets {
    pub fn new(width_scale: f32, top: i32, bottom: i32) -> EngineResult<Self> {
        if !(width_scale > 0.0) {
            return Err(EngineError::config(format!(
                "width scale must be positive, got {width_scale}"
            )));
        }
        Ok(Self {
            width_scale,
            top,
            bottom,
        })
    }

    /// From an integer slider expressing the width scale in tenths.
    pub fn from_tenths(width_tenths: u32, top: i32, bottom: i32) -> EngineResult<Self> {
        Self::new(width_tenths as f32 / 10.0, top, bottom)
    }
}

impl Default for PlacementOffsets {
    fn default() -> Self {
        Self {
            width_scale: 1.5,
            top: 0,
            bottom: 0,
        }
    }
}

/// Outcome of placing an asset for one region.
#[derive(Debug, Clone)]
pub enum Placement {
    Placed {
        dest: Region,
        asset: Frame,
        mask: Mask,
    },
    /// Nothing of the destination is left inside the frame.
    Degenerate,
}

impl Placement {
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Placement::Degenerate)
    }

    pub fn dest(&self) -> Option<Region> {
        match self {
            Placement::Placed { dest, .. } => Some(*dest),
            Placement::Degenerate => None,
        }
    }
}

/// Unclamped destination rectangle `(x, y, width, height)` for `region`.
///
/// The anchor sits at the horizontal center and upper quarter of the region.
/// One third of the asset width lies left of the anchor; the asset is half
/// the region tall, raised by `top` and extended down by `bottom`.
pub fn destination(region: &Region, offsets: &PlacementOffsets) -> (i64, i64, i64, i64) {
    let (x, y) = (region.x as i64, region.y as i64);
    let (w, h) = (region.width as i64, region.height as i64);
    let anchor_x = x + w / 2;
    let anchor_y = y + h / 4;
    let asset_w = (w as f32 * offsets.width_scale) as i64;
    let asset_h = h / 2;

    let x1 = anchor_x - asset_w / 3;
    let y1 = anchor_y - asset_h - offsets.top as i64;
    let y2 = anchor_y + offsets.bottom as i64;
    (x1, y1, asset_w, y2 - y1)
}

/// Compute where `asset` goes for `region` and resize it (and its mask) to fit.
pub fn place(
    region: &Region,
    asset: &OverlayAsset,
    offsets: &PlacementOffsets,
    frame_width: u32,
    frame_height: u32,
) -> Placement {
    if region.is_empty() {
        return Placement::Degenerate;
    }
    let (x, y, w, h) = destination(region, offsets);
    let dest = Region::clamped(x, y, w, h, frame_width, frame_height);
    if dest.is_empty() {
        tracing::debug!("overlay for {:?} falls outside the frame", region);
        return Placement::Degenerate;
    }
    let resized = imageops::resize(
        asset.image(),
        dest.width,
        dest.height,
        imageops::FilterType::Triangle,
    );
    Placement::Placed {
        dest,
        asset: resized,
        mask: asset.mask().resized(dest.width, dest.height),
    }
}

/// Paint a placement into `frame`: asset pixels where its mask is set, the
/// frame untouched elsewhere. Returns false (and leaves the frame alone) for
/// degenerate placements.
pub fn apply(frame: &mut Frame, placement: &Placement) -> bool {
    let Placement::Placed { dest, asset, mask } = placement else {
        return false;
    };
    for dy in 0..dest.height {
        for dx in 0..dest.width {
            if mask.get(dx, dy) {
                frame.put_pixel(dest.x + dx, dest.y + dy, *asset.get_pixel(dx, dy));
            }
        }
    }
    true
}
