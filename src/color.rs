//! Color conversions on 8-bit frames.
//!
//! Luminance uses the ITU-R BT.601 weights in 14-bit fixed point and HSV
//! follows the 8-bit convention where hue is halved to fit `0..=179`.

use crate::frame::{ChannelOrder, Frame};
use image::{GrayImage, Luma, Rgb};

const LUMA_SHIFT: u32 = 14;
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;

/// Largest hue value in the 8-bit representation.
pub const HUE_MAX: u8 = 179;

fn rgb_of(pixel: &Rgb<u8>, order: ChannelOrder) -> (u8, u8, u8) {
    match order {
        ChannelOrder::Rgb => (pixel[0], pixel[1], pixel[2]),
        ChannelOrder::Bgr => (pixel[2], pixel[1], pixel[0]),
    }
}

pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = (r as u32 * LUMA_R + g as u32 * LUMA_G + b as u32 * LUMA_B + (1 << (LUMA_SHIFT - 1)))
        >> LUMA_SHIFT;
    y.min(255) as u8
}

/// Single-channel luminance image of `frame`.
pub fn to_luminance(frame: &Frame, order: ChannelOrder) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let (r, g, b) = rgb_of(frame.get_pixel(x, y), order);
        Luma([luma(r, g, b)])
    })
}

/// Convert one RGB pixel to (hue 0..=179, saturation 0..=255, value 0..=255).
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;

    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };

    let h = if diff == 0.0 {
        0.0
    } else {
        let h = if v == rf {
            60.0 * (gf - bf) / diff
        } else if v == gf {
            120.0 + 60.0 * (bf - rf) / diff
        } else {
            240.0 + 60.0 * (rf - gf) / diff
        };
        if h < 0.0 {
            h + 360.0
        } else {
            h
        }
    };

    let mut hue = (h / 2.0).round() as u32;
    if hue > HUE_MAX as u32 {
        hue = 0;
    }

    [hue as u8, s.round().min(255.0) as u8, v as u8]
}

/// Three-channel HSV image of `frame`, stored in an `Rgb` buffer as (H, S, V).
pub fn to_hsv(frame: &Frame, order: ChannelOrder) -> image::RgbImage {
    image::RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
        let (r, g, b) = rgb_of(frame.get_pixel(x, y), order);
        Rgb(rgb_to_hsv(r, g, b))
    })
}
