//! Persistent drawing layer steered by a tracked color marker.
//!
//! Each tick the largest blob of the marker mask is located. While drawing,
//! consecutive blob centroids are joined by line segments; while erasing,
//! the blob's filled shape is cleared from the canvas.

use crate::contour;
use crate::error::EngineResult;
use crate::frame::{ensure_same_size, Frame, Mask, Point};
use image::Rgb;
use imageproc::drawing::draw_filled_circle_mut;

const FRAME_WEIGHT: f32 = 0.3;
const CANVAS_WEIGHT: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailMode {
    #[default]
    Idle,
    Drawing,
    Erasing,
}

/// Per-session temporal state threaded through each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrailState {
    pub mode: TrailMode,
    pub last_centroid: Option<Point>,
}

impl TrailState {
    pub fn new(mode: TrailMode) -> Self {
        Self {
            mode,
            last_centroid: None,
        }
    }

    /// Switch mode. Any change ends the current stroke.
    pub fn with_mode(self, mode: TrailMode) -> Self {
        if mode == self.mode {
            return self;
        }
        Self::new(mode)
    }
}

/// The tracked marker in one frame.
#[derive(Debug, Clone)]
pub struct Marker {
    pub centroid: Point,
    /// Filled shape of the marker's largest blob.
    pub shape: Mask,
}

/// Largest blob of `mask`, if any.
pub fn find_marker(mask: &Mask) -> Option<Marker> {
    let contours = contour::external_contours(mask.as_image());
    let largest = contour::largest(&contours)?;
    Some(Marker {
        centroid: largest.centroid()?,
        shape: largest.fill(mask),
    })
}

#[derive(Debug, Clone)]
pub struct TrailCanvas {
    canvas: Frame,
    color: Rgb<u8>,
    thickness: u32,
}

impl TrailCanvas {
    pub fn new(width: u32, height: u32, color: Rgb<u8>, thickness: u32) -> Self {
        Self {
            canvas: Frame::new(width, height),
            color,
            thickness: thickness.max(1),
        }
    }

    /// Empty canvas of a new size with the same pen.
    pub fn resized_blank(&self, width: u32, height: u32) -> Self {
        Self::new(width, height, self.color, self.thickness)
    }

    pub fn canvas(&self) -> &Frame {
        &self.canvas
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    pub fn set_color(&mut self, color: Rgb<u8>) {
        self.color = color;
    }

    pub fn set_thickness(&mut self, thickness: u32) {
        self.thickness = thickness.max(1);
    }

    /// Wipe the canvas. The only way strokes disappear besides erasing.
    pub fn clear(&mut self) {
        for v in self.canvas.iter_mut() {
            *v = 0;
        }
    }

    /// Locate the marker in `marker_mask` and advance one tick.
    pub fn tick(&mut self, state: TrailState, marker_mask: &Mask) -> EngineResult<TrailState> {
        ensure_same_size(self.dimensions(), marker_mask.dimensions())?;
        let marker = match state.mode {
            TrailMode::Idle => None,
            TrailMode::Drawing | TrailMode::Erasing => find_marker(marker_mask),
        };
        Ok(self.step(state, marker.as_ref()))
    }

    /// Advance one tick given the marker found this tick (if any).
    pub fn step(&mut self, state: TrailState, marker: Option<&Marker>) -> TrailState {
        match (state.mode, marker) {
            (TrailMode::Drawing, Some(marker)) => {
                if let Some(last) = state.last_centroid {
                    self.draw_segment(last, marker.centroid);
                }
                TrailState {
                    mode: TrailMode::Drawing,
                    last_centroid: Some(marker.centroid),
                }
            }
            (TrailMode::Erasing, Some(marker)) => {
                self.erase(&marker.shape);
                TrailState::new(TrailMode::Erasing)
            }
            (mode, _) => TrailState::new(mode),
        }
    }

    /// Stamp a line of the configured color and thickness.
    pub fn draw_segment(&mut self, from: Point, to: Point) {
        let radius = (self.thickness / 2) as i32;
        let steps = (to.x - from.x).abs().max((to.y - from.y).abs());
        let (w, h) = (self.canvas.width() as i32, self.canvas.height() as i32);
        for i in 0..=steps {
            let t = if steps == 0 { 0.0 } else { i as f32 / steps as f32 };
            let x = (from.x as f32 + (to.x - from.x) as f32 * t).round() as i32;
            let y = (from.y as f32 + (to.y - from.y) as f32 * t).round() as i32;
            if radius == 0 {
                if x >= 0 && y >= 0 && x < w && y < h {
                    self.canvas.put_pixel(x as u32, y as u32, self.color);
                }
            } else {
                draw_filled_circle_mut(&mut self.canvas, (x, y), radius, self.color);
            }
        }
    }

    /// Zero every canvas pixel covered by `shape`.
    pub fn erase(&mut self, shape: &Mask) {
        if shape.dimensions() != self.dimensions() {
            tracing::warn!("eraser shape size {:?} does not match canvas", shape.dimensions());
            return;
        }
        for (x, y, p) in self.canvas.enumerate_pixels_mut() {
            if shape.get(x, y) {
                *p = Rgb([0, 0, 0]);
            }
        }
    }

    /// Display blend: 30% camera frame, 70% canvas.
    pub fn blend_over(&self, frame: &Frame) -> EngineResult<Frame> {
        ensure_same_size(self.dimensions(), frame.dimensions())?;
        let mut out = frame.clone();
        for (o, c) in out.iter_mut().zip(self.canvas.iter()) {
            let v = FRAME_WEIGHT * *o as f32 + CANVAS_WEIGHT * *c as f32;
            *o = v.round().clamp(0.0, 255.0) as u8;
        }
        Ok(out)
    }
}
