//! Iterative graph-cut foreground extraction seeded by a bounding box.
//!
//! Colors inside and outside the box are modelled by two Gaussian mixtures.
//! Each iteration reassigns pixels to mixture components, refits the
//! mixtures, and solves a min-cut between per-pixel color likelihoods and a
//! contrast-sensitive smoothness term. Only pixels inside the box can change
//! label; everything outside stays definite background.

mod gmm;
mod maxflow;

use super::MaskStrategy;
use crate::error::{EngineError, EngineResult};
use crate::frame::{Frame, Mask, Region};
use gmm::{Color, Gmm};
use image::imageops;
use maxflow::FlowGraph;

const GAMMA: f64 = 50.0;
const LAMBDA: f64 = 9.0 * GAMMA;
/// Floor for likelihoods before taking logarithms.
const MIN_PROBABILITY: f64 = 1e-300;

pub const DEFAULT_ITERATIONS: u32 = 5;
pub const DEFAULT_SCALE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Background,
    ProbableBackground,
    ProbableForeground,
}

impl Label {
    fn is_foreground(self) -> bool {
        matches!(self, Label::ProbableForeground)
    }

    /// Definite labels are never revised by the cut.
    fn is_probable(self) -> bool {
        !matches!(self, Label::Background)
    }
}

/// GrabCut-style subject extraction, one run per detected region.
///
/// The frame is downscaled by `scale` before classification and the result
/// is upscaled back with nearest-neighbor sampling so it stays binary.
/// Without any region the mask is empty.
#[derive(Debug, Clone)]
pub struct IterativeForegroundMask {
    iterations: u32,
    scale: f32,
}

impl IterativeForegroundMask {
    pub fn new(iterations: u32) -> EngineResult<Self> {
        if iterations == 0 {
            return Err(EngineError::config("iteration count must be at least 1"));
        }
        Ok(Self {
            iterations,
            scale: DEFAULT_SCALE,
        })
    }

    /// Working resolution as a fraction of the frame, in `(0, 1]`.
    pub fn with_scale(mut self, scale: f32) -> EngineResult<Self> {
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(EngineError::config(format!(
                "scale must be in (0, 1], got {scale}"
            )));
        }
        self.scale = scale;
        Ok(self)
    }
}

impl Default for IterativeForegroundMask {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            scale: DEFAULT_SCALE,
        }
    }
}

impl MaskStrategy for IterativeForegroundMask {
    fn extract(&self, frame: &Frame, regions: &[Region]) -> Mask {
        let (width, height) = frame.dimensions();
        let _span = tracing::debug_span!("grabcut", regions = regions.len()).entered();

        let small_w = ((width as f32 * self.scale) as u32).max(1);
        let small_h = ((height as f32 * self.scale) as u32).max(1);
        let small = if (small_w, small_h) == (width, height) {
            frame.clone()
        } else {
            imageops::resize(frame, small_w, small_h, imageops::FilterType::Triangle)
        };
        let sx = small_w as f64 / width.max(1) as f64;
        let sy = small_h as f64 / height.max(1) as f64;

        let mut combined = Mask::empty(small_w, small_h);
        for region in regions.iter().filter(|r| !r.is_empty()) {
            let rect = region.scaled(sx, sy, small_w, small_h);
            if rect.is_empty() {
                continue;
            }
            let labels = segment(&small, &rect, self.iterations);
            for (i, label) in labels.iter().enumerate() {
                if label.is_foreground() {
                    let i = i as u32;
                    combined.set(i % small_w, i / small_w, true);
                }
            }
        }

        combined.resized(width, height)
    }

    fn name(&self) -> &'static str {
        "iterative-foreground"
    }

    fn needs_region(&self) -> bool {
        true
    }
}

/// Neighbor offsets used for smoothness links: left, up-left, up, up-right.
const NEIGHBORS: [(i32, i32, bool); 4] = [(-1, 0, false), (-1, -1, true), (0, -1, false), (1, -1, true)];

fn colors_of(image: &Frame) -> Vec<Color> {
    image
        .pixels()
        .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64])
        .collect()
}

fn diff_sq(a: &Color, b: &Color) -> f64 {
    (0..3).map(|i| (a[i] - b[i]) * (a[i] - b[i])).sum()
}

/// Contrast normalizer: inverse of twice the mean squared neighbor difference.
fn beta(colors: &[Color], width: usize, height: usize) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for y in 0..height {
        for x in 0..width {
            let c = &colors[y * width + x];
            for &(dx, dy, _) in &NEIGHBORS {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if nx < 0 || ny < 0 || nx >= width as i32 {
                    continue;
                }
                sum += diff_sq(c, &colors[ny as usize * width + nx as usize]);
                count += 1;
            }
        }
    }
    if count == 0 || sum <= f64::EPSILON {
        0.0
    } else {
        1.0 / (2.0 * sum / count as f64)
    }
}

fn segment(image: &Frame, rect: &Region, iterations: u32) -> Vec<Label> {
    let (w, h) = image.dimensions();
    let (width, height) = (w as usize, h as usize);
    let colors = colors_of(image);

    let mut labels: Vec<Label> = (0..width * height)
        .map(|i| {
            let (x, y) = ((i % width) as u32, (i / width) as u32);
            if rect.contains(x, y) {
                Label::ProbableForeground
            } else {
                Label::Background
            }
        })
        .collect();

    let split = |labels: &[Label], fg: bool| -> Vec<Color> {
        labels
            .iter()
            .zip(&colors)
            .filter(|(l, _)| l.is_foreground() == fg)
            .map(|(_, c)| *c)
            .collect()
    };

    // A box covering the whole image leaves nothing to learn background from.
    if split(&labels, false).is_empty() {
        return labels;
    }

    let mut bgd = Gmm::fit(&split(&labels, false));
    let mut fgd = Gmm::fit(&split(&labels, true));

    let beta = beta(&colors, width, height);
    let smoothness = |a: &Color, b: &Color, diagonal: bool| -> f64 {
        let weight = if diagonal {
            GAMMA / std::f64::consts::SQRT_2
        } else {
            GAMMA
        };
        weight * (-beta * diff_sq(a, b)).exp()
    };

    for iteration in 0..iterations {
        // assign each pixel to its most likely component, then refit
        let mut bgd_samples = Vec::new();
        let mut bgd_assign = Vec::new();
        let mut fgd_samples = Vec::new();
        let mut fgd_assign = Vec::new();
        for (label, color) in labels.iter().zip(&colors) {
            if label.is_foreground() {
                fgd_assign.push(fgd.most_likely(color));
                fgd_samples.push(*color);
            } else {
                bgd_assign.push(bgd.most_likely(color));
                bgd_samples.push(*color);
            }
        }
        if fgd_samples.is_empty() {
            tracing::debug!("grabcut: no foreground left after iteration {}", iteration);
            break;
        }
        bgd = Gmm::learn(&bgd_samples, &bgd_assign);
        fgd = Gmm::learn(&fgd_samples, &fgd_assign);

        let mut graph = FlowGraph::new(width * height);
        for y in 0..height {
            for x in 0..width {
                let p = y * width + x;
                let color = &colors[p];
                let (from_source, to_sink) = match labels[p] {
                    Label::Background => (0.0, LAMBDA),
                    _ => (
                        -bgd.probability(color).max(MIN_PROBABILITY).ln(),
                        -fgd.probability(color).max(MIN_PROBABILITY).ln(),
                    ),
                };
                graph.add_terminal_weights(p, from_source, to_sink);

                for &(dx, dy, diagonal) in &NEIGHBORS {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i32 {
                        continue;
                    }
                    let q = ny as usize * width + nx as usize;
                    let weight = smoothness(color, &colors[q], diagonal);
                    graph.add_edge(p, q, weight, weight);
                }
            }
        }

        graph.max_flow();
        let source_side = graph.source_side();
        for (label, &in_source) in labels.iter_mut().zip(&source_side) {
            if label.is_probable() {
                *label = if in_source {
                    Label::ProbableForeground
                } else {
                    Label::ProbableBackground
                };
            }
        }
    }

    labels
}
