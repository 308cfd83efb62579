use crate::compositor::{BackgroundSource, Compositor};
use crate::frame::{Frame, Mask};
use crate::mask::MaskStrategy;
use crate::overlay::{self, OverlayAsset, PlacementOffsets};
use crate::region::{DetectionCache, DetectionResult, RegionLocator};
use crate::trail::{TrailCanvas, TrailMode, TrailState};
use anyhow::{Context, Result};

/// Default number of ticks a detection result is reused for.
pub const DEFAULT_REFRESH_TICKS: u32 = 10;

/// What the pipeline does with a frame once regions are known.
pub enum Stage {
    /// Keep the subject, replace everything else.
    Composite {
        strategy: Box<dyn MaskStrategy>,
        background: BackgroundSource,
    },
    /// Paint an asset relative to every detected region.
    Overlay {
        asset: OverlayAsset,
        offsets: PlacementOffsets,
    },
    /// Track a marker and draw or erase on a persistent canvas.
    Trail {
        marker: Box<dyn MaskStrategy>,
        canvas: TrailCanvas,
    },
    /// Emit the mask itself as a grayscale frame.
    Matte { strategy: Box<dyn MaskStrategy> },
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Composite { .. } => "composite",
            Stage::Overlay { .. } => "overlay",
            Stage::Trail { .. } => "trail",
            Stage::Matte { .. } => "matte",
        }
    }
}

/// Session state carried from one tick to the next.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub detections: DetectionCache,
    pub trail: TrailState,
    pub ticks: u64,
    last_dimensions: Option<(u32, u32)>,
}

impl PipelineState {
    pub fn new(refresh_every: u32) -> Self {
        Self {
            detections: DetectionCache::new(refresh_every),
            trail: TrailState::default(),
            ticks: 0,
            last_dimensions: None,
        }
    }

    /// Forget cached detections and end any stroke in progress.
    pub fn reset(&mut self) {
        self.detections.invalidate();
        self.trail = TrailState::new(self.trail.mode);
        self.last_dimensions = None;
    }

    pub fn set_mode(&mut self, mode: TrailMode) {
        self.trail = self.trail.with_mode(mode);
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_TICKS)
    }
}

/// Result of one pass.
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub frame: Frame,
    pub detections: DetectionResult,
    /// False when nothing was selected: empty mask, no region, or every
    /// overlay placement degenerate. The frame is still valid output.
    pub selected: bool,
}

/// Orchestrates locate → mask → composite/overlay/draw for one frame.
pub struct FramePipeline {
    locator: Option<Box<dyn RegionLocator>>,
    compositor: Compositor,
    stage: Stage,
}

impl FramePipeline {
    pub fn new(stage: Stage) -> Self {
        Self {
            locator: None,
            compositor: Compositor::default(),
            stage,
        }
    }

    pub fn with_locator(mut self, locator: Box<dyn RegionLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn with_compositor(mut self, compositor: Compositor) -> Self {
        self.compositor = compositor;
        self
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Swap the active background. Returns false if the stage composites nothing.
    pub fn set_background(&mut self, source: BackgroundSource) -> bool {
        match &mut self.stage {
            Stage::Composite { background, .. } => {
                *background = source;
                true
            }
            _ => false,
        }
    }

    pub fn canvas_mut(&mut self) -> Option<&mut TrailCanvas> {
        match &mut self.stage {
            Stage::Trail { canvas, .. } => Some(canvas),
            _ => None,
        }
    }

    /// One-shot processing of a still image. No state survives the call.
    pub fn run_once(&mut self, frame: &Frame) -> Result<TickOutput> {
        let detections = match self.locator.as_mut() {
            Some(locator) => locator.locate(frame).context("Failed to locate regions")?,
            None => DetectionResult::default(),
        };
        let (output, _) = self.process(frame, detections, TrailState::default())?;
        Ok(output)
    }

    /// One live tick; detections are refreshed on the cache's schedule.
    pub fn tick(&mut self, frame: &Frame, mut state: PipelineState) -> Result<(TickOutput, PipelineState)> {
        let _span = tracing::debug_span!("tick", n = state.ticks, stage = self.stage.name()).entered();

        if state.last_dimensions != Some(frame.dimensions()) {
            if state.last_dimensions.is_some() {
                tracing::info!("frame size changed to {:?}, dropping cached detections", frame.dimensions());
            }
            state.detections.invalidate();
            state.last_dimensions = Some(frame.dimensions());
        }

        let detections = match self.locator.as_mut() {
            Some(locator) => state
                .detections
                .get_or_refresh(frame, &mut **locator)
                .context("Failed to locate regions")?,
            None => DetectionResult::default(),
        };

        let (output, trail) = self.process(frame, detections, state.trail)?;
        state.trail = trail;
        state.ticks += 1;
        Ok((output, state))
    }

    fn process(
        &mut self,
        frame: &Frame,
        detections: DetectionResult,
        trail: TrailState,
    ) -> Result<(TickOutput, TrailState)> {
        let (width, height) = frame.dimensions();
        let regions = &detections.regions;

        let (out, selected, trail) = match &mut self.stage {
            Stage::Composite {
                strategy,
                background,
            } => {
                let mask = extract(&**strategy, frame, &detections);
                let selected = !mask.is_empty();
                if !selected {
                    tracing::debug!("{}: empty mask, background only", strategy.name());
                }
                let out = self.compositor.compose(frame, &mask, background)?;
                (out, selected, trail)
            }
            Stage::Overlay { asset, offsets } => {
                let mut out = frame.clone();
                let mut placed = 0;
                for region in regions {
                    let placement = overlay::place(region, asset, offsets, width, height);
                    if overlay::apply(&mut out, &placement) {
                        placed += 1;
                    }
                }
                (out, placed > 0, trail)
            }
            Stage::Trail { marker, canvas } => {
                if canvas.dimensions() != (width, height) {
                    tracing::warn!("canvas size {:?} differs from frame, starting a new canvas", canvas.dimensions());
                    *canvas = canvas.resized_blank(width, height);
                }
                let mask = extract(&**marker, frame, &detections);
                let selected = !mask.is_empty();
                let next = canvas.tick(trail, &mask)?;
                (canvas.blend_over(frame)?, selected, next)
            }
            Stage::Matte { strategy } => {
                let mask = extract(&**strategy, frame, &detections);
                (mask.to_frame(), !mask.is_empty(), trail)
            }
        };

        Ok((
            TickOutput {
                frame: out,
                detections,
                selected,
            },
            trail,
        ))
    }
}

fn extract(strategy: &dyn MaskStrategy, frame: &Frame, detections: &DetectionResult) -> Mask {
    if strategy.needs_region() && detections.is_empty() {
        return Mask::empty(frame.width(), frame.height());
    }
    strategy.extract(frame, &detections.regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{BoundingBox, Point, Region};
    use crate::mask::{ColorRangeMask, HsvBounds, IterativeForegroundMask, ThresholdContourMask};
    use crate::region::{DetectorLocator, ManualRegion, StaticDetector};
    use image::Rgb;

    fn dark_square() -> Frame {
        Frame::from_fn(32, 32, |x, y| {
            if (8..24).contains(&x) && (8..24).contains(&y) {
                Rgb([20, 20, 20])
            } else {
                Rgb([240, 240, 240])
            }
        })
    }

    #[test]
    fn composite_still_replaces_background() {
        let mut pipeline = FramePipeline::new(Stage::Composite {
            strategy: Box::new(ThresholdContourMask::new(128)),
            background: BackgroundSource::SolidColor(Rgb([0, 0, 255])),
        });
        let out = pipeline.run_once(&dark_square()).unwrap();
        assert!(out.selected);
        assert_eq!(out.frame.get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert_eq!(out.frame.get_pixel(16, 16), &Rgb([20, 20, 20]));
    }

    #[test]
    fn white_frame_composites_to_background() {
        let mut pipeline = FramePipeline::new(Stage::Composite {
            strategy: Box::new(ThresholdContourMask::new(128)),
            background: BackgroundSource::SolidColor(Rgb([9, 8, 7])),
        });
        let white = Frame::from_pixel(100, 100, Rgb([255, 255, 255]));
        let out = pipeline.run_once(&white).unwrap();
        assert!(!out.selected);
        assert!(out.frame.pixels().all(|p| *p == Rgb([9, 8, 7])));
    }

    #[test]
    fn region_seeded_strategy_without_regions_is_a_no_op() {
        let mut pipeline = FramePipeline::new(Stage::Composite {
            strategy: Box::new(IterativeForegroundMask::default()),
            background: BackgroundSource::SolidColor(Rgb([1, 1, 1])),
        })
        .with_locator(Box::new(ManualRegion::default()));
        let out = pipeline.run_once(&dark_square()).unwrap();
        assert!(!out.selected);
        assert!(out.detections.is_empty());
    }

    #[test]
    fn set_background_replaces_previous_choice() {
        let mut pipeline = FramePipeline::new(Stage::Composite {
            strategy: Box::new(ThresholdContourMask::new(128)),
            background: BackgroundSource::SolidColor(Rgb([1, 1, 1])),
        });
        assert!(pipeline.set_background(BackgroundSource::Image(Frame::from_pixel(
            2,
            2,
            Rgb([50, 60, 70])
        ))));
        let out = pipeline.run_once(&dark_square()).unwrap();
        assert_eq!(out.frame.get_pixel(0, 0), &Rgb([50, 60, 70]));
    }

    #[test]
    fn overlay_paints_inside_frame_only() {
        let asset = OverlayAsset::new(Frame::from_pixel(10, 10, Rgb([200, 0, 0])), Default::default());
        let mut pipeline = FramePipeline::new(Stage::Overlay {
            asset,
            offsets: PlacementOffsets::new(1.0, 0, 0).unwrap(),
        })
        .with_locator(Box::new(DetectorLocator::new(StaticDetector::new(vec![
            BoundingBox::new(10, 10, 12, 12),
        ]))));
        let frame = Frame::from_pixel(32, 32, Rgb([0, 0, 0]));
        let out = pipeline.run_once(&frame).unwrap();
        assert!(out.selected);
        assert!(out.frame.pixels().any(|p| *p == Rgb([200, 0, 0])));
    }

    #[test]
    fn trail_ticks_carry_centroid() {
        let marker = ColorRangeMask::new(HsvBounds::new([50, 100, 100], [70, 255, 255]));
        let mut pipeline = FramePipeline::new(Stage::Trail {
            marker: Box::new(marker),
            canvas: TrailCanvas::new(40, 40, Rgb([255, 0, 0]), 1),
        });
        let frame_with_marker = |cx: u32, cy: u32| {
            Frame::from_fn(40, 40, move |x, y| {
                if x.abs_diff(cx) <= 1 && y.abs_diff(cy) <= 1 {
                    Rgb([0, 255, 0])
                } else {
                    Rgb([0, 0, 0])
                }
            })
        };
        let mut state = PipelineState::default();
        state.set_mode(TrailMode::Drawing);
        let (_, next) = pipeline.tick(&frame_with_marker(10, 10), state).unwrap();
        let (out, next) = pipeline.tick(&frame_with_marker(20, 10), next).unwrap();
        assert_eq!(next.trail.last_centroid, Some(Point::new(20, 10)));
        assert_eq!(next.ticks, 2);
        let canvas = pipeline.canvas_mut().unwrap().canvas().clone();
        assert_eq!(canvas.get_pixel(15, 10), &Rgb([255, 0, 0]));
        // 30% black frame + 70% red ink
        let shown = out.frame.get_pixel(15, 10);
        assert!((178..=179).contains(&shown[0]) && shown[1] == 0);
    }

    #[test]
    fn resized_frames_drop_cached_detections() {
        let mut pipeline = FramePipeline::new(Stage::Matte {
            strategy: Box::new(IterativeForegroundMask::default()),
        })
        .with_locator(Box::new(ManualRegion::new(Some(BoundingBox::new(2, 2, 20, 20)))));
        let (_, state) = pipeline
            .tick(&Frame::new(32, 32), PipelineState::new(100))
            .unwrap();
        let (out, _) = pipeline.tick(&Frame::new(16, 16), state).unwrap();
        assert_eq!(
            out.detections.regions,
            vec![Region {
                x: 2,
                y: 2,
                width: 14,
                height: 14
            }]
        );
    }
}
