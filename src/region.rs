use crate::frame::{BoundingBox, Frame, Region};
use anyhow::Result;

/// Regions found in one frame, in detector order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    pub regions: Vec<Region>,
    /// Parallel to `regions` when the detector reports scores.
    pub confidences: Vec<Option<f32>>,
}

impl DetectionResult {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Clamp raw boxes to the frame and drop those left with no area.
    pub fn from_boxes(boxes: &[BoundingBox], frame_width: u32, frame_height: u32) -> Self {
        let mut result = DetectionResult::default();
        for bbox in boxes {
            let region = Region::from_box(bbox, frame_width, frame_height);
            if region.is_empty() {
                continue;
            }
            result.regions.push(region);
            result.confidences.push(bbox.confidence);
        }
        result
    }
}

/// External box detector (faces, objects). May be slow; must not mutate the frame.
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>>;
}

/// Source of regions for a frame.
pub trait RegionLocator {
    fn locate(&mut self, frame: &Frame) -> Result<DetectionResult>;
}

/// Locator backed by a [`Detector`]; boxes are clamped to the frame.
pub struct DetectorLocator<D> {
    detector: D,
}

impl<D: Detector> DetectorLocator<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }
}

impl<D: Detector> RegionLocator for DetectorLocator<D> {
    fn locate(&mut self, frame: &Frame) -> Result<DetectionResult> {
        let boxes = self.detector.detect(frame)?;
        let (w, h) = frame.dimensions();
        let result = DetectionResult::from_boxes(&boxes, w, h);
        tracing::debug!("detector returned {} boxes, {} usable", boxes.len(), result.len());
        Ok(result)
    }
}

/// A rectangle drawn by the user: zero or one region.
#[derive(Debug, Clone, Default)]
pub struct ManualRegion {
    rect: Option<BoundingBox>,
}

impl ManualRegion {
    pub fn new(rect: Option<BoundingBox>) -> Self {
        Self { rect }
    }

    pub fn set(&mut self, rect: BoundingBox) {
        self.rect = Some(rect);
    }

    pub fn clear(&mut self) {
        self.rect = None;
    }
}

impl RegionLocator for ManualRegion {
    fn locate(&mut self, frame: &Frame) -> Result<DetectionResult> {
        let (w, h) = frame.dimensions();
        Ok(match &self.rect {
            Some(rect) => DetectionResult::from_boxes(std::slice::from_ref(rect), w, h),
            None => DetectionResult::default(),
        })
    }
}

/// Fixed boxes reported for every frame, e.g. supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticDetector {
    boxes: Vec<BoundingBox>,
}

impl StaticDetector {
    pub fn new(boxes: Vec<BoundingBox>) -> Self {
        Self { boxes }
    }
}

impl Detector for StaticDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<BoundingBox>> {
        Ok(self.boxes.clone())
    }
}

/// Detection memo refreshed on a fixed tick schedule.
///
/// The locator runs on the first tick and then whenever `refresh_every`
/// ticks have passed since the last run. Ticks in between reuse the cached
/// result. An empty cached result is never reused: while nothing is found
/// the locator runs every tick. [`DetectionCache::invalidate`] forces a
/// refresh on the next tick.
#[derive(Debug, Clone)]
pub struct DetectionCache {
    cached: Option<DetectionResult>,
    ticks_since_refresh: u32,
    refresh_every: u32,
}

impl DetectionCache {
    pub fn new(refresh_every: u32) -> Self {
        Self {
            cached: None,
            ticks_since_refresh: 0,
            refresh_every: refresh_every.max(1),
        }
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
        self.ticks_since_refresh = 0;
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    pub fn ticks_since_refresh(&self) -> u32 {
        self.ticks_since_refresh
    }

    /// Detections for this tick, running `locator` only when due.
    pub fn get_or_refresh(
        &mut self,
        frame: &Frame,
        locator: &mut dyn RegionLocator,
    ) -> Result<DetectionResult> {
        if let Some(cached) = self.cached.as_ref().filter(|c| !c.is_empty()) {
            self.ticks_since_refresh += 1;
            if self.ticks_since_refresh < self.refresh_every {
                return Ok(cached.clone());
            }
        }
        let fresh = locator.locate(frame)?;
        self.cached = Some(fresh.clone());
        self.ticks_since_refresh = 0;
        Ok(fresh)
    }
}
