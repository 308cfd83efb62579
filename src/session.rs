//! Live tick loop: capture → pipeline → output, with frame-rate limiting.

use crate::capture::CaptureSource;
use crate::controls::Control;
use crate::error::EngineError;
use crate::output::OutputSink;
use crate::pipeline::{FramePipeline, PipelineState};
use crate::trail::TrailMode;
use anyhow::{Context, Result};
use image::imageops;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

const STATS_EVERY: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Target ticks per second; 0 runs unthrottled.
    pub fps: u32,
    /// Flip each captured frame horizontally before processing.
    pub mirror: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            mirror: false,
        }
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Written { selected: bool },
    /// No frame could be captured; nothing was written.
    Skipped,
}

#[derive(Debug, Default)]
struct TickStats {
    ticks: u64,
    skipped: u64,
    capture: Duration,
    process: Duration,
    output: Duration,
}

impl TickStats {
    fn log(&self) {
        let n = self.ticks as f64;
        let avg = |d: Duration| d.as_secs_f64() * 1000.0 / n;
        let (capture_ms, process_ms, output_ms) =
            (avg(self.capture), avg(self.process), avg(self.output));
        let total_ms = capture_ms + process_ms + output_ms;
        tracing::info!(
            "Tick {}: capture={:.1}ms, process={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}, skipped={}",
            self.ticks,
            capture_ms,
            process_ms,
            output_ms,
            total_ms,
            1000.0 / total_ms,
            self.skipped
        );
    }
}

/// A running session owning its source, sink, pipeline and temporal state.
pub struct Session<C, O> {
    capture: C,
    output: O,
    pipeline: FramePipeline,
    state: PipelineState,
    config: SessionConfig,
    stats: TickStats,
}

impl<C, O> Session<C, O>
where
    C: CaptureSource,
    O: OutputSink,
{
    pub fn new(capture: C, output: O, pipeline: FramePipeline, config: SessionConfig) -> Self {
        Self {
            capture,
            output,
            pipeline,
            state: PipelineState::default(),
            config,
            stats: TickStats::default(),
        }
    }

    pub fn with_state(mut self, state: PipelineState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn pipeline_mut(&mut self) -> &mut FramePipeline {
        &mut self.pipeline
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn set_mode(&mut self, mode: TrailMode) {
        tracing::info!("trail mode {:?}", mode);
        self.state.set_mode(mode);
    }

    pub fn clear_canvas(&mut self) {
        if let Some(canvas) = self.pipeline.canvas_mut() {
            canvas.clear();
        }
    }

    /// Apply a runtime control. Pen changes are ignored without a trail stage.
    pub fn apply(&mut self, control: Control) {
        match control {
            Control::Mode(mode) => self.set_mode(mode),
            Control::Clear => self.clear_canvas(),
            Control::Color(color) => match self.pipeline.canvas_mut() {
                Some(canvas) => canvas.set_color(color),
                None => tracing::warn!("no canvas to recolor"),
            },
            Control::Thickness(thickness) => match self.pipeline.canvas_mut() {
                Some(canvas) => canvas.set_thickness(thickness),
                None => tracing::warn!("no canvas to resize the pen on"),
            },
        }
    }

    /// Drop cached detections and any stroke in progress.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Run one capture → process → output pass.
    ///
    /// A capture failure skips the tick. Processing and output failures are
    /// returned.
    pub fn tick_once(&mut self) -> Result<TickOutcome> {
        let capture_start = Instant::now();
        let mut frame = match self.capture.capture_frame() {
            Ok(frame) => frame,
            Err(e) => {
                let err = EngineError::InputUnavailable(format!("{e:#}"));
                tracing::warn!("skipping tick {}: {}", self.state.ticks, err);
                self.stats.skipped += 1;
                return Ok(TickOutcome::Skipped);
            }
        };
        if self.config.mirror {
            imageops::flip_horizontal_in_place(&mut frame);
        }
        self.stats.capture += capture_start.elapsed();

        let process_start = Instant::now();
        let (out, state) = self
            .pipeline
            .tick(&frame, self.state.clone())
            .context("Failed to process frame")?;
        self.state = state;
        self.stats.process += process_start.elapsed();

        let output_start = Instant::now();
        self.output
            .write_frame(&out.frame)
            .context("Failed to write frame")?;
        self.stats.output += output_start.elapsed();

        self.stats.ticks += 1;
        if self.stats.ticks % STATS_EVERY == 0 {
            self.stats.log();
        }
        Ok(TickOutcome::Written {
            selected: out.selected,
        })
    }

    /// Tick until `max_ticks` attempts have been made, or forever.
    /// Returns the number of frames written.
    pub fn run(&mut self, max_ticks: Option<u64>) -> Result<u64> {
        self.run_loop(max_ticks, None)
    }

    /// Like [`Session::run`], applying every control queued on `controls`
    /// before each tick. A disconnected sender stops delivery, not the loop.
    pub fn run_controlled(
        &mut self,
        max_ticks: Option<u64>,
        controls: &Receiver<Control>,
    ) -> Result<u64> {
        self.run_loop(max_ticks, Some(controls))
    }

    fn drain(&mut self, controls: &Receiver<Control>) -> bool {
        loop {
            match controls.try_recv() {
                Ok(control) => self.apply(control),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn run_loop(
        &mut self,
        max_ticks: Option<u64>,
        mut controls: Option<&Receiver<Control>>,
    ) -> Result<u64> {
        let frame_duration = match self.config.fps {
            0 => Duration::ZERO,
            fps => Duration::from_secs_f32(1.0 / fps as f32),
        };
        tracing::info!("Starting session loop");
        if max_ticks.is_none() {
            tracing::info!("Press Ctrl+C to stop");
        }

        let mut attempts = 0u64;
        let mut written = 0u64;
        while max_ticks.map_or(true, |max| attempts < max) {
            let tick_start = Instant::now();
            if let Some(rx) = controls {
                if !self.drain(rx) {
                    tracing::debug!("control channel closed");
                    controls = None;
                }
            }
            if let TickOutcome::Written { .. } = self.tick_once()? {
                written += 1;
            }
            attempts += 1;

            let elapsed = tick_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::BackgroundSource;
    use crate::frame::Frame;
    use crate::mask::{ColorRangeMask, HsvBounds, ThresholdContourMask};
    use crate::pipeline::Stage;
    use crate::trail::TrailCanvas;
    use anyhow::bail;
    use image::Rgb;
    use std::collections::VecDeque;

    /// Plays back scripted frames; `None` entries fail.
    struct Scripted {
        frames: VecDeque<Option<Frame>>,
    }

    impl CaptureSource for Scripted {
        fn capture_frame(&mut self) -> Result<Frame> {
            match self.frames.pop_front().flatten() {
                Some(frame) => Ok(frame),
                None => bail!("camera unplugged"),
            }
        }

        fn resolution(&self) -> (u32, u32) {
            (16, 16)
        }
    }

    #[derive(Default)]
    struct Collect {
        frames: Vec<Frame>,
    }

    impl OutputSink for Collect {
        fn write_frame(&mut self, frame: &Frame) -> Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn resolution(&self) -> (u32, u32) {
            (16, 16)
        }
    }

    fn unthrottled() -> SessionConfig {
        SessionConfig {
            fps: 0,
            mirror: false,
        }
    }

    fn composite() -> FramePipeline {
        FramePipeline::new(Stage::Composite {
            strategy: Box::new(ThresholdContourMask::new(128)),
            background: BackgroundSource::SolidColor(Rgb([0, 0, 255])),
        })
    }

    fn left_dark() -> Frame {
        Frame::from_fn(16, 16, |x, _| {
            if x < 4 {
                Rgb([10, 10, 10])
            } else {
                Rgb([250, 250, 250])
            }
        })
    }

    #[test]
    fn failed_capture_skips_tick() {
        let capture = Scripted {
            frames: vec![Some(left_dark()), None, Some(left_dark())].into(),
        };
        let mut session = Session::new(capture, Collect::default(), composite(), unthrottled());
        let written = session.run(Some(3)).unwrap();
        assert_eq!(written, 2);
        assert_eq!(session.output().frames.len(), 2);
        assert_eq!(session.state().ticks, 2);
    }

    #[test]
    fn mirror_flips_before_processing() {
        let capture = Scripted {
            frames: vec![Some(left_dark())].into(),
        };
        let config = SessionConfig {
            fps: 0,
            mirror: true,
        };
        let mut session = Session::new(capture, Collect::default(), composite(), config);
        assert_eq!(
            session.tick_once().unwrap(),
            TickOutcome::Written { selected: true }
        );
        let out = &session.output().frames[0];
        assert_eq!(out.get_pixel(15, 0), &Rgb([10, 10, 10]));
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 255]));
    }

    #[test]
    fn mode_change_and_clear_reach_the_canvas() {
        let green_at = |cx: u32| {
            Some(Frame::from_fn(16, 16, move |x, y| {
                if x.abs_diff(cx) <= 1 && y.abs_diff(8) <= 1 {
                    Rgb([0, 255, 0])
                } else {
                    Rgb([0, 0, 0])
                }
            }))
        };
        let capture = Scripted {
            frames: vec![green_at(3), green_at(12)].into(),
        };
        let pipeline = FramePipeline::new(Stage::Trail {
            marker: Box::new(ColorRangeMask::new(HsvBounds::new(
                [50, 100, 100],
                [70, 255, 255],
            ))),
            canvas: TrailCanvas::new(16, 16, Rgb([255, 255, 255]), 1),
        });
        let mut session = Session::new(capture, Collect::default(), pipeline, unthrottled());
        session.set_mode(TrailMode::Drawing);
        session.run(Some(2)).unwrap();
        let canvas = session.pipeline_mut().canvas_mut().unwrap().canvas().clone();
        assert_eq!(canvas.get_pixel(8, 8), &Rgb([255, 255, 255]));

        session.clear_canvas();
        session.reset();
        assert_eq!(session.state().trail.last_centroid, None);
        assert_eq!(session.state().trail.mode, TrailMode::Drawing);
        let canvas = session.pipeline_mut().canvas_mut().unwrap().canvas().clone();
        assert!(canvas.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn queued_controls_apply_before_each_tick() {
        let green_at = |cx: u32| {
            Some(Frame::from_fn(16, 16, move |x, y| {
                if x.abs_diff(cx) <= 1 && y.abs_diff(8) <= 1 {
                    Rgb([0, 255, 0])
                } else {
                    Rgb([0, 0, 0])
                }
            }))
        };
        let capture = Scripted {
            frames: vec![green_at(3), green_at(12), green_at(12)].into(),
        };
        let pipeline = FramePipeline::new(Stage::Trail {
            marker: Box::new(ColorRangeMask::new(HsvBounds::new(
                [50, 100, 100],
                [70, 255, 255],
            ))),
            canvas: TrailCanvas::new(16, 16, Rgb([255, 255, 255]), 1),
        });
        let mut session = Session::new(capture, Collect::default(), pipeline, unthrottled());

        let (tx, rx) = std::sync::mpsc::channel();
        tx.send(Control::Color(Rgb([200, 0, 0]))).unwrap();
        tx.send(Control::Thickness(3)).unwrap();
        tx.send(Control::Mode(TrailMode::Drawing)).unwrap();
        assert_eq!(session.run_controlled(Some(2), &rx).unwrap(), 2);
        let canvas = session.pipeline_mut().canvas_mut().unwrap().canvas().clone();
        assert_eq!(canvas.get_pixel(8, 8), &Rgb([200, 0, 0]));
        // thickness 3 reaches a row off the stroke
        assert_eq!(canvas.get_pixel(8, 9), &Rgb([200, 0, 0]));

        tx.send(Control::Mode(TrailMode::Erasing)).unwrap();
        drop(tx);
        assert_eq!(session.run_controlled(Some(1), &rx).unwrap(), 1);
        assert_eq!(session.state().trail.mode, TrailMode::Erasing);
        let canvas = session.pipeline_mut().canvas_mut().unwrap().canvas().clone();
        assert_eq!(canvas.get_pixel(12, 8), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(6, 8), &Rgb([200, 0, 0]));
    }
}
