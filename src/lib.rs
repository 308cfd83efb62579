//! Segmentation and compositing engine.
//!
//! Frames flow through a [`pipeline::FramePipeline`]: regions are located
//! (optionally through a decimated [`region::DetectionCache`]), a
//! [`mask::MaskStrategy`] separates subject from background, and the result
//! is composited, overlaid or drawn on. [`session::Session`] drives the
//! pipeline from a [`capture::CaptureSource`] to an [`output::OutputSink`].

pub mod capture;
pub mod cli;
pub mod color;
pub mod compositor;
pub mod contour;
pub mod controls;
pub mod counter;
pub mod error;
pub mod filter;
pub mod flood;
pub mod frame;
pub mod mask;
pub mod output;
pub mod overlay;
pub mod pipeline;
pub mod region;
pub mod session;
pub mod trail;

pub use error::{EngineError, EngineResult};
pub use frame::{BoundingBox, ChannelOrder, Frame, Mask, Point, Region};
