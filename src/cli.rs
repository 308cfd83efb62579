//! Command-line surface. Parsing is done by clap; everything that turns
//! parsed values into engine objects validates ranges and reports
//! [`EngineError::Configuration`].

use crate::compositor::BackgroundSource;
use crate::counter::{ObjectCounter, DEFAULT_MIN_AREA};
use crate::error::{EngineError, EngineResult};
use crate::filter::BackgroundFilter;
use crate::flood::Connectivity;
use crate::frame::{self, BoundingBox, Region};
use crate::mask::{
    ColorRangeMask, FloodFillMask, HsvBounds, IterativeForegroundMask, MaskStrategy,
    RegionOfInterest, ThresholdContourMask,
};
use crate::overlay::PlacementOffsets;
use clap::{Args, Parser, Subcommand, ValueEnum};
use image::Rgb;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replace the background of a still image
    Composite(CompositeArgs),
    /// Place an overlay asset above the given face regions
    Hat(HatArgs),
    /// Segment the subject inside a region and count the objects found
    Count(CountArgs),
    /// Process camera frames and write them to a v4l2loopback device
    Live(LiveArgs),
}

#[derive(Args, Debug)]
pub struct CompositeArgs {
    /// Input image
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output image; format follows the extension
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub mask: MaskArgs,

    #[command(flatten)]
    pub background: BackgroundArgs,

    /// Write the mask as a grayscale image instead of compositing
    #[arg(long)]
    pub show_matte: bool,
}

#[derive(Args, Debug)]
pub struct HatArgs {
    /// Input image
    #[arg(short, long)]
    pub input: PathBuf,

    /// Asset image; near-black pixels are treated as transparent
    #[arg(short, long)]
    pub asset: PathBuf,

    /// Output image
    #[arg(short, long)]
    pub output: PathBuf,

    /// Face box as x,y,w,h (repeatable)
    #[arg(long = "face", value_parser = parse_box, required = true)]
    pub faces: Vec<BoundingBox>,

    /// Asset width relative to the face, in tenths
    #[arg(long, default_value_t = 15)]
    pub width_tenths: u32,

    /// Extra pixels above the asset
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub top: i32,

    /// Pixels the asset extends below its anchor
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub bottom: i32,
}

impl HatArgs {
    pub fn offsets(&self) -> EngineResult<PlacementOffsets> {
        PlacementOffsets::from_tenths(self.width_tenths, self.top, self.bottom)
    }
}

#[derive(Args, Debug)]
pub struct CountArgs {
    /// Input image
    #[arg(short, long)]
    pub input: PathBuf,

    /// Rectangle around the objects as x,y,w,h
    #[arg(long, value_parser = parse_box)]
    pub region: BoundingBox,

    /// Segmentation iterations
    #[arg(long, default_value_t = 5)]
    pub iterations: u32,

    /// Working scale for segmentation, in (0, 1]
    #[arg(long, default_value_t = 0.5)]
    pub scale: f32,

    /// Subject pixels must be brighter than this luminance to count
    #[arg(long, default_value_t = 0)]
    pub threshold: u8,

    /// Ignore blobs smaller than this many pixels
    #[arg(long, default_value_t = DEFAULT_MIN_AREA)]
    pub min_area: f64,

    /// Optional path for the segmentation mask
    #[arg(long)]
    pub matte: Option<PathBuf>,

    /// Optional path for the rendered objects, one color per object
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CountArgs {
    pub fn strategy(&self) -> EngineResult<IterativeForegroundMask> {
        IterativeForegroundMask::new(self.iterations)?.with_scale(self.scale)
    }

    pub fn counter(&self) -> EngineResult<ObjectCounter> {
        ObjectCounter::new(self.threshold, self.min_area)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LiveMode {
    /// Background replacement
    Composite,
    /// Draw with a colored marker
    Draw,
    /// Erase the drawing layer with the marker
    Erase,
    /// Grayscale mask only
    Matte,
}

#[derive(Args, Debug)]
pub struct LiveArgs {
    /// Input webcam device index
    #[arg(long, default_value_t = 0)]
    pub input_device: u32,

    /// Replay a still image instead of opening a camera
    #[arg(long)]
    pub input_file: Option<PathBuf>,

    /// Output v4l2loopback device path
    #[arg(long, default_value = "/dev/video10")]
    pub output_device: PathBuf,

    /// Write frames to an image file instead of a loopback device
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Frame width
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Frame height
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Stop after this many ticks
    #[arg(long)]
    pub frames: Option<u64>,

    /// Mirror the camera image
    #[arg(long)]
    pub mirror: bool,

    #[arg(long, value_enum, default_value_t = LiveMode::Composite)]
    pub mode: LiveMode,

    /// Fixed subject region as x,y,w,h
    #[arg(long, value_parser = parse_box)]
    pub subject: Option<BoundingBox>,

    /// Ticks between detection refreshes
    #[arg(long, default_value_t = 10)]
    pub refresh: u32,

    #[command(flatten)]
    pub mask: MaskArgs,

    #[command(flatten)]
    pub background: BackgroundArgs,

    #[command(flatten)]
    pub pen: PenArgs,
}

impl LiveArgs {
    pub fn validate(&self) -> EngineResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::config(format!(
                "frame size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.refresh == 0 {
            return Err(EngineError::config("refresh interval must be at least 1 tick"));
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct PenArgs {
    /// Lower HSV bound of the drawing marker
    #[arg(long, value_parser = parse_triple, default_value = "35,80,80")]
    pub marker_min: [u8; 3],

    /// Upper HSV bound of the drawing marker
    #[arg(long, value_parser = parse_triple, default_value = "85,255,255")]
    pub marker_max: [u8; 3],

    /// Ink color as r,g,b
    #[arg(long, value_parser = parse_rgb, default_value = "255,0,0")]
    pub ink: Rgb<u8>,

    /// Line thickness in pixels
    #[arg(long, default_value_t = 5)]
    pub thickness: u32,
}

impl PenArgs {
    pub fn marker(&self) -> EngineResult<ColorRangeMask> {
        Ok(ColorRangeMask::new(HsvBounds::validated(
            self.marker_min,
            self.marker_max,
        )?))
    }

    pub fn thickness(&self) -> EngineResult<u32> {
        if self.thickness == 0 {
            return Err(EngineError::config("line thickness must be at least 1"));
        }
        Ok(self.thickness)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    /// Inverse threshold, then fill external contours
    Threshold,
    /// Inverse threshold, then flood the background from the corner
    Flood,
    /// Pixels inside an HSV box
    Color,
    /// Iterative graph-cut segmentation seeded by a region
    Grabcut,
}

/// Mask strategy selection shared by every command that extracts a subject.
#[derive(Args, Debug)]
pub struct MaskArgs {
    #[arg(long, value_enum, default_value_t = StrategyKind::Threshold)]
    pub strategy: StrategyKind,

    /// Luminance threshold; pixels at or below it are foreground
    #[arg(long, default_value_t = 128)]
    pub threshold: u8,

    /// Flood fill connectivity (4 or 8)
    #[arg(long, default_value_t = 4)]
    pub connectivity: u8,

    /// Lower HSV bound as h,s,v (hue 0-179)
    #[arg(long, value_parser = parse_triple, default_value = "0,0,0")]
    pub hsv_min: [u8; 3],

    /// Upper HSV bound as h,s,v (hue 0-179)
    #[arg(long, value_parser = parse_triple, default_value = "179,255,255")]
    pub hsv_max: [u8; 3],

    /// Segmentation iterations for grabcut
    #[arg(long, default_value_t = 5)]
    pub iterations: u32,

    /// Working scale for grabcut, in (0, 1]
    #[arg(long, default_value_t = 0.5)]
    pub scale: f32,

    /// Seed rectangle for grabcut as x,y,w,h (repeatable)
    #[arg(long = "region", value_parser = parse_box)]
    pub regions: Vec<BoundingBox>,

    /// Only change the background inside this rectangle (x,y,w,h)
    #[arg(long, value_parser = parse_box)]
    pub roi: Option<BoundingBox>,
}

impl MaskArgs {
    /// Build the configured strategy for frames of the given size.
    pub fn strategy(&self, frame_width: u32, frame_height: u32) -> EngineResult<Box<dyn MaskStrategy>> {
        let strategy: Box<dyn MaskStrategy> = match self.strategy {
            StrategyKind::Threshold => Box::new(ThresholdContourMask::new(self.threshold)),
            StrategyKind::Flood => {
                Box::new(FloodFillMask::new(self.threshold, self.connectivity()?))
            }
            StrategyKind::Color => Box::new(ColorRangeMask::new(HsvBounds::validated(
                self.hsv_min,
                self.hsv_max,
            )?)),
            StrategyKind::Grabcut => Box::new(
                IterativeForegroundMask::new(self.iterations)?.with_scale(self.scale)?,
            ),
        };
        let Some(roi) = &self.roi else {
            return Ok(strategy);
        };
        let region = Region::from_box(roi, frame_width, frame_height);
        if region.is_empty() {
            return Err(EngineError::config(format!(
                "region of interest {roi:?} lies outside the {frame_width}x{frame_height} frame"
            )));
        }
        Ok(Box::new(RegionOfInterest::new(strategy, region)))
    }

    pub fn connectivity(&self) -> EngineResult<Connectivity> {
        match self.connectivity {
            4 => Ok(Connectivity::Four),
            8 => Ok(Connectivity::Eight),
            other => Err(EngineError::config(format!(
                "connectivity must be 4 or 8, got {other}"
            ))),
        }
    }
}

/// At most one background source may be chosen.
#[derive(Args, Debug)]
#[group(id = "background_source", multiple = false)]
pub struct BackgroundArgs {
    /// Replacement background image, stretched to the frame
    #[arg(long)]
    pub background_image: Option<PathBuf>,

    /// Solid background color as r,g,b
    #[arg(long, value_parser = parse_rgb)]
    pub background_color: Option<Rgb<u8>>,

    /// Gaussian blur of the frame itself, by sigma
    #[arg(long)]
    pub blur: Option<f32>,

    /// Box filter of the frame itself, by kernel size
    #[arg(long = "box")]
    pub box_size: Option<u32>,

    /// Sepia-toned copy of the frame
    #[arg(long)]
    pub sepia: bool,

    /// Color-inverted copy of the frame
    #[arg(long)]
    pub invert: bool,
}

impl BackgroundArgs {
    /// The chosen source; black when none was given.
    pub fn source(&self) -> anyhow::Result<BackgroundSource> {
        if let Some(path) = &self.background_image {
            return Ok(BackgroundSource::Image(frame::load(path)?));
        }
        Ok(self.derived()?)
    }

    fn derived(&self) -> EngineResult<BackgroundSource> {
        Ok(match (self.background_color, self.blur, self.box_size) {
            (Some(color), _, _) => BackgroundSource::SolidColor(color),
            (_, Some(sigma), _) => {
                BackgroundSource::Filter(BackgroundFilter::gaussian_blur(sigma)?)
            }
            (_, _, Some(size)) => BackgroundSource::Filter(BackgroundFilter::box_filter(size)?),
            _ if self.sepia => BackgroundSource::Filter(BackgroundFilter::Sepia),
            _ if self.invert => BackgroundSource::Filter(BackgroundFilter::Invert),
            _ => BackgroundSource::SolidColor(Rgb([0, 0, 0])),
        })
    }
}

fn parse_numbers<T: std::str::FromStr, const N: usize>(s: &str) -> Result<[T; N], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("expected {N} comma-separated values, got '{s}'"));
    }
    let mut values = Vec::with_capacity(N);
    for part in parts {
        values.push(
            part.parse::<T>()
                .map_err(|_| format!("'{part}' is not a valid number"))?,
        );
    }
    values
        .try_into()
        .map_err(|_| format!("expected {N} values"))
}

/// `x,y,w,h`
pub fn parse_box(s: &str) -> Result<BoundingBox, String> {
    let [x, y, w, h] = parse_numbers::<i32, 4>(s)?;
    if w <= 0 || h <= 0 {
        return Err(format!("width and height must be positive in '{s}'"));
    }
    Ok(BoundingBox::new(x, y, w, h))
}

/// `r,g,b`
pub fn parse_rgb(s: &str) -> Result<Rgb<u8>, String> {
    parse_numbers::<u8, 3>(s).map(Rgb)
}

pub fn parse_triple(s: &str) -> Result<[u8; 3], String> {
    parse_numbers::<u8, 3>(s)
}
