use anyhow::{Context, Result};
use clap::Parser;
use cutout::capture::{CaptureSource, StillImage};
use cutout::cli::{Cli, Command, CompositeArgs, CountArgs, HatArgs, LiveArgs, LiveMode};
use cutout::controls::Control;
use cutout::frame::{self, Region};
use cutout::mask::MaskStrategy;
use cutout::output::{FileOutput, OutputSink, V4L2Output};
use cutout::overlay::OverlayAsset;
use cutout::pipeline::{FramePipeline, PipelineState, Stage};
use cutout::region::{DetectorLocator, StaticDetector};
use cutout::session::{Session, SessionConfig};
use cutout::trail::{TrailCanvas, TrailMode};
use cutout::ChannelOrder;
use std::io::BufRead;
use std::sync::mpsc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Command::Composite(args) => composite(args),
        Command::Hat(args) => hat(args),
        Command::Count(args) => count(args),
        Command::Live(args) => live(args),
    }
}

fn composite(args: CompositeArgs) -> Result<()> {
    let input = StillImage::open(&args.input)?;
    let (width, height) = input.resolution();
    tracing::info!("Input: {}x{}", width, height);

    let strategy = args.mask.strategy(width, height)?;
    tracing::info!("Mask strategy: {}", strategy.name());
    let stage = if args.show_matte {
        Stage::Matte { strategy }
    } else {
        Stage::Composite {
            strategy,
            background: args.background.source()?,
        }
    };
    let mut pipeline = FramePipeline::new(stage);
    if !args.mask.regions.is_empty() {
        pipeline = pipeline.with_locator(Box::new(DetectorLocator::new(StaticDetector::new(
            args.mask.regions.clone(),
        ))));
    }

    let out = pipeline.run_once(input.frame())?;
    if !out.selected {
        tracing::warn!("No subject found; output is background only");
    }
    frame::save(&out.frame, &args.output)?;
    tracing::info!("Wrote {}", args.output.display());
    Ok(())
}

fn hat(args: HatArgs) -> Result<()> {
    let input = StillImage::open(&args.input)?;
    let offsets = args.offsets()?;
    let asset_image = frame::load(&args.asset).context("Failed to load overlay asset")?;
    let asset = OverlayAsset::new(asset_image, ChannelOrder::Rgb);

    let mut pipeline = FramePipeline::new(Stage::Overlay { asset, offsets }).with_locator(
        Box::new(DetectorLocator::new(StaticDetector::new(args.faces.clone()))),
    );
    let out = pipeline.run_once(input.frame())?;
    tracing::info!(
        "{} face region(s), asset placed: {}",
        out.detections.len(),
        out.selected
    );
    frame::save(&out.frame, &args.output)?;
    Ok(())
}

fn count(args: CountArgs) -> Result<()> {
    let input = StillImage::open(&args.input)?;
    let counter = args.counter()?;
    let strategy = args.strategy()?;
    let (width, height) = input.resolution();

    let region = Region::from_box(&args.region, width, height);
    let mask = if region.is_empty() {
        tracing::warn!("Region {:?} lies outside the image", args.region);
        cutout::Mask::empty(width, height)
    } else {
        strategy.extract(input.frame(), &[region])
    };
    if let Some(path) = &args.matte {
        frame::save(&mask.to_frame(), path)?;
    }

    let result = counter.count(input.frame(), &mask)?;
    println!("{} object(s)", result.len());
    for (i, object) in result.objects.iter().enumerate() {
        let bounds = object.bounds;
        match object.centroid {
            Some(c) => println!(
                "#{}: area={:.0} centroid=({}, {}) bounds={},{},{},{}",
                i + 1,
                object.area,
                c.x,
                c.y,
                bounds.x,
                bounds.y,
                bounds.width,
                bounds.height
            ),
            None => println!("#{}: area={:.0}", i + 1, object.area),
        }
    }
    if let Some(path) = &args.output {
        frame::save(&result.render(), path)?;
        tracing::info!("Wrote {}", path.display());
    }
    Ok(())
}

fn live(args: LiveArgs) -> Result<()> {
    args.validate()?;
    tracing::info!("Frames: {}x{}", args.width, args.height);
    tracing::info!("Target FPS: {}", args.fps);

    let capture: Box<dyn CaptureSource> = match &args.input_file {
        Some(path) => Box::new(StillImage::open(path)?),
        None => open_camera(&args)?,
    };
    let output: Box<dyn OutputSink> = match &args.output_file {
        Some(path) => Box::new(FileOutput::new(path)),
        None => Box::new(
            V4L2Output::new(&args.output_device, args.width, args.height)
                .context("Failed to initialize v4l2loopback output")?,
        ),
    };

    let (width, height) = capture.resolution();
    let stage = match args.mode {
        LiveMode::Composite => Stage::Composite {
            strategy: args.mask.strategy(width, height)?,
            background: args.background.source()?,
        },
        LiveMode::Matte => Stage::Matte {
            strategy: args.mask.strategy(width, height)?,
        },
        LiveMode::Draw | LiveMode::Erase => Stage::Trail {
            marker: Box::new(args.pen.marker()?),
            canvas: TrailCanvas::new(width, height, args.pen.ink, args.pen.thickness()?),
        },
    };
    let mut pipeline = FramePipeline::new(stage);
    let mut boxes = args.mask.regions.clone();
    boxes.extend(args.subject);
    if !boxes.is_empty() {
        pipeline = pipeline.with_locator(Box::new(DetectorLocator::new(StaticDetector::new(boxes))));
    }

    let config = SessionConfig {
        fps: args.fps,
        mirror: args.mirror,
    };
    let mut session = Session::new(capture, output, pipeline, config)
        .with_state(PipelineState::new(args.refresh));
    match args.mode {
        LiveMode::Draw => session.set_mode(TrailMode::Drawing),
        LiveMode::Erase => session.set_mode(TrailMode::Erasing),
        LiveMode::Composite | LiveMode::Matte => {}
    }

    let controls = spawn_control_reader();
    tracing::info!("Controls on stdin: draw, erase, idle, clear, color r,g,b, thickness n");
    let written = session.run_controlled(args.frames, &controls)?;
    tracing::info!("Session finished after {} frame(s)", written);
    Ok(())
}

/// Read controls from stdin, one per line, until EOF.
fn spawn_control_reader() -> mpsc::Receiver<Control> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Control>() {
                Ok(control) => {
                    if tx.send(control).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }
    });
    rx
}

#[cfg(feature = "webcam")]
fn open_camera(args: &LiveArgs) -> Result<Box<dyn CaptureSource>> {
    let camera = cutout::capture::WebcamCapture::new(args.input_device, args.width, args.height)
        .context("Failed to initialize webcam capture")?;
    Ok(Box::new(camera))
}

#[cfg(not(feature = "webcam"))]
fn open_camera(args: &LiveArgs) -> Result<Box<dyn CaptureSource>> {
    Err(cutout::EngineError::DeviceOpen(format!(
        "camera {} requested but built without the `webcam` feature; use --input-file",
        args.input_device
    ))
    .into())
}
