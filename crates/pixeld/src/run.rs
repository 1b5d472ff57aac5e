use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use pixelconfig::PipelineConfig;
use pixeltransform::{
    Extent, FrameStats, HeadlessKernel, InputSurface, NativeWindow, PixelTransform,
    SharedImageReader, SurfaceError, VsyncClock,
};
use tracing_subscriber::EnvFilter;

use crate::bindings;
use crate::cli::RunArgs;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("failed to load pipeline config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

pub fn apply_overrides(config: &mut PipelineConfig, args: &RunArgs) {
    if let Some((width, height)) = args.size {
        config.output.width = width;
        config.output.height = height;
    }
    if let Some((width, height)) = args.input_size {
        config.input.width = width;
        config.input.height = height;
    }
    if let Some(fps) = args.input_fps {
        config.input.fps = fps;
    }
    if let Some(frame_rate) = args.frame_rate {
        config.render.frame_rate = frame_rate;
    }
    if let Some(refresh_rate) = args.refresh_rate {
        config.clock.refresh_rate = refresh_rate;
    }
    if let Some(gravity) = args.gravity {
        config.render.gravity = gravity;
    }
    if let Some(orientation) = args.orientation {
        config.render.orientation = orientation;
    }
    if let Some(rotation) = args.device_orientation {
        config.output.device_orientation = rotation;
    }
    if args.synchronize_orientation {
        config.output.synchronize_orientation = true;
    }
    if let Some(filter) = args.filter {
        config.render.filter = filter;
    }
    if let Some(duration) = args.duration {
        config.clock.run_for = Some(duration);
    }
}

/// Builds a pipeline on a headless kernel with the output surface bound.
pub fn build_pipeline(config: &PipelineConfig) -> Result<(PixelTransform, Arc<HeadlessKernel>)> {
    let kernel = Arc::new(HeadlessKernel::with_image_count(
        config.output.swapchain_images,
    ));
    let transform = PixelTransform::new(
        kernel.clone(),
        Arc::new(SharedImageReader::new()),
        Arc::new(VsyncClock::new(config.clock.refresh_rate)),
    );

    transform.set_image_extent(Extent::new(config.output.width, config.output.height));
    transform.set_device_orientation(bindings::surface_rotation(config.output.device_orientation));
    transform.set_expected_orientation_synchronize(config.output.synchronize_orientation);
    transform.set_video_gravity(bindings::video_gravity(config.render.gravity));
    transform.set_image_orientation(bindings::image_orientation(config.render.orientation));
    transform.set_resample_filter(bindings::resample_filter(config.render.filter));
    transform.set_frame_rate(config.render.frame_rate);
    transform
        .set_native_window(Some(NativeWindow::offscreen(1)))
        .context("failed to bind output surface")?;
    Ok((transform, kernel))
}

pub fn run(args: RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config
        .validate()
        .context("invalid pipeline configuration")?;

    tracing::info!(
        output = %format!("{}x{}", config.output.width, config.output.height),
        input = %format!("{}x{}", config.input.width, config.input.height),
        gravity = %config.render.gravity,
        refresh_rate = config.clock.refresh_rate,
        run_for = ?config.clock.run_for,
        "starting pixel transform pipeline"
    );

    let (transform, kernel) = build_pipeline(&config)?;
    let surface = transform
        .create_input_surface(
            Extent::new(config.input.width, config.input.height),
            bindings::pixel_format(config.input.format),
        )
        .context("failed to configure image reader")?;
    let producer = Producer::spawn(surface, config.input.fps)?;

    let outcome = supervise(&transform, config.clock.run_for);
    let stopped = transform
        .stop_running()
        .context("failed to stop render thread");
    let produced = producer.finish();

    let stats = transform.stats();
    println!("{}", format_stats(&stats, produced, kernel.presented_total()));
    tracing::info!(drawn = stats.drawn, produced, "pipeline stopped");
    outcome.and(stopped)
}

/// Waits for `run_for` (or forever) while watching for a render failure.
fn supervise(transform: &PixelTransform, run_for: Option<Duration>) -> Result<()> {
    let deadline = run_for.map(|duration| Instant::now() + duration);
    loop {
        if !transform.is_running() {
            if let Some(failure) = transform.take_failure() {
                return Err(failure).context("render loop failed");
            }
            bail!("render thread exited unexpectedly");
        }
        let now = Instant::now();
        match deadline {
            Some(deadline) if now >= deadline => return Ok(()),
            Some(deadline) => thread::sleep(POLL_INTERVAL.min(deadline - now)),
            None => thread::sleep(POLL_INTERVAL),
        }
    }
}

pub fn format_stats(stats: &FrameStats, produced: u64, presented: u64) -> String {
    format!(
        "frames: produced={produced} ticks={} drawn={} presented={presented} throttled={} skipped_unavailable={} skipped_no_buffer={} skipped_no_image={} aborted={}",
        stats.ticks,
        stats.drawn,
        stats.throttled,
        stats.skipped_unavailable,
        stats.skipped_no_buffer,
        stats.skipped_no_image,
        stats.aborted,
    )
}

/// Synthetic producer writing flat frames into the input surface.
struct Producer {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<u64>,
}

impl Producer {
    fn spawn(surface: InputSurface, fps: f32) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let interval = Duration::try_from_secs_f32(1.0 / fps)
            .with_context(|| format!("input fps {fps} has no usable frame interval"))?;
        let handle = thread::Builder::new()
            .name("pixeld-producer".into())
            .spawn(move || produce(&surface, interval, &flag))
            .context("failed to spawn producer thread")?;
        Ok(Self { stop, handle })
    }

    /// Stops the producer and returns how many frames it queued.
    fn finish(self) -> u64 {
        self.stop.store(true, Ordering::Release);
        self.handle.join().unwrap_or_else(|_| {
            tracing::warn!("producer thread panicked");
            0
        })
    }
}

fn produce(surface: &InputSurface, interval: Duration, stop: &AtomicBool) -> u64 {
    let started = Instant::now();
    let len = surface.format().frame_len(surface.extent());
    let mut written = 0_u64;
    while !stop.load(Ordering::Acquire) {
        let timestamp = started.elapsed().as_nanos() as i64;
        match surface.queue(timestamp, vec![(written % 251) as u8; len]) {
            Ok(_) => written += 1,
            Err(SurfaceError::Abandoned) => {
                tracing::debug!("input surface abandoned, producer exiting");
                break;
            }
            Err(err) => {
                tracing::warn!(error = %err, "producer frame rejected");
                break;
            }
        }
        thread::sleep(interval);
    }
    written
}
