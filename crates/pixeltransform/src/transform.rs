use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use tracing::{debug, error, trace, warn};

use crate::clock::{FrameClock, FrameTick};
use crate::error::{FrameError, ReaderError, TransformError};
use crate::fps::FpsController;
use crate::kernel::{DrawOutcome, Kernel};
use crate::loader::DynamicLoader;
use crate::lock;
use crate::reader::{ImageReader, InputSurface};
use crate::stats::{FrameStats, StatsCounters};
use crate::texture::Texture;
use crate::types::{
    AssetManager, Extent, ImageOrientation, NativeWindow, PixelFormat, ResampleFilter,
    SurfaceRotation, VideoGravity,
};

const RENDER_THREAD_NAME: &str = "pixel-transform";

/// Drives frames from an [`ImageReader`] onto a [`Kernel`] surface, paced by
/// a [`FrameClock`].
///
/// The pipeline is either idle or running. Running means exactly one render
/// thread is waiting on the frame clock; it is started automatically once
/// both an input (see [`PixelTransform::set_image_reader`]) and a surface (see
/// [`PixelTransform::set_native_window`]) exist, and stopped when the surface
/// goes away. Setters may be called from any thread at any time and take
/// effect on the next frame.
///
/// Dropping the pipeline stops the render thread, then releases the texture,
/// the image reader and the kernel, in that order.
pub struct PixelTransform {
    lifecycle: Mutex<Option<RenderThread>>,
    shared: Arc<FrameState>,
    clock: Arc<dyn FrameClock>,
    reader: Arc<dyn ImageReader>,
    kernel: Arc<dyn Kernel>,
}

struct RenderThread {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// State the render thread shares with the owning pipeline.
#[derive(Default)]
struct FrameState {
    running: AtomicBool,
    settings: Mutex<Settings>,
    fps: Mutex<FpsController>,
    textures: Mutex<TextureSlot>,
    failure: Mutex<Option<FrameError>>,
    stats: StatsCounters,
}

/// The single active texture.
///
/// The render thread checks the texture out for the length of a draw, so
/// replacing it never waits on the kernel. A texture checked in after its
/// slot was replaced is handed back for release.
#[derive(Default)]
struct TextureSlot {
    generation: u64,
    active: Option<Texture>,
}

impl TextureSlot {
    fn is_configured(&self) -> bool {
        self.generation > 0
    }

    fn replace(&mut self, texture: Texture) -> Option<Texture> {
        self.generation += 1;
        self.active.replace(texture)
    }

    fn check_out(&mut self) -> Option<(u64, Texture)> {
        self.active.take().map(|texture| (self.generation, texture))
    }

    fn check_in(&mut self, generation: u64, texture: Texture) -> Option<Texture> {
        if generation == self.generation && self.active.is_none() {
            self.active = Some(texture);
            None
        } else {
            Some(texture)
        }
    }

    fn take(&mut self) -> Option<Texture> {
        self.active.take()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Settings {
    gravity: VideoGravity,
    orientation: ImageOrientation,
    filter: ResampleFilter,
}

impl Settings {
    fn apply(&self, texture: &mut Texture) {
        texture.set_video_gravity(self.gravity);
        texture.set_image_orientation(self.orientation);
        texture.set_resample_filter(self.filter);
    }
}

impl PixelTransform {
    pub fn new(
        kernel: Arc<dyn Kernel>,
        reader: Arc<dyn ImageReader>,
        clock: Arc<dyn FrameClock>,
    ) -> Self {
        Self {
            lifecycle: Mutex::new(None),
            shared: Arc::new(FrameState::default()),
            clock,
            reader,
            kernel,
        }
    }

    /// Spawns the render thread. Does nothing when it is already running.
    pub fn start_running(&self) -> Result<(), TransformError> {
        let mut lifecycle = lock(&self.lifecycle);
        self.start_locked(&mut lifecycle)
    }

    /// Signals the render thread and waits for it to exit. Does nothing when
    /// the pipeline is idle.
    pub fn stop_running(&self) -> Result<(), TransformError> {
        let mut lifecycle = lock(&self.lifecycle);
        self.stop_locked(&mut lifecycle)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Replaces the active texture with one for `extent` and `format` and
    /// re-provisions the image reader. Starts rendering when a surface is
    /// already bound.
    pub fn set_image_reader(&self, extent: Extent, format: PixelFormat) -> Result<(), TransformError> {
        let mut lifecycle = lock(&self.lifecycle);
        self.reader.set_up(extent, format)?;

        let mut texture = Texture::new(extent, format);
        lock(&self.shared.settings).apply(&mut texture);
        let stale = lock(&self.shared.textures).replace(texture);
        if let Some(mut stale) = stale {
            stale.release(self.kernel.as_ref());
        }
        debug!(?format, "image reader configured at {extent}");

        if self.kernel.has_surface() {
            self.start_locked(&mut lifecycle)?;
        }
        Ok(())
    }

    /// Configures the image reader and returns the surface producers write
    /// frames into.
    pub fn create_input_surface(
        &self,
        extent: Extent,
        format: PixelFormat,
    ) -> Result<InputSurface, TransformError> {
        self.set_image_reader(extent, format)?;
        self.reader
            .window()
            .ok_or_else(|| ReaderError::Allocation("reader exposed no input surface".into()).into())
    }

    /// Binds or clears the presentation surface.
    ///
    /// Clearing always leaves the pipeline idle. Binding starts rendering when
    /// an input is already configured.
    pub fn set_native_window(&self, window: Option<NativeWindow>) -> Result<(), TransformError> {
        let mut lifecycle = lock(&self.lifecycle);
        match window {
            None => {
                let stopped = self.stop_locked(&mut lifecycle);
                self.kernel.set_native_window(None);
                debug!("native window cleared");
                stopped
            }
            Some(window) => {
                self.kernel.set_native_window(Some(window));
                debug!("native window bound");
                if !lock(&self.shared.textures).is_configured() {
                    return Ok(());
                }
                self.start_locked(&mut lifecycle)
            }
        }
    }

    pub fn set_video_gravity(&self, gravity: VideoGravity) {
        lock(&self.shared.settings).gravity = gravity;
    }

    pub fn video_gravity(&self) -> VideoGravity {
        lock(&self.shared.settings).gravity
    }

    pub fn set_image_orientation(&self, orientation: ImageOrientation) {
        lock(&self.shared.settings).orientation = orientation;
    }

    pub fn image_orientation(&self) -> ImageOrientation {
        lock(&self.shared.settings).orientation
    }

    pub fn set_resample_filter(&self, filter: ResampleFilter) {
        lock(&self.shared.settings).filter = filter;
    }

    pub fn resample_filter(&self) -> ResampleFilter {
        lock(&self.shared.settings).filter
    }

    /// Caps drawing at `frame_rate` frames per second; `0` draws on every tick.
    pub fn set_frame_rate(&self, frame_rate: u32) {
        lock(&self.shared.fps).set_frame_rate(frame_rate);
    }

    pub fn frame_rate(&self) -> u32 {
        lock(&self.shared.fps).frame_rate()
    }

    pub fn set_image_extent(&self, extent: Extent) {
        self.kernel.set_image_extent(extent);
    }

    pub fn set_device_orientation(&self, rotation: SurfaceRotation) {
        self.kernel.set_device_orientation(rotation);
    }

    pub fn set_asset_manager(&self, assets: AssetManager) {
        self.kernel.set_asset_manager(assets);
    }

    pub fn set_expected_orientation_synchronize(&self, synchronize: bool) {
        self.kernel.set_expected_orientation_synchronize(synchronize);
    }

    pub fn inspect_devices(&self) -> String {
        self.kernel.inspect_devices()
    }

    pub fn has_features(&self) -> bool {
        self.kernel.has_features()
    }

    /// True when the graphics runtime loads and the kernel has every feature
    /// the pipeline needs.
    pub fn is_supported(&self, loader: &dyn DynamicLoader) -> bool {
        loader.load() && self.kernel.has_features()
    }

    pub fn stats(&self) -> FrameStats {
        self.shared.stats.snapshot()
    }

    /// Returns the error that ended the render loop, once.
    pub fn take_failure(&self) -> Option<TransformError> {
        lock(&self.shared.failure).take().map(TransformError::Render)
    }

    /// Stops rendering and releases every owned component.
    pub fn dispose(self) {
        drop(self);
    }

    fn start_locked(&self, lifecycle: &mut Option<RenderThread>) -> Result<(), TransformError> {
        if lifecycle.is_some() && self.is_running() {
            return Ok(());
        }
        // A thread that ended on a fatal error still needs joining.
        if let Some(finished) = lifecycle.take() {
            drop(finished.stop);
            if finished.handle.join().is_err() {
                warn!("reaped render thread had panicked");
            }
        }

        let (stop_tx, stop_rx) = bounded(1);
        let context = RenderContext {
            shared: Arc::clone(&self.shared),
            kernel: Arc::clone(&self.kernel),
            reader: Arc::clone(&self.reader),
            clock: Arc::clone(&self.clock),
        };
        self.shared.running.store(true, Ordering::Release);
        let handle = thread::Builder::new()
            .name(RENDER_THREAD_NAME.into())
            .spawn(move || context.run(stop_rx))
            .map_err(|err| {
                self.shared.running.store(false, Ordering::Release);
                error!(error = %err, "failed to spawn render thread");
                TransformError::Spawn(err)
            })?;
        self.shared.stats.render_threads_spawned.bump();
        *lifecycle = Some(RenderThread {
            stop: stop_tx,
            handle,
        });
        debug!("render thread started");
        Ok(())
    }

    fn stop_locked(&self, lifecycle: &mut Option<RenderThread>) -> Result<(), TransformError> {
        let Some(thread) = lifecycle.take() else {
            return Ok(());
        };
        drop(thread.stop);
        let joined = thread.handle.join();
        self.shared.running.store(false, Ordering::Release);
        debug!("render thread stopped");
        joined.map_err(|_| TransformError::RenderThreadPanicked)
    }
}

impl Drop for PixelTransform {
    fn drop(&mut self) {
        let mut lifecycle = lock(&self.lifecycle);
        if let Err(err) = self.stop_locked(&mut lifecycle) {
            warn!(error = %err, "render thread did not stop cleanly");
        }
        drop(lifecycle);
        let active = lock(&self.shared.textures).take();
        if let Some(mut texture) = active {
            texture.release(self.kernel.as_ref());
        }
    }
}

/// Everything the render thread owns a handle to.
struct RenderContext {
    shared: Arc<FrameState>,
    kernel: Arc<dyn Kernel>,
    reader: Arc<dyn ImageReader>,
    clock: Arc<dyn FrameClock>,
}

impl RenderContext {
    fn run(self, stop: Receiver<()>) {
        trace!("render loop entered");
        loop {
            if !matches!(stop.try_recv(), Err(TryRecvError::Empty)) {
                break;
            }
            let Some(tick) = self.clock.next_frame(&stop) else {
                break;
            };
            if let Err(err) = self.on_frame(tick) {
                error!(error = %err, "fatal frame error, leaving render loop");
                *lock(&self.shared.failure) = Some(err);
                break;
            }
        }
        self.shared.running.store(false, Ordering::Release);
        trace!("render loop exited");
    }

    fn on_frame(&self, tick: FrameTick) -> Result<(), FrameError> {
        let stats = &self.shared.stats;
        stats.ticks.bump();
        if !lock(&self.shared.fps).advanced(tick.timestamp_nanos) {
            stats.throttled.bump();
            return Ok(());
        }

        let buffer = self.reader.latest_buffer();
        if !self.kernel.is_available() {
            stats.skipped_unavailable.bump();
            trace!("kernel unavailable, skipping frame");
            return Ok(());
        }
        let Some(buffer) = buffer else {
            stats.skipped_no_buffer.bump();
            trace!("no new buffer, skipping frame");
            return Ok(());
        };

        let settings = *lock(&self.shared.settings);
        let checked_out = lock(&self.shared.textures).check_out();
        let Some((generation, mut texture)) = checked_out else {
            stats.skipped_unavailable.bump();
            trace!("no texture configured, skipping frame");
            return Ok(());
        };
        settings.apply(&mut texture);

        let kernel = self.kernel.as_ref();
        let outcome = texture.set_up(kernel, &buffer).and_then(|()| {
            kernel.draw_frame(&mut |image_index| {
                texture.update_at(kernel, image_index, &buffer)?;
                texture.layout_at(kernel, image_index)
            })
        });
        let replaced = lock(&self.shared.textures).check_in(generation, texture);
        if let Some(mut stale) = replaced {
            trace!("texture replaced during draw, releasing");
            stale.release(kernel);
        }
        match outcome {
            Ok(DrawOutcome::Presented { image_index }) => {
                stats.drawn.bump();
                trace!(image_index, buffer = buffer.id(), "frame presented");
            }
            Ok(DrawOutcome::Skipped) => {
                stats.skipped_no_image.bump();
                trace!("no swapchain image presented");
            }
            Err(err) if err.is_fatal() => {
                stats.aborted.bump();
                return Err(err);
            }
            Err(err) => {
                stats.aborted.bump();
                debug!(error = %err, "frame aborted");
            }
        }
        Ok(())
    }
}
