use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::{debug, trace, warn};

use super::{DrawOutcome, ImportedImage, Kernel, SwapchainInfo};
use crate::error::FrameError;
use crate::layout::QuadLayout;
use crate::lock;
use crate::types::{
    AllocationKey, AssetManager, Extent, HardwareBuffer, NativeWindow, ResampleFilter,
    SurfaceRotation,
};

const DEFAULT_IMAGE_COUNT: u32 = 3;
const HISTORY_LIMIT: usize = 64;

/// What one presented swapchain image contained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresentedFrame {
    pub image_index: u32,
    pub swapchain_generation: u64,
    pub buffer_id: Option<u64>,
    pub layout: Option<QuadLayout>,
    pub filter: Option<ResampleFilter>,
}

/// Kernel that keeps all device state in memory.
///
/// It follows the same surface and swapchain rules a GPU backed kernel does,
/// records what every presented image held, and can be told to lose its
/// device. Useful for running the pipeline without a display.
#[derive(Debug)]
pub struct HeadlessKernel {
    state: Mutex<KernelState>,
    drawing: AtomicBool,
    next_import: AtomicU64,
    imports_created: AtomicU64,
    layout_writes: AtomicU64,
}

#[derive(Debug)]
struct KernelState {
    window: Option<NativeWindow>,
    extent: Extent,
    device_rotation: SurfaceRotation,
    synchronize_orientation: bool,
    assets: Option<AssetManager>,
    image_count: u32,
    has_features: bool,
    generation: u64,
    swapchain: Option<Swapchain>,
    imports: HashMap<u64, AllocationKey>,
    device_lost: Option<String>,
    presented: VecDeque<PresentedFrame>,
    presented_total: u64,
}

#[derive(Debug)]
struct Swapchain {
    generation: u64,
    extent: Extent,
    next_image: u32,
    images: Vec<ImageContents>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ImageContents {
    buffer_id: Option<u64>,
    layout: Option<QuadLayout>,
    filter: Option<ResampleFilter>,
}

impl KernelState {
    fn rebuild_swapchain(&mut self) {
        if self.window.is_none() || !self.extent.is_valid() {
            if self.swapchain.take().is_some() {
                debug!("swapchain destroyed");
            }
            return;
        }
        self.generation += 1;
        self.swapchain = Some(Swapchain {
            generation: self.generation,
            extent: self.extent,
            next_image: 0,
            images: vec![ImageContents::default(); self.image_count as usize],
        });
        debug!(
            generation = self.generation,
            images = self.image_count,
            "swapchain created at {}",
            self.extent
        );
    }

    fn pre_rotation(&self) -> SurfaceRotation {
        if self.synchronize_orientation {
            self.device_rotation
        } else {
            SurfaceRotation::Rotation0
        }
    }

    fn check_device(&self) -> Result<(), FrameError> {
        match &self.device_lost {
            Some(reason) => Err(FrameError::DeviceLost(reason.clone())),
            None => Ok(()),
        }
    }

    fn image_mut(&mut self, image_index: u32) -> Result<&mut ImageContents, FrameError> {
        self.swapchain
            .as_mut()
            .ok_or(FrameError::Unavailable)?
            .images
            .get_mut(image_index as usize)
            .ok_or(FrameError::Unbound(image_index))
    }
}

struct DrawGuard<'a>(&'a AtomicBool);

impl Drop for DrawGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for HeadlessKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessKernel {
    pub fn new() -> Self {
        Self::with_image_count(DEFAULT_IMAGE_COUNT)
    }

    pub fn with_image_count(image_count: u32) -> Self {
        Self {
            state: Mutex::new(KernelState {
                window: None,
                extent: Extent::default(),
                device_rotation: SurfaceRotation::default(),
                synchronize_orientation: false,
                assets: None,
                image_count: image_count.max(1),
                has_features: true,
                generation: 0,
                swapchain: None,
                imports: HashMap::new(),
                device_lost: None,
                presented: VecDeque::new(),
                presented_total: 0,
            }),
            drawing: AtomicBool::new(false),
            next_import: AtomicU64::new(1),
            imports_created: AtomicU64::new(0),
            layout_writes: AtomicU64::new(0),
        }
    }

    pub fn set_has_features(&self, has_features: bool) {
        lock(&self.state).has_features = has_features;
    }

    /// Makes every later import and draw fail with `DeviceLost`.
    pub fn simulate_device_loss(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(%reason, "simulating device loss");
        lock(&self.state).device_lost = Some(reason);
    }

    /// Brings the device back and recreates the swapchain.
    pub fn restore_device(&self) {
        let mut state = lock(&self.state);
        if state.device_lost.take().is_some() {
            state.imports.clear();
            state.rebuild_swapchain();
        }
    }

    pub fn presented_total(&self) -> u64 {
        lock(&self.state).presented_total
    }

    pub fn last_presented(&self) -> Option<PresentedFrame> {
        lock(&self.state).presented.back().copied()
    }

    /// Most recent presented frames, oldest first.
    pub fn presented(&self) -> Vec<PresentedFrame> {
        lock(&self.state).presented.iter().copied().collect()
    }

    pub fn swapchain_generation(&self) -> u64 {
        lock(&self.state).generation
    }

    pub fn live_imports(&self) -> usize {
        lock(&self.state).imports.len()
    }

    pub fn imports_created(&self) -> u64 {
        self.imports_created.load(Ordering::Relaxed)
    }

    pub fn layout_writes(&self) -> u64 {
        self.layout_writes.load(Ordering::Relaxed)
    }

    pub fn asset_manager(&self) -> Option<AssetManager> {
        lock(&self.state).assets
    }
}

impl Kernel for HeadlessKernel {
    fn set_native_window(&self, window: Option<NativeWindow>) {
        let mut state = lock(&self.state);
        state.window = window;
        state.rebuild_swapchain();
    }

    fn has_surface(&self) -> bool {
        lock(&self.state).window.is_some()
    }

    fn set_image_extent(&self, extent: Extent) {
        let mut state = lock(&self.state);
        if state.extent != extent {
            state.extent = extent;
            state.rebuild_swapchain();
        }
    }

    fn set_device_orientation(&self, rotation: SurfaceRotation) {
        lock(&self.state).device_rotation = rotation;
    }

    fn set_asset_manager(&self, assets: AssetManager) {
        lock(&self.state).assets = Some(assets);
    }

    fn set_expected_orientation_synchronize(&self, synchronize: bool) {
        lock(&self.state).synchronize_orientation = synchronize;
    }

    fn is_available(&self) -> bool {
        let state = lock(&self.state);
        state.window.is_some() && state.extent.is_valid() && state.swapchain.is_some()
    }

    fn inspect_devices(&self) -> String {
        let state = lock(&self.state);
        let swapchain = match &state.swapchain {
            Some(swapchain) => format!(
                "{} images at {} (generation {})",
                swapchain.images.len(),
                swapchain.extent,
                swapchain.generation
            ),
            None => "none".to_string(),
        };
        let device = match &state.device_lost {
            Some(reason) => format!("lost ({reason})"),
            None => "ok".to_string(),
        };
        format!(
            "headless device: {device}\n  features: {}\n  surface: {}\n  swapchain: {swapchain}\n  pre-rotation: {} degrees",
            if state.has_features { "complete" } else { "missing" },
            if state.window.is_some() { "bound" } else { "none" },
            state.pre_rotation().degrees(),
        )
    }

    fn has_features(&self) -> bool {
        lock(&self.state).has_features
    }

    fn swapchain(&self) -> Option<SwapchainInfo> {
        let state = lock(&self.state);
        state.swapchain.as_ref().map(|swapchain| SwapchainInfo {
            generation: swapchain.generation,
            image_count: swapchain.images.len() as u32,
            extent: swapchain.extent,
            pre_rotation: state.pre_rotation(),
        })
    }

    fn import_buffer(&self, buffer: &HardwareBuffer) -> Result<ImportedImage, FrameError> {
        let mut state = lock(&self.state);
        state.check_device()?;
        let id = self.next_import.fetch_add(1, Ordering::Relaxed);
        state.imports.insert(id, buffer.allocation());
        self.imports_created.fetch_add(1, Ordering::Relaxed);
        trace!(import = id, "imported buffer allocation");
        Ok(ImportedImage {
            id,
            allocation: buffer.allocation(),
        })
    }

    fn release_import(&self, image: ImportedImage) {
        if lock(&self.state).imports.remove(&image.id).is_none() {
            trace!(import = image.id, "release of unknown import");
        }
    }

    fn update_image(
        &self,
        image_index: u32,
        image: &ImportedImage,
        buffer: &HardwareBuffer,
    ) -> Result<(), FrameError> {
        let mut state = lock(&self.state);
        state.check_device()?;
        if state.imports.get(&image.id) != Some(&buffer.allocation()) {
            return Err(FrameError::Unbound(image_index));
        }
        state.image_mut(image_index)?.buffer_id = Some(buffer.id());
        Ok(())
    }

    fn write_layout(
        &self,
        image_index: u32,
        layout: &QuadLayout,
        filter: ResampleFilter,
    ) -> Result<(), FrameError> {
        let mut state = lock(&self.state);
        state.check_device()?;
        let image = state.image_mut(image_index)?;
        image.layout = Some(*layout);
        image.filter = Some(filter);
        self.layout_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn draw_frame(
        &self,
        record: &mut dyn FnMut(u32) -> Result<(), FrameError>,
    ) -> Result<DrawOutcome, FrameError> {
        if self.drawing.swap(true, Ordering::AcqRel) {
            return Err(FrameError::Reentrant);
        }
        let _guard = DrawGuard(&self.drawing);

        let acquired = {
            let mut state = lock(&self.state);
            state.check_device()?;
            state.swapchain.as_mut().map(|swapchain| {
                let index = swapchain.next_image;
                swapchain.next_image = (index + 1) % swapchain.images.len() as u32;
                (index, swapchain.generation)
            })
        };
        let Some((image_index, generation)) = acquired else {
            trace!("no swapchain image to acquire");
            return Ok(DrawOutcome::Skipped);
        };

        record(image_index)?;

        let mut state = lock(&self.state);
        state.check_device()?;
        let contents = match state.swapchain.as_ref() {
            Some(swapchain) if swapchain.generation == generation => {
                swapchain.images[image_index as usize]
            }
            _ => {
                trace!(generation, "swapchain replaced during draw");
                return Ok(DrawOutcome::Skipped);
            }
        };
        if state.presented.len() == HISTORY_LIMIT {
            state.presented.pop_front();
        }
        state.presented.push_back(PresentedFrame {
            image_index,
            swapchain_generation: generation,
            buffer_id: contents.buffer_id,
            layout: contents.layout,
            filter: contents.filter,
        });
        state.presented_total += 1;
        Ok(DrawOutcome::Presented { image_index })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::PixelFormat;

    fn window() -> NativeWindow {
        NativeWindow::offscreen(1)
    }

    fn buffer(id: u64) -> HardwareBuffer {
        let allocation = AllocationKey {
            generation: 1,
            extent: Extent::new(2, 2),
            format: PixelFormat::Rgba8888,
        };
        HardwareBuffer::new(id, allocation, 0, Arc::from(vec![0_u8; 16]))
    }

    #[test]
    fn availability_needs_window_and_extent() {
        let kernel = HeadlessKernel::new();
        assert!(!kernel.is_available());
        kernel.set_native_window(Some(window()));
        assert!(kernel.has_surface());
        assert!(!kernel.is_available());
        kernel.set_image_extent(Extent::new(640, 480));
        assert!(kernel.is_available());
        kernel.set_native_window(None);
        assert!(!kernel.is_available());
        assert!(kernel.swapchain().is_none());
    }

    #[test]
    fn swapchain_generation_bumps_on_recreate() {
        let kernel = HeadlessKernel::with_image_count(2);
        kernel.set_image_extent(Extent::new(640, 480));
        kernel.set_native_window(Some(window()));
        let first = kernel.swapchain().unwrap();
        assert_eq!(first.image_count, 2);
        kernel.set_image_extent(Extent::new(480, 640));
        let second = kernel.swapchain().unwrap();
        assert!(second.generation > first.generation);
        assert_eq!(second.extent, Extent::new(480, 640));
    }

    #[test]
    fn pre_rotation_follows_device_only_when_synchronized() {
        let kernel = HeadlessKernel::new();
        kernel.set_image_extent(Extent::new(640, 480));
        kernel.set_native_window(Some(window()));
        kernel.set_device_orientation(SurfaceRotation::Rotation270);
        assert_eq!(kernel.swapchain().unwrap().pre_rotation, SurfaceRotation::Rotation0);
        kernel.set_expected_orientation_synchronize(true);
        assert_eq!(kernel.swapchain().unwrap().pre_rotation, SurfaceRotation::Rotation270);
    }

    #[test]
    fn draw_cycles_images_and_records_contents() {
        let kernel = HeadlessKernel::with_image_count(2);
        kernel.set_image_extent(Extent::new(2, 2));
        kernel.set_native_window(Some(window()));
        let frame = buffer(9);
        let import = kernel.import_buffer(&frame).unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            let outcome = kernel
                .draw_frame(&mut |index| {
                    seen.push(index);
                    kernel.update_image(index, &import, &frame)
                })
                .unwrap();
            assert!(matches!(outcome, DrawOutcome::Presented { .. }));
        }
        assert_eq!(seen, vec![0, 1, 0]);
        assert_eq!(kernel.presented_total(), 3);
        assert_eq!(kernel.last_presented().unwrap().buffer_id, Some(9));
    }

    #[test]
    fn draw_without_swapchain_is_skipped() {
        let kernel = HeadlessKernel::new();
        let mut called = false;
        let outcome = kernel
            .draw_frame(&mut |_| {
                called = true;
                Ok(())
            })
            .unwrap();
        assert_eq!(outcome, DrawOutcome::Skipped);
        assert!(!called);
    }

    #[test]
    fn nested_draw_is_rejected() {
        let kernel = HeadlessKernel::new();
        kernel.set_image_extent(Extent::new(2, 2));
        kernel.set_native_window(Some(window()));
        let mut inner = None;
        kernel
            .draw_frame(&mut |_| {
                inner = Some(kernel.draw_frame(&mut |_| Ok(())));
                Ok(())
            })
            .unwrap();
        assert_eq!(inner, Some(Err(FrameError::Reentrant)));
        assert!(kernel.draw_frame(&mut |_| Ok(())).is_ok());
    }

    #[test]
    fn device_loss_fails_draws_until_restored() {
        let kernel = HeadlessKernel::new();
        kernel.set_image_extent(Extent::new(2, 2));
        kernel.set_native_window(Some(window()));
        kernel.simulate_device_loss("test reset");
        let err = kernel.draw_frame(&mut |_| Ok(())).unwrap_err();
        assert!(err.is_fatal());
        assert!(kernel.import_buffer(&buffer(1)).is_err());
        assert!(kernel.inspect_devices().contains("lost"));

        let before = kernel.swapchain_generation();
        kernel.restore_device();
        assert!(kernel.swapchain_generation() > before);
        assert!(kernel.draw_frame(&mut |_| Ok(())).is_ok());
    }
}
