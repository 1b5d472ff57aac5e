//! GPU device, surface, and command submission seam.
//!
//! The pipeline never talks to a graphics API directly. Everything it needs
//! from the device goes through [`Kernel`]:
//!
//! ```text
//!   PixelTransform ──▶ Kernel::set_* (any thread, configuration)
//!   render thread  ──▶ Texture::set_up ──▶ Kernel::import_buffer
//!                  └─▶ Kernel::draw_frame(|index| {
//!                          Texture::update_at ──▶ Kernel::update_image
//!                          Texture::layout_at ──▶ Kernel::write_layout
//!                      })
//! ```
//!
//! Implementations synchronize internally. Configuration writes can race a
//! draw, so `draw_frame` works from one snapshot of the swapchain and must not
//! hold its own locks while the per-image callback runs.

mod headless;

pub use headless::{HeadlessKernel, PresentedFrame};

use crate::error::FrameError;
use crate::layout::QuadLayout;
use crate::types::{
    AllocationKey, AssetManager, Extent, HardwareBuffer, NativeWindow, ResampleFilter,
    SurfaceRotation,
};

/// Consistent view of the presentation swapchain at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainInfo {
    /// Bumped every time the swapchain is recreated.
    pub generation: u64,
    pub image_count: u32,
    pub extent: Extent,
    /// Rotation the kernel expects content to be pre-rotated by.
    pub pre_rotation: SurfaceRotation,
}

/// GPU-visible memory bound to a hardware buffer allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImportedImage {
    pub id: u64,
    pub allocation: AllocationKey,
}

/// Result of one `draw_frame` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Presented { image_index: u32 },
    /// No swapchain image could be acquired, or the swapchain changed under
    /// the draw; nothing was presented.
    Skipped,
}

pub trait Kernel: Send + Sync {
    /// Binds or clears the presentation surface.
    fn set_native_window(&self, window: Option<NativeWindow>);

    fn has_surface(&self) -> bool;

    fn set_image_extent(&self, extent: Extent);

    fn set_device_orientation(&self, rotation: SurfaceRotation);

    fn set_asset_manager(&self, assets: AssetManager);

    /// When enabled, content is pre-rotated to follow the device orientation.
    fn set_expected_orientation_synchronize(&self, synchronize: bool);

    /// True only when a surface, a valid extent, and a swapchain all exist.
    fn is_available(&self) -> bool;

    /// Human readable report about the devices the kernel can see.
    fn inspect_devices(&self) -> String;

    fn has_features(&self) -> bool;

    fn swapchain(&self) -> Option<SwapchainInfo>;

    fn import_buffer(&self, buffer: &HardwareBuffer) -> Result<ImportedImage, FrameError>;

    fn release_import(&self, image: ImportedImage);

    /// Records the copy (or alias) of `buffer` into the sampled image backing
    /// swapchain image `image_index`. Must not wait for the GPU.
    fn update_image(
        &self,
        image_index: u32,
        image: &ImportedImage,
        buffer: &HardwareBuffer,
    ) -> Result<(), FrameError>;

    fn write_layout(
        &self,
        image_index: u32,
        layout: &QuadLayout,
        filter: ResampleFilter,
    ) -> Result<(), FrameError>;

    /// Acquires a swapchain image, hands its index to `record` exactly once,
    /// then submits and presents. Not reentrant.
    fn draw_frame(
        &self,
        record: &mut dyn FnMut(u32) -> Result<(), FrameError>,
    ) -> Result<DrawOutcome, FrameError>;
}
