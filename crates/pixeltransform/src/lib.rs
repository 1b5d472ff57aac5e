//! Vsync-paced pipeline that moves decoded frames onto a presentation surface.
//!
//! A producer writes frames into an [`InputSurface`]. Once per display refresh
//! the render thread takes the newest frame, binds it to the swapchain through
//! a [`Texture`], and asks the [`Kernel`] to draw it with the configured
//! gravity, orientation, and sampling filter. The overall flow is:
//!
//! ```text
//!   producer ──▶ InputSurface ──▶ ImageReader (latest wins)
//!                                      │
//!   FrameClock tick ──▶ FpsController ─┴─▶ Texture::set_up ──▶ Kernel::draw_frame
//!                                                               │
//!                                         update_at + layout_at ◀┘ (per image)
//! ```
//!
//! [`PixelTransform`] owns the pieces and the render thread. It starts once
//! both an input and a surface exist and stops when the surface goes away.
//! [`HeadlessKernel`], [`SharedImageReader`], and the clocks in [`clock`] let
//! the whole pipeline run without a display.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod clock;
mod error;
mod fps;
pub mod kernel;
mod layout;
pub mod loader;
mod reader;
mod stats;
mod texture;
mod transform;
mod types;

pub use clock::{channel_clock, ChannelFrameClock, FrameClock, FrameClockHandle, FrameTick, VsyncClock};
pub use error::{
    FrameError, LoaderError, ParseValueError, ReaderError, SurfaceError, TransformError,
};
pub use fps::FpsController;
pub use kernel::{DrawOutcome, HeadlessKernel, ImportedImage, Kernel, PresentedFrame, SwapchainInfo};
pub use layout::{compute_layout, QuadLayout, Vertex};
pub use loader::{DynamicLoader, StaticLoader};
#[cfg(feature = "vulkan")]
pub use loader::{VulkanLoader, VulkanProbe};
pub use reader::{ImageReader, InputSurface, SharedImageReader};
pub use stats::FrameStats;
pub use texture::Texture;
pub use transform::PixelTransform;
pub use types::{
    AllocationKey, AssetManager, Extent, HardwareBuffer, ImageOrientation, NativeWindow,
    PixelFormat, ResampleFilter, SurfaceRotation, VideoGravity,
};

/// Locks `mutex`, carrying on with the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
