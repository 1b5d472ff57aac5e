use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use std::result::Result as StdResult;
use std::sync::Arc;

use raw_window_handle::{
    AndroidNdkWindowHandle, HandleError, HasWindowHandle, RawWindowHandle, WebWindowHandle,
    WindowHandle,
};

use crate::error::ParseValueError;

/// Width and height of an image or surface in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Builds an extent from the signed integers a calling layer hands over.
    /// Negative values collapse to zero, which makes the extent invalid.
    pub fn from_signed(width: i32, height: i32) -> Self {
        Self {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
        }
    }

    /// An extent is drawable only when both dimensions are non-zero.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Swaps width and height, as happens when a frame is rotated by 90 or 270 degrees.
    pub fn transposed(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel layouts a producer may write into an input surface.
///
/// The discriminants match the image format codes used by platform image
/// readers, so raw integers from a calling layer convert directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    #[default]
    Rgba8888,
    Rgbx8888,
    Rgb888,
    Rgb565,
    Private,
    Yuv420,
}

impl PixelFormat {
    pub fn raw(self) -> i32 {
        match self {
            PixelFormat::Rgba8888 => 1,
            PixelFormat::Rgbx8888 => 2,
            PixelFormat::Rgb888 => 3,
            PixelFormat::Rgb565 => 4,
            PixelFormat::Private => 0x22,
            PixelFormat::Yuv420 => 0x23,
        }
    }

    /// Bytes needed to hold one frame of `extent` in this format.
    ///
    /// `Private` buffers are opaque to the CPU and report zero.
    pub fn frame_len(self, extent: Extent) -> usize {
        let pixels = extent.width as usize * extent.height as usize;
        match self {
            PixelFormat::Rgba8888 | PixelFormat::Rgbx8888 => pixels * 4,
            PixelFormat::Rgb888 => pixels * 3,
            PixelFormat::Rgb565 => pixels * 2,
            PixelFormat::Yuv420 => pixels + pixels / 2,
            PixelFormat::Private => 0,
        }
    }
}

impl TryFrom<i32> for PixelFormat {
    type Error = ParseValueError;

    fn try_from(value: i32) -> StdResult<Self, Self::Error> {
        match value {
            1 => Ok(PixelFormat::Rgba8888),
            2 => Ok(PixelFormat::Rgbx8888),
            3 => Ok(PixelFormat::Rgb888),
            4 => Ok(PixelFormat::Rgb565),
            0x22 => Ok(PixelFormat::Private),
            0x23 => Ok(PixelFormat::Yuv420),
            _ => Err(ParseValueError::new("pixel format", value)),
        }
    }
}

/// Spatial mapping from the source frame onto the presentation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VideoGravity {
    /// Preserve aspect ratio and letterbox (fit).
    #[default]
    ResizeAspect,
    /// Preserve aspect ratio and crop (fill).
    ResizeAspectFill,
    /// Ignore aspect ratio and cover the surface exactly (stretch).
    Resize,
}

impl TryFrom<i32> for VideoGravity {
    type Error = ParseValueError;

    fn try_from(value: i32) -> StdResult<Self, Self::Error> {
        match value {
            0 => Ok(VideoGravity::ResizeAspect),
            1 => Ok(VideoGravity::ResizeAspectFill),
            2 => Ok(VideoGravity::Resize),
            _ => Err(ParseValueError::new("video gravity", value)),
        }
    }
}

/// Rotation applied to the source frame before gravity, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageOrientation {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

impl ImageOrientation {
    pub fn degrees(self) -> u32 {
        match self {
            ImageOrientation::Up => 0,
            ImageOrientation::Right => 90,
            ImageOrientation::Down => 180,
            ImageOrientation::Left => 270,
        }
    }

    /// Maps any multiple of 90 degrees back onto an orientation.
    pub fn from_degrees(degrees: u32) -> Self {
        match (degrees / 90) % 4 {
            0 => ImageOrientation::Up,
            1 => ImageOrientation::Right,
            2 => ImageOrientation::Down,
            _ => ImageOrientation::Left,
        }
    }

    /// Composes two clockwise rotations.
    pub fn rotated_by(self, rotation: SurfaceRotation) -> Self {
        Self::from_degrees(self.degrees() + rotation.degrees())
    }

    pub fn is_transposed(self) -> bool {
        matches!(self, ImageOrientation::Right | ImageOrientation::Left)
    }
}

impl TryFrom<i32> for ImageOrientation {
    type Error = ParseValueError;

    fn try_from(value: i32) -> StdResult<Self, Self::Error> {
        match value {
            0 => Ok(ImageOrientation::Up),
            1 => Ok(ImageOrientation::Right),
            2 => Ok(ImageOrientation::Down),
            3 => Ok(ImageOrientation::Left),
            _ => Err(ParseValueError::new("image orientation", value)),
        }
    }
}

/// Sampler policy used when the texture is magnified or minified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResampleFilter {
    Nearest,
    #[default]
    Linear,
}

impl TryFrom<i32> for ResampleFilter {
    type Error = ParseValueError;

    fn try_from(value: i32) -> StdResult<Self, Self::Error> {
        match value {
            0 => Ok(ResampleFilter::Nearest),
            1 => Ok(ResampleFilter::Linear),
            _ => Err(ParseValueError::new("resample filter", value)),
        }
    }
}

/// Physical rotation of the display relative to its natural orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SurfaceRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl SurfaceRotation {
    pub fn degrees(self) -> u32 {
        match self {
            SurfaceRotation::Rotation0 => 0,
            SurfaceRotation::Rotation90 => 90,
            SurfaceRotation::Rotation180 => 180,
            SurfaceRotation::Rotation270 => 270,
        }
    }
}

impl TryFrom<i32> for SurfaceRotation {
    type Error = ParseValueError;

    fn try_from(value: i32) -> StdResult<Self, Self::Error> {
        match value {
            0 => Ok(SurfaceRotation::Rotation0),
            1 => Ok(SurfaceRotation::Rotation90),
            2 => Ok(SurfaceRotation::Rotation180),
            3 => Ok(SurfaceRotation::Rotation270),
            _ => Err(ParseValueError::new("surface rotation", value)),
        }
    }
}

/// Opaque handle to the drawing surface a kernel presents into.
///
/// The pipeline never dereferences the handle; it only carries it from the
/// calling layer to the kernel, which owns the platform surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeWindow {
    raw: RawWindowHandle,
}

// The handle is an identifier for a surface owned by the platform; moving it
// between threads does not touch the surface itself.
unsafe impl Send for NativeWindow {}
unsafe impl Sync for NativeWindow {}

impl NativeWindow {
    pub fn from_raw(raw: RawWindowHandle) -> Self {
        Self { raw }
    }

    /// Wraps an `ANativeWindow` pointer.
    pub fn android(window: NonNull<c_void>) -> Self {
        Self::from_raw(RawWindowHandle::AndroidNdk(AndroidNdkWindowHandle::new(
            window,
        )))
    }

    /// Handle for kernels that render offscreen and never touch a platform
    /// window. `id` only distinguishes surfaces from one another.
    pub fn offscreen(id: u32) -> Self {
        Self::from_raw(RawWindowHandle::Web(WebWindowHandle::new(id)))
    }

    pub fn raw(&self) -> RawWindowHandle {
        self.raw
    }
}

impl HasWindowHandle for NativeWindow {
    fn window_handle(&self) -> StdResult<WindowHandle<'_>, HandleError> {
        Ok(unsafe { WindowHandle::borrow_raw(self.raw) })
    }
}

/// Opaque handle to the asset bundle kernels load shader binaries from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetManager(NonNull<c_void>);

unsafe impl Send for AssetManager {}
unsafe impl Sync for AssetManager {}

impl AssetManager {
    pub fn from_ptr(ptr: NonNull<c_void>) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Identifies the allocation behind a hardware buffer.
///
/// Buffers produced by the same reader generation share extent and format and
/// can reuse one GPU import; a new generation always needs a rebind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationKey {
    pub generation: u64,
    pub extent: Extent,
    pub format: PixelFormat,
}

/// One decoded frame shared between the producer and the GPU.
///
/// Cloning is cheap; all clones refer to the same pixel storage.
#[derive(Clone)]
pub struct HardwareBuffer {
    inner: Arc<BufferInner>,
}

struct BufferInner {
    id: u64,
    allocation: AllocationKey,
    timestamp_nanos: i64,
    pixels: Arc<[u8]>,
}

impl HardwareBuffer {
    pub fn new(id: u64, allocation: AllocationKey, timestamp_nanos: i64, pixels: Arc<[u8]>) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                id,
                allocation,
                timestamp_nanos,
                pixels,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn allocation(&self) -> AllocationKey {
        self.inner.allocation
    }

    pub fn extent(&self) -> Extent {
        self.inner.allocation.extent
    }

    pub fn format(&self) -> PixelFormat {
        self.inner.allocation.format
    }

    pub fn timestamp_nanos(&self) -> i64 {
        self.inner.timestamp_nanos
    }

    pub fn pixels(&self) -> &[u8] {
        &self.inner.pixels
    }
}

impl fmt::Debug for HardwareBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardwareBuffer")
            .field("id", &self.inner.id)
            .field("allocation", &self.inner.allocation)
            .field("timestamp_nanos", &self.inner.timestamp_nanos)
            .field("len", &self.inner.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_codes_round_trip_through_enums() {
        assert_eq!(VideoGravity::try_from(1).unwrap(), VideoGravity::ResizeAspectFill);
        assert_eq!(ImageOrientation::try_from(3).unwrap(), ImageOrientation::Left);
        assert_eq!(PixelFormat::try_from(0x23).unwrap(), PixelFormat::Yuv420);
        assert_eq!(PixelFormat::Yuv420.raw(), 0x23);
        assert!(ResampleFilter::try_from(7).is_err());
        assert!(SurfaceRotation::try_from(-1).is_err());
    }

    #[test]
    fn orientation_composes_with_surface_rotation() {
        let composed = ImageOrientation::Left.rotated_by(SurfaceRotation::Rotation180);
        assert_eq!(composed, ImageOrientation::Right);
        assert!(composed.is_transposed());
        assert_eq!(
            ImageOrientation::Up.rotated_by(SurfaceRotation::Rotation0),
            ImageOrientation::Up
        );
    }

    #[test]
    fn negative_extent_is_invalid() {
        let extent = Extent::from_signed(-4, 1080);
        assert_eq!(extent.width, 0);
        assert!(!extent.is_valid());
        assert_eq!(Extent::new(1920, 1080).transposed(), Extent::new(1080, 1920));
    }

    #[test]
    fn frame_len_tracks_format() {
        let extent = Extent::new(4, 2);
        assert_eq!(PixelFormat::Rgba8888.frame_len(extent), 32);
        assert_eq!(PixelFormat::Yuv420.frame_len(extent), 12);
        assert_eq!(PixelFormat::Private.frame_len(extent), 0);
    }
}
