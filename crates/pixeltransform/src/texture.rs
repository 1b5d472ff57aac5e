use tracing::debug;

use crate::error::FrameError;
use crate::kernel::{ImportedImage, Kernel, SwapchainInfo};
use crate::layout::{compute_layout, QuadLayout};
use crate::types::{
    Extent, HardwareBuffer, ImageOrientation, PixelFormat, ResampleFilter, SurfaceRotation,
    VideoGravity,
};

/// GPU-side binding of one input stream to the swapchain images.
///
/// A texture imports the producer's buffer allocation once and keeps per
/// swapchain image state, so a steady stream only records an image update and
/// rewrites the quad layout when something that affects it changed.
#[derive(Debug)]
pub struct Texture {
    extent: Extent,
    format: PixelFormat,
    video_gravity: VideoGravity,
    image_orientation: ImageOrientation,
    resample_filter: ResampleFilter,
    binding: Option<Binding>,
}

#[derive(Debug)]
struct Binding {
    import: ImportedImage,
    swapchain: SwapchainInfo,
    images: Vec<ImageSlot>,
}

#[derive(Debug, Clone, Default)]
struct ImageSlot {
    buffer_id: Option<u64>,
    layout: Option<(QuadLayout, ResampleFilter)>,
}

impl Texture {
    pub fn new(extent: Extent, format: PixelFormat) -> Self {
        Self {
            extent,
            format,
            video_gravity: VideoGravity::default(),
            image_orientation: ImageOrientation::default(),
            resample_filter: ResampleFilter::default(),
            binding: None,
        }
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn video_gravity(&self) -> VideoGravity {
        self.video_gravity
    }

    pub fn image_orientation(&self) -> ImageOrientation {
        self.image_orientation
    }

    pub fn resample_filter(&self) -> ResampleFilter {
        self.resample_filter
    }

    pub fn set_video_gravity(&mut self, gravity: VideoGravity) {
        self.video_gravity = gravity;
    }

    pub fn set_image_orientation(&mut self, orientation: ImageOrientation) {
        self.image_orientation = orientation;
    }

    pub fn set_resample_filter(&mut self, filter: ResampleFilter) {
        self.resample_filter = filter;
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Buffer most recently recorded into swapchain image `image_index`.
    pub fn buffer_at(&self, image_index: u32) -> Option<u64> {
        self.binding
            .as_ref()
            .and_then(|binding| binding.images.get(image_index as usize))
            .and_then(|slot| slot.buffer_id)
    }

    /// Layout this texture draws with on a surface of `surface` extent that
    /// expects content pre-rotated by `pre_rotation`.
    pub fn layout_for(&self, surface: Extent, pre_rotation: SurfaceRotation) -> QuadLayout {
        compute_layout(
            self.extent,
            surface,
            self.image_orientation.rotated_by(pre_rotation),
            self.video_gravity,
        )
    }

    /// Makes sure GPU resources for `buffer` exist for the current swapchain.
    ///
    /// Idempotent while the buffer allocation and the swapchain generation stay
    /// the same; otherwise the old import is released and everything is bound
    /// again.
    pub fn set_up(&mut self, kernel: &dyn Kernel, buffer: &HardwareBuffer) -> Result<(), FrameError> {
        if !kernel.is_available() {
            return Err(FrameError::Unavailable);
        }
        if buffer.extent() != self.extent {
            return Err(FrameError::ExtentMismatch {
                buffer: buffer.extent().to_string(),
                texture: self.extent.to_string(),
            });
        }
        let swapchain = kernel.swapchain().ok_or(FrameError::Unavailable)?;

        if let Some(binding) = self.binding.as_mut() {
            if binding.import.allocation == buffer.allocation()
                && binding.swapchain.generation == swapchain.generation
                && binding.swapchain.image_count == swapchain.image_count
            {
                // Extent or pre-rotation may still have moved; layouts notice.
                binding.swapchain = swapchain;
                return Ok(());
            }
        }

        if let Some(stale) = self.binding.take() {
            kernel.release_import(stale.import);
        }
        let import = kernel.import_buffer(buffer)?;
        debug!(
            import = import.id,
            generation = swapchain.generation,
            images = swapchain.image_count,
            "bound texture {} to swapchain",
            self.extent
        );
        self.binding = Some(Binding {
            import,
            swapchain,
            images: vec![ImageSlot::default(); swapchain.image_count as usize],
        });
        Ok(())
    }

    /// Records the upload of `buffer` into swapchain image `image_index`.
    pub fn update_at(
        &mut self,
        kernel: &dyn Kernel,
        image_index: u32,
        buffer: &HardwareBuffer,
    ) -> Result<(), FrameError> {
        if !kernel.is_available() {
            return Err(FrameError::Unavailable);
        }
        let binding = self
            .binding
            .as_mut()
            .ok_or(FrameError::Unbound(image_index))?;
        if binding.import.allocation != buffer.allocation() {
            return Err(FrameError::Unbound(image_index));
        }
        let slot = binding
            .images
            .get_mut(image_index as usize)
            .ok_or(FrameError::Unbound(image_index))?;
        kernel.update_image(image_index, &binding.import, buffer)?;
        slot.buffer_id = Some(buffer.id());
        Ok(())
    }

    /// Writes the quad layout for swapchain image `image_index` when gravity,
    /// orientation, filter, or the surface changed since the last write.
    pub fn layout_at(&mut self, kernel: &dyn Kernel, image_index: u32) -> Result<(), FrameError> {
        if !kernel.is_available() {
            return Err(FrameError::Unavailable);
        }
        let layout = match self.binding.as_ref() {
            Some(binding) => {
                self.layout_for(binding.swapchain.extent, binding.swapchain.pre_rotation)
            }
            None => return Err(FrameError::Unbound(image_index)),
        };
        let filter = self.resample_filter;
        let slot = self
            .binding
            .as_mut()
            .and_then(|binding| binding.images.get_mut(image_index as usize))
            .ok_or(FrameError::Unbound(image_index))?;
        if slot.layout == Some((layout, filter)) {
            return Ok(());
        }
        kernel.write_layout(image_index, &layout, filter)?;
        slot.layout = Some((layout, filter));
        Ok(())
    }

    /// Gives the buffer import back to the kernel.
    pub fn release(&mut self, kernel: &dyn Kernel) {
        if let Some(binding) = self.binding.take() {
            kernel.release_import(binding.import);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::kernel::HeadlessKernel;
    use crate::types::{AllocationKey, NativeWindow};

    const SOURCE: Extent = Extent::new(4, 2);

    fn window() -> NativeWindow {
        NativeWindow::offscreen(1)
    }

    fn ready_kernel() -> HeadlessKernel {
        let kernel = HeadlessKernel::new();
        kernel.set_image_extent(Extent::new(8, 8));
        kernel.set_native_window(Some(window()));
        kernel
    }

    fn buffer(id: u64, generation: u64) -> HardwareBuffer {
        let allocation = AllocationKey {
            generation,
            extent: SOURCE,
            format: PixelFormat::Rgba8888,
        };
        HardwareBuffer::new(id, allocation, 0, Arc::from(vec![0_u8; 32]))
    }

    #[test]
    fn set_up_fails_fast_without_kernel() {
        let kernel = HeadlessKernel::new();
        let mut texture = Texture::new(SOURCE, PixelFormat::Rgba8888);
        assert_eq!(texture.set_up(&kernel, &buffer(1, 1)), Err(FrameError::Unavailable));
        assert!(!texture.is_bound());
        assert_eq!(kernel.live_imports(), 0);
    }

    #[test]
    fn set_up_is_idempotent_for_same_allocation() {
        let kernel = ready_kernel();
        let mut texture = Texture::new(SOURCE, PixelFormat::Rgba8888);
        texture.set_up(&kernel, &buffer(1, 1)).unwrap();
        texture.set_up(&kernel, &buffer(2, 1)).unwrap();
        assert_eq!(kernel.imports_created(), 1);
        assert_eq!(kernel.live_imports(), 1);
    }

    #[test]
    fn new_allocation_or_swapchain_rebinds() {
        let kernel = ready_kernel();
        let mut texture = Texture::new(SOURCE, PixelFormat::Rgba8888);
        texture.set_up(&kernel, &buffer(1, 1)).unwrap();
        texture.set_up(&kernel, &buffer(2, 2)).unwrap();
        assert_eq!(kernel.imports_created(), 2);

        kernel.set_image_extent(Extent::new(16, 8));
        texture.set_up(&kernel, &buffer(3, 2)).unwrap();
        assert_eq!(kernel.imports_created(), 3);
        assert_eq!(kernel.live_imports(), 1);

        texture.release(&kernel);
        assert_eq!(kernel.live_imports(), 0);
    }

    #[test]
    fn mismatched_buffer_extent_is_rejected() {
        let kernel = ready_kernel();
        let mut texture = Texture::new(Extent::new(2, 2), PixelFormat::Rgba8888);
        let err = texture.set_up(&kernel, &buffer(1, 1)).unwrap_err();
        assert!(matches!(err, FrameError::ExtentMismatch { .. }));
    }

    #[test]
    fn per_image_operations_need_a_binding() {
        let kernel = ready_kernel();
        let mut texture = Texture::new(SOURCE, PixelFormat::Rgba8888);
        assert_eq!(
            texture.update_at(&kernel, 0, &buffer(1, 1)),
            Err(FrameError::Unbound(0))
        );
        texture.set_up(&kernel, &buffer(1, 1)).unwrap();
        assert_eq!(texture.layout_at(&kernel, 7), Err(FrameError::Unbound(7)));
        texture.update_at(&kernel, 2, &buffer(5, 1)).unwrap();
        assert_eq!(texture.buffer_at(2), Some(5));
    }

    #[test]
    fn layout_is_written_only_when_it_changes() {
        let kernel = ready_kernel();
        let mut texture = Texture::new(SOURCE, PixelFormat::Rgba8888);
        texture.set_up(&kernel, &buffer(1, 1)).unwrap();
        texture.layout_at(&kernel, 0).unwrap();
        texture.layout_at(&kernel, 0).unwrap();
        assert_eq!(kernel.layout_writes(), 1);

        texture.set_resample_filter(ResampleFilter::Nearest);
        texture.layout_at(&kernel, 0).unwrap();
        assert_eq!(kernel.layout_writes(), 2);

        texture.set_video_gravity(VideoGravity::Resize);
        texture.layout_at(&kernel, 0).unwrap();
        assert_eq!(kernel.layout_writes(), 3);
    }

    #[test]
    fn gravity_and_orientation_are_independent() {
        let mut texture = Texture::new(Extent::new(1920, 1080), PixelFormat::Rgba8888);
        let surface = Extent::new(1080, 1920);
        texture.set_video_gravity(VideoGravity::ResizeAspectFill);
        texture.set_image_orientation(ImageOrientation::Right);
        let first = texture.layout_for(surface, SurfaceRotation::Rotation0);

        let mut reordered = Texture::new(Extent::new(1920, 1080), PixelFormat::Rgba8888);
        reordered.set_image_orientation(ImageOrientation::Right);
        reordered.set_video_gravity(VideoGravity::ResizeAspectFill);
        assert_eq!(first, reordered.layout_for(surface, SurfaceRotation::Rotation0));

        texture.set_video_gravity(VideoGravity::ResizeAspect);
        assert_eq!(texture.image_orientation(), ImageOrientation::Right);
    }

    #[test]
    fn surface_pre_rotation_composes_with_image_orientation() {
        let texture = Texture::new(Extent::new(1920, 1080), PixelFormat::Rgba8888);
        let rotated = texture.layout_for(Extent::new(1080, 1920), SurfaceRotation::Rotation90);
        let mut explicit = Texture::new(Extent::new(1920, 1080), PixelFormat::Rgba8888);
        explicit.set_image_orientation(ImageOrientation::Right);
        assert_eq!(
            rotated,
            explicit.layout_for(Extent::new(1080, 1920), SurfaceRotation::Rotation0)
        );
    }
}
