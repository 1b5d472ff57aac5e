use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{ReaderError, SurfaceError};
use crate::lock;
use crate::types::{AllocationKey, Extent, HardwareBuffer, PixelFormat};

/// Source of decoded frames for the render thread.
///
/// Only the most recent buffer matters: the render thread asks for it once per
/// frame and older frames are dropped rather than queued.
pub trait ImageReader: Send + Sync {
    /// (Re)provisions the producer surface. Any previous surface is abandoned
    /// and unconsumed buffers are discarded.
    fn set_up(&self, extent: Extent, format: PixelFormat) -> Result<(), ReaderError>;

    /// Producer handle for the current surface.
    fn window(&self) -> Option<InputSurface>;

    /// Takes the newest buffer, leaving the reader empty until the producer
    /// queues another one.
    fn latest_buffer(&self) -> Option<HardwareBuffer>;
}

/// Single-slot, latest-wins image reader.
#[derive(Debug, Default)]
pub struct SharedImageReader {
    current: Mutex<Option<Arc<SurfaceChannel>>>,
    generation: AtomicU64,
}

#[derive(Debug)]
struct SurfaceChannel {
    allocation: AllocationKey,
    slot: Mutex<Option<HardwareBuffer>>,
    abandoned: AtomicBool,
    next_id: AtomicU64,
}

impl SharedImageReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageReader for SharedImageReader {
    fn set_up(&self, extent: Extent, format: PixelFormat) -> Result<(), ReaderError> {
        if !extent.is_valid() {
            return Err(ReaderError::InvalidExtent(extent.to_string()));
        }
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let channel = Arc::new(SurfaceChannel {
            allocation: AllocationKey {
                generation,
                extent,
                format,
            },
            slot: Mutex::new(None),
            abandoned: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        });
        let previous = lock(&self.current).replace(channel);
        if let Some(previous) = previous {
            previous.abandoned.store(true, Ordering::Release);
            lock(&previous.slot).take();
        }
        debug!(generation, ?format, "image reader surface ready at {extent}");
        Ok(())
    }

    fn window(&self) -> Option<InputSurface> {
        lock(&self.current).clone().map(|channel| InputSurface { channel })
    }

    fn latest_buffer(&self) -> Option<HardwareBuffer> {
        let channel = lock(&self.current).clone()?;
        let buffer = lock(&channel.slot).take();
        buffer
    }
}

/// Producer side of an image reader surface.
#[derive(Debug, Clone)]
pub struct InputSurface {
    channel: Arc<SurfaceChannel>,
}

impl InputSurface {
    pub fn extent(&self) -> Extent {
        self.channel.allocation.extent
    }

    pub fn format(&self) -> PixelFormat {
        self.channel.allocation.format
    }

    pub fn is_abandoned(&self) -> bool {
        self.channel.abandoned.load(Ordering::Acquire)
    }

    /// Publishes one frame, replacing any frame the reader has not taken yet.
    ///
    /// Returns the id of the new buffer. Opaque `Private` frames may have any
    /// length; every other format must match the surface exactly.
    pub fn queue(
        &self,
        timestamp_nanos: i64,
        pixels: impl Into<Arc<[u8]>>,
    ) -> Result<u64, SurfaceError> {
        let pixels = pixels.into();
        let format = self.format();
        let expected = format.frame_len(self.extent());
        if format != PixelFormat::Private && pixels.len() != expected {
            return Err(SurfaceError::FrameSize {
                expected,
                actual: pixels.len(),
            });
        }

        let mut slot = lock(&self.channel.slot);
        // Checked under the slot lock so a reconfiguration cannot be raced.
        if self.is_abandoned() {
            return Err(SurfaceError::Abandoned);
        }
        let id = self.channel.next_id.fetch_add(1, Ordering::Relaxed);
        *slot = Some(HardwareBuffer::new(
            id,
            self.channel.allocation,
            timestamp_nanos,
            pixels,
        ));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(extent: Extent) -> Vec<u8> {
        vec![0x7f; PixelFormat::Rgba8888.frame_len(extent)]
    }

    #[test]
    fn latest_buffer_takes_newest_once() {
        let reader = SharedImageReader::new();
        let extent = Extent::new(4, 4);
        reader.set_up(extent, PixelFormat::Rgba8888).unwrap();
        let surface = reader.window().unwrap();
        surface.queue(1, frame(extent)).unwrap();
        let newest = surface.queue(2, frame(extent)).unwrap();

        let buffer = reader.latest_buffer().unwrap();
        assert_eq!(buffer.id(), newest);
        assert_eq!(buffer.timestamp_nanos(), 2);
        assert!(reader.latest_buffer().is_none());
    }

    #[test]
    fn reconfiguration_abandons_old_surface() {
        let reader = SharedImageReader::new();
        reader.set_up(Extent::new(4, 4), PixelFormat::Rgba8888).unwrap();
        let old = reader.window().unwrap();
        old.queue(1, frame(Extent::new(4, 4))).unwrap();

        reader.set_up(Extent::new(2, 2), PixelFormat::Rgba8888).unwrap();
        assert!(old.is_abandoned());
        assert_eq!(old.queue(2, frame(Extent::new(4, 4))), Err(SurfaceError::Abandoned));
        assert!(reader.latest_buffer().is_none());

        let fresh = reader.window().unwrap();
        fresh.queue(3, frame(Extent::new(2, 2))).unwrap();
        let buffer = reader.latest_buffer().unwrap();
        assert_eq!(buffer.extent(), Extent::new(2, 2));
        assert_eq!(buffer.allocation().generation, 2);
    }

    #[test]
    fn frame_length_is_checked_except_for_private() {
        let reader = SharedImageReader::new();
        reader.set_up(Extent::new(2, 2), PixelFormat::Rgb565).unwrap();
        let surface = reader.window().unwrap();
        assert_eq!(
            surface.queue(0, vec![0_u8; 3]),
            Err(SurfaceError::FrameSize { expected: 8, actual: 3 })
        );

        reader.set_up(Extent::new(2, 2), PixelFormat::Private).unwrap();
        assert!(reader.window().unwrap().queue(0, vec![1_u8]).is_ok());
    }

    #[test]
    fn invalid_extent_is_rejected() {
        let reader = SharedImageReader::new();
        assert!(reader.set_up(Extent::new(0, 10), PixelFormat::Rgba8888).is_err());
        assert!(reader.window().is_none());
        assert!(reader.latest_buffer().is_none());
    }
}
