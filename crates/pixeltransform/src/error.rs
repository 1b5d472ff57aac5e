use std::io;

use thiserror::Error;

/// Raised when a raw integer from a calling layer does not name a known value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} value {value}")]
pub struct ParseValueError {
    pub kind: &'static str,
    pub value: i32,
}

impl ParseValueError {
    pub fn new(kind: &'static str, value: i32) -> Self {
        Self { kind, value }
    }
}

/// Failures that end the current frame.
///
/// Everything except device loss and submission failure is expected churn
/// (surface torn down, reader reconfigured) and only skips the frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("kernel is not available")]
    Unavailable,
    #[error("texture has no binding for swapchain image {0}")]
    Unbound(u32),
    #[error("buffer extent {buffer} does not match texture extent {texture}")]
    ExtentMismatch { buffer: String, texture: String },
    #[error("draw_frame called while another draw is in flight")]
    Reentrant,
    #[error("GPU device lost: {0}")]
    DeviceLost(String),
    #[error("command submission failed: {0}")]
    Submission(String),
}

impl FrameError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FrameError::DeviceLost(_) | FrameError::Submission(_))
    }
}

/// Errors reported by an image reader while (re)provisioning its surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReaderError {
    #[error("input surface extent {0} is invalid")]
    InvalidExtent(String),
    #[error("image reader could not allocate its surface: {0}")]
    Allocation(String),
}

/// Errors a producer sees when writing into an input surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("input surface was abandoned by a reader reconfiguration")]
    Abandoned,
    #[error("frame holds {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
}

/// Reasons the graphics runtime could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    #[error("graphics loader unavailable: {0}")]
    Unavailable(String),
    #[error("graphics loader query failed: {0}")]
    Query(String),
    #[error("required instance extension {0} is missing")]
    MissingExtension(String),
}

/// Lifecycle and fatal failures surfaced to the owner of a pipeline.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to spawn render thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("render thread panicked")]
    RenderThreadPanicked,
    #[error("render loop stopped: {0}")]
    Render(#[source] FrameError),
    #[error(transparent)]
    Reader(#[from] ReaderError),
}
