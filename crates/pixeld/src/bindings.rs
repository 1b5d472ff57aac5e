use pixelconfig::{Filter, FrameFormat, Gravity, Rotation};
use pixeltransform::{ImageOrientation, PixelFormat, ResampleFilter, SurfaceRotation, VideoGravity};

pub fn video_gravity(gravity: Gravity) -> VideoGravity {
    match gravity {
        Gravity::Fit => VideoGravity::ResizeAspect,
        Gravity::Fill => VideoGravity::ResizeAspectFill,
        Gravity::Stretch => VideoGravity::Resize,
    }
}

pub fn resample_filter(filter: Filter) -> ResampleFilter {
    match filter {
        Filter::Nearest => ResampleFilter::Nearest,
        Filter::Linear => ResampleFilter::Linear,
    }
}

pub fn pixel_format(format: FrameFormat) -> PixelFormat {
    match format {
        FrameFormat::Rgba8888 => PixelFormat::Rgba8888,
        FrameFormat::Rgbx8888 => PixelFormat::Rgbx8888,
        FrameFormat::Rgb888 => PixelFormat::Rgb888,
        FrameFormat::Rgb565 => PixelFormat::Rgb565,
        FrameFormat::Yuv420 => PixelFormat::Yuv420,
    }
}

pub fn image_orientation(rotation: Rotation) -> ImageOrientation {
    ImageOrientation::from_degrees(rotation.degrees())
}

pub fn surface_rotation(rotation: Rotation) -> SurfaceRotation {
    match rotation {
        Rotation::Deg0 => SurfaceRotation::Rotation0,
        Rotation::Deg90 => SurfaceRotation::Rotation90,
        Rotation::Deg180 => SurfaceRotation::Rotation180,
        Rotation::Deg270 => SurfaceRotation::Rotation270,
    }
}
