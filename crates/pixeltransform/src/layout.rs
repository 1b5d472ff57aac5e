use bytemuck::{Pod, Zeroable};

use crate::types::{Extent, ImageOrientation, VideoGravity};

/// One corner of the presentation quad as the vertex shader consumes it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Normalized device coordinates within the viewport, y pointing up.
    pub position: [f32; 2],
    /// Source texture coordinates, origin at the top-left texel.
    pub tex_coord: [f32; 2],
}

unsafe impl Zeroable for Vertex {}
unsafe impl Pod for Vertex {}

/// Quad geometry and viewport for drawing one source frame onto a surface.
///
/// Vertices are ordered top-left, top-right, bottom-left, bottom-right so they
/// can be drawn as a four vertex triangle strip. They always span the whole
/// viewport; letterboxing lives in `viewport` alone.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadLayout {
    pub vertices: [Vertex; 4],
    /// `[x, y, width, height]` in surface pixels, origin at the top-left.
    pub viewport: [f32; 4],
}

unsafe impl Zeroable for QuadLayout {}
unsafe impl Pod for QuadLayout {}

impl QuadLayout {
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Maps a `source` frame onto a `surface` after rotating it by `orientation`.
///
/// Gravity decides how the rotated frame is scaled:
/// * `ResizeAspect` scales by the smaller ratio and centres the quad, leaving
///   symmetric bars on one axis.
/// * `ResizeAspectFill` scales by the larger ratio, keeps the quad full screen
///   and crops the texture coordinates symmetrically.
/// * `Resize` covers the surface with the whole frame.
pub fn compute_layout(
    source: Extent,
    surface: Extent,
    orientation: ImageOrientation,
    gravity: VideoGravity,
) -> QuadLayout {
    let rotated = if orientation.is_transposed() {
        source.transposed()
    } else {
        source
    };
    let (source_w, source_h) = (rotated.width.max(1) as f32, rotated.height.max(1) as f32);
    let (surface_w, surface_h) = (surface.width.max(1) as f32, surface.height.max(1) as f32);

    // Share of the surface covered by the quad and the visible fraction of
    // the frame.
    let (cover_w, cover_h, visible_u, visible_v) = match gravity {
        VideoGravity::Resize => (1.0, 1.0, 1.0, 1.0),
        VideoGravity::ResizeAspect => {
            let scale = (surface_w / source_w).min(surface_h / source_h);
            (
                (source_w * scale / surface_w).min(1.0),
                (source_h * scale / surface_h).min(1.0),
                1.0,
                1.0,
            )
        }
        VideoGravity::ResizeAspectFill => {
            let scale = (surface_w / source_w).max(surface_h / source_h);
            (
                1.0,
                1.0,
                (surface_w / (source_w * scale)).min(1.0),
                (surface_h / (source_h * scale)).min(1.0),
            )
        }
    };

    let (u0, u1) = ((1.0 - visible_u) * 0.5, (1.0 + visible_u) * 0.5);
    let (v0, v1) = ((1.0 - visible_v) * 0.5, (1.0 + visible_v) * 0.5);
    let corner = |x: f32, y: f32, u: f32, v: f32| Vertex {
        position: [x, y],
        tex_coord: oriented_tex_coord(orientation, u, v),
    };

    let viewport_w = surface_w * cover_w;
    let viewport_h = surface_h * cover_h;
    QuadLayout {
        vertices: [
            corner(-1.0, 1.0, u0, v0),
            corner(1.0, 1.0, u1, v0),
            corner(-1.0, -1.0, u0, v1),
            corner(1.0, -1.0, u1, v1),
        ],
        viewport: [
            (surface_w - viewport_w) * 0.5,
            (surface_h - viewport_h) * 0.5,
            viewport_w,
            viewport_h,
        ],
    }
}

/// Maps display-space coordinates back into the unrotated source frame.
fn oriented_tex_coord(orientation: ImageOrientation, u: f32, v: f32) -> [f32; 2] {
    match orientation {
        ImageOrientation::Up => [u, v],
        ImageOrientation::Right => [v, 1.0 - u],
        ImageOrientation::Down => [1.0 - u, 1.0 - v],
        ImageOrientation::Left => [1.0 - v, u],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn close(actual: f32, expected: f32) -> bool {
        (actual - expected).abs() < EPSILON
    }

    fn tex(layout: &QuadLayout) -> [[f32; 2]; 4] {
        layout.vertices.map(|vertex| vertex.tex_coord)
    }

    #[test]
    fn landscape_into_portrait_fit_letterboxes_vertically() {
        let layout = compute_layout(
            Extent::new(1920, 1080),
            Extent::new(1080, 1920),
            ImageOrientation::Up,
            VideoGravity::ResizeAspect,
        );
        let [x, y, width, height] = layout.viewport;
        assert!(close(x, 0.0));
        assert!(close(width, 1080.0));
        assert!(close(height, 607.5));
        assert!(close(y, 656.25));
        assert_eq!(layout.vertices[0].position, [-1.0, 1.0]);
        assert_eq!(tex(&layout), [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
    }

    #[test]
    fn landscape_into_portrait_fill_crops_horizontally() {
        let layout = compute_layout(
            Extent::new(1920, 1080),
            Extent::new(1080, 1920),
            ImageOrientation::Up,
            VideoGravity::ResizeAspectFill,
        );
        assert_eq!(layout.viewport, [0.0, 0.0, 1080.0, 1920.0]);
        let visible = 1080.0 / (1920.0 * (1920.0 / 1080.0));
        let coords = tex(&layout);
        assert!(close(coords[0][0], (1.0 - visible) / 2.0));
        assert!(close(coords[1][0], (1.0 + visible) / 2.0));
        assert!(close(coords[0][1], 0.0));
        assert!(close(coords[3][1], 1.0));
    }

    /// Surface rectangle the quad lands on once NDC is mapped onto the
    /// viewport, as `[left, top, right, bottom]`.
    fn rendered_rect(layout: &QuadLayout) -> [f32; 4] {
        let [x, y, width, height] = layout.viewport;
        let to_surface = |[nx, ny]: [f32; 2]| {
            (x + (nx + 1.0) * 0.5 * width, y + (1.0 - ny) * 0.5 * height)
        };
        let (left, top) = to_surface(layout.vertices[0].position);
        let (right, bottom) = to_surface(layout.vertices[3].position);
        [left, top, right, bottom]
    }

    #[test]
    fn rendered_rect_matches_letterbox() {
        let fit = compute_layout(
            Extent::new(1920, 1080),
            Extent::new(1080, 1920),
            ImageOrientation::Up,
            VideoGravity::ResizeAspect,
        );
        let [left, top, right, bottom] = rendered_rect(&fit);
        assert!(close(left, 0.0) && close(right, 1080.0));
        assert!(close(top, 656.25) && close(bottom, 656.25 + 607.5));
        assert!(close((right - left) / (bottom - top), 1920.0 / 1080.0));

        let pillarbox = compute_layout(
            Extent::new(1920, 1080),
            Extent::new(1920, 1080),
            ImageOrientation::Right,
            VideoGravity::ResizeAspect,
        );
        let [left, top, right, bottom] = rendered_rect(&pillarbox);
        assert!(close(right - left, 607.5) && close(bottom - top, 1080.0));

        let fill = compute_layout(
            Extent::new(1920, 1080),
            Extent::new(1080, 1920),
            ImageOrientation::Up,
            VideoGravity::ResizeAspectFill,
        );
        assert_eq!(rendered_rect(&fill), [0.0, 0.0, 1080.0, 1920.0]);
    }

    #[test]
    fn stretch_covers_surface_with_whole_frame() {
        let layout = compute_layout(
            Extent::new(640, 480),
            Extent::new(1920, 1080),
            ImageOrientation::Up,
            VideoGravity::Resize,
        );
        assert_eq!(layout.viewport, [0.0, 0.0, 1920.0, 1080.0]);
        assert_eq!(layout.vertices[0].position, [-1.0, 1.0]);
        assert_eq!(layout.vertices[3].position, [1.0, -1.0]);
        assert_eq!(tex(&layout), [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
    }

    #[test]
    fn quarter_turn_swaps_axes_before_fitting() {
        let layout = compute_layout(
            Extent::new(1920, 1080),
            Extent::new(1080, 1920),
            ImageOrientation::Right,
            VideoGravity::ResizeAspect,
        );
        assert_eq!(layout.viewport, [0.0, 0.0, 1080.0, 1920.0]);
        // Top-left of the display samples the bottom-left of the source.
        assert_eq!(tex(&layout), [[0.0, 1.0], [0.0, 0.0], [1.0, 1.0], [1.0, 0.0]]);
    }

    #[test]
    fn quarter_turn_into_landscape_pillarboxes_or_crops() {
        let source = Extent::new(1920, 1080);
        let surface = Extent::new(1920, 1080);
        let fit = compute_layout(source, surface, ImageOrientation::Right, VideoGravity::ResizeAspect);
        let [x, _, width, height] = fit.viewport;
        assert!(close(width, 607.5));
        assert!(close(height, 1080.0));
        assert!(close(x, (1920.0 - 607.5) / 2.0));
        assert_eq!(tex(&fit)[0], [0.0, 1.0]);

        let fill = compute_layout(
            source,
            surface,
            ImageOrientation::Right,
            VideoGravity::ResizeAspectFill,
        );
        assert_eq!(fill.viewport, [0.0, 0.0, 1920.0, 1080.0]);
        let visible = 1080.0 / (1920.0 * (1920.0 / 1080.0));
        // The crop runs along the display's vertical axis, which is the
        // source's horizontal axis after a quarter turn.
        let top_left = tex(&fill)[0];
        assert!(close(top_left[0], (1.0 - visible) / 2.0));
        assert!(close(top_left[1], 1.0));
    }

    #[test]
    fn half_and_three_quarter_turns_mirror_coordinates() {
        let surface = Extent::new(800, 800);
        let source = Extent::new(800, 800);
        let down = compute_layout(source, surface, ImageOrientation::Down, VideoGravity::Resize);
        assert_eq!(tex(&down), [[1.0, 1.0], [0.0, 1.0], [1.0, 0.0], [0.0, 0.0]]);
        let left = compute_layout(source, surface, ImageOrientation::Left, VideoGravity::Resize);
        assert_eq!(tex(&left), [[1.0, 0.0], [1.0, 1.0], [0.0, 0.0], [0.0, 1.0]]);
    }

    #[test]
    fn matching_aspect_is_identical_across_fit_and_fill() {
        let source = Extent::new(1280, 720);
        let surface = Extent::new(1920, 1080);
        let fit = compute_layout(source, surface, ImageOrientation::Up, VideoGravity::ResizeAspect);
        let fill = compute_layout(
            source,
            surface,
            ImageOrientation::Up,
            VideoGravity::ResizeAspectFill,
        );
        for (a, b) in fit.vertices.iter().zip(fill.vertices.iter()) {
            assert!(close(a.position[0], b.position[0]) && close(a.position[1], b.position[1]));
            assert!(close(a.tex_coord[0], b.tex_coord[0]) && close(a.tex_coord[1], b.tex_coord[1]));
        }
    }

    #[test]
    fn layout_is_plain_old_data() {
        let layout = compute_layout(
            Extent::new(2, 2),
            Extent::new(2, 2),
            ImageOrientation::Up,
            VideoGravity::Resize,
        );
        assert_eq!(layout.as_bytes().len(), 80);
    }
}
