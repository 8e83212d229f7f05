//! Triangle-wise inverse-mapping renderer.
//!
//! Loaded source images are first stitched into one raster in triangulated
//! source space. Each target triangle is then filled by mapping its pixel
//! centres through the triangle's affine target→source transform and
//! sampling the stitched raster.

use tracing::trace;

use crate::affine::Affine;
use crate::canvas::{Canvas, ALPHA};
use crate::error::ReprojError;
use crate::extent::Extent;
use crate::reproj::triangulation::Triangulation;
use crate::resample::{nearest, ResamplingMethod};

/// Tolerance of the point-in-triangle test, in barycentric units.
const INSIDE_EPSILON: f64 = 1e-6;

/// A loaded source image placed in triangulated source space.
#[derive(Clone, Copy, Debug)]
pub struct RenderSource<'a> {
    pub extent: Extent,
    pub canvas: &'a Canvas,
}

/// Render `triangulation` into a `width` x `height` canvas covering
/// `target_extent`.
///
/// Target pixels outside every source stay transparent.
#[allow(clippy::too_many_arguments)]
pub fn render(
    width: usize,
    height: usize,
    pixel_ratio: f64,
    source_resolution: f64,
    target_extent: &Extent,
    target_resolution: f64,
    triangulation: &Triangulation,
    sources: &[RenderSource<'_>],
    method: ResamplingMethod,
) -> Result<Canvas, ReprojError> {
    if width == 0 || height == 0 {
        return Err(ReprojError::DegenerateGeometry(format!(
            "target canvas is {width}x{height}"
        )));
    }
    let scale = pixel_ratio / source_resolution;
    if !(scale.is_finite() && scale > 0.0) {
        return Err(ReprojError::DegenerateGeometry(format!(
            "invalid stitch scale {scale}"
        )));
    }

    let (stitched, stitched_extent) = stitch(sources, scale)?;
    let view = stitched.view();

    let top_left = target_extent.top_left();
    let target_scale = pixel_ratio / target_resolution;
    let to_target_px = |p: [f64; 2]| {
        [
            (p[0] - top_left[0]) * target_scale,
            (top_left[1] - p[1]) * target_scale,
        ]
    };
    let to_source_px = |p: [f64; 2]| {
        [
            (p[0] - stitched_extent.min_x) * scale,
            (stitched_extent.max_y - p[1]) * scale,
        ]
    };

    let mut out = Canvas::new(width, height);
    let mut skipped = 0usize;

    for triangle in triangulation.triangles() {
        let t = triangle.target.map(to_target_px);
        let s = triangle.source.map(to_source_px);
        if !t.iter().chain(s.iter()).all(|p| p[0].is_finite() && p[1].is_finite()) {
            skipped += 1;
            continue;
        }

        // Relative to the first vertex, for numerical stability.
        let t_rel = t.map(|p| [p[0] - t[0][0], p[1] - t[0][1]]);
        let s_rel = s.map(|p| [p[0] - s[0][0], p[1] - s[0][1]]);
        let Ok(affine) = Affine::from_triangles(&t_rel, &s_rel) else {
            skipped += 1;
            continue;
        };

        let (min_u, max_u) = min_max(t.iter().map(|p| p[0]));
        let (min_v, max_v) = min_max(t.iter().map(|p| p[1]));
        let col0 = min_u.floor().max(0.0) as usize;
        let col1 = max_u.ceil().min(width as f64).max(0.0) as usize;
        let row0 = min_v.floor().max(0.0) as usize;
        let row1 = max_v.ceil().min(height as f64).max(0.0) as usize;

        for row in row0..row1 {
            let v = row as f64 + 0.5;
            for col in col0..col1 {
                let u = col as f64 + 0.5;
                if !contains(&t, u, v) {
                    continue;
                }
                let (sx, sy) = affine.forward(u - t[0][0], v - t[0][1]);
                if let Some(px) = method.sample(&view, sx + s[0][0], sy + s[0][1]) {
                    if px[ALPHA] > 0 {
                        out.put_pixel(col, row, px);
                    }
                }
            }
        }
    }

    trace!(
        width,
        height,
        triangles = triangulation.triangles().len(),
        skipped,
        stitched_width = stitched.width(),
        stitched_height = stitched.height(),
        "rendered reprojected image"
    );
    Ok(out)
}

/// Draw every source into one raster at `scale` pixels per source unit.
fn stitch(sources: &[RenderSource<'_>], scale: f64) -> Result<(Canvas, Extent), ReprojError> {
    let mut extent = Extent::empty();
    for source in sources {
        extent.extend(&source.extent);
    }
    if extent.is_empty() || !extent.is_finite() {
        return Err(ReprojError::DegenerateGeometry(
            "no source image covers a finite area".into(),
        ));
    }

    let width = (extent.width() * scale).round();
    let height = (extent.height() * scale).round();
    if !(width >= 1.0 && height >= 1.0 && width.is_finite() && height.is_finite()) {
        return Err(ReprojError::DegenerateGeometry(format!(
            "stitched source raster would be {width}x{height}"
        )));
    }
    let mut canvas = Canvas::new(width as usize, height as usize);

    for source in sources {
        if source.canvas.is_empty() || source.extent.is_empty() {
            continue;
        }
        let x0 = (source.extent.min_x - extent.min_x) * scale;
        let y0 = (extent.max_y - source.extent.max_y) * scale;
        let w = source.extent.width() * scale;
        let h = source.extent.height() * scale;
        let sx = source.canvas.width() as f64 / w;
        let sy = source.canvas.height() as f64 / h;

        let col0 = x0.round().max(0.0) as usize;
        let col1 = (x0 + w).round().min(width) as usize;
        let row0 = y0.round().max(0.0) as usize;
        let row1 = (y0 + h).round().min(height) as usize;

        let view = source.canvas.view();
        for row in row0..row1 {
            let v = (row as f64 + 0.5 - y0) * sy;
            for col in col0..col1 {
                let u = (col as f64 + 0.5 - x0) * sx;
                if let Some(px) = nearest::sample(&view, u, v) {
                    if px[ALPHA] > 0 {
                        canvas.put_pixel(col, row, px);
                    }
                }
            }
        }
    }

    Ok((canvas, extent))
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Barycentric point-in-triangle test, inclusive of the edges.
fn contains(t: &[[f64; 2]; 3], x: f64, y: f64) -> bool {
    let [[x0, y0], [x1, y1], [x2, y2]] = *t;
    let d = (y1 - y2) * (x0 - x2) + (x2 - x1) * (y0 - y2);
    if d == 0.0 {
        return false;
    }
    let l0 = ((y1 - y2) * (x - x2) + (x2 - x1) * (y - y2)) / d;
    let l1 = ((y2 - y0) * (x - x2) + (x0 - x2) * (y - y2)) / d;
    let l2 = 1.0 - l0 - l1;
    l0 >= -INSIDE_EPSILON && l1 >= -INSIDE_EPSILON && l2 >= -INSIDE_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::TRANSPARENT;
    use crate::proj::{Projection, TransformFn, Units};
    use crate::reproj::triangulation::TriangulationParams;

    fn colour(col: usize, row: usize) -> [u8; 4] {
        [(col * 40) as u8, (row * 40) as u8, 7, 255]
    }

    fn checker(size: usize) -> Canvas {
        let mut canvas = Canvas::new(size, size);
        for row in 0..size {
            for col in 0..size {
                canvas.put_pixel(col, row, colour(col, row));
            }
        }
        canvas
    }

    fn identity_triangulation(extent: &Extent) -> Triangulation {
        Triangulation::new(
            &Projection::new("A", Units::Meters),
            &Projection::new("B", Units::Meters),
            &TransformFn::identity(),
            extent,
            None,
            TriangulationParams::default(),
        )
    }

    #[test]
    fn test_identity_render_copies_pixels() {
        let extent = Extent::new(0.0, 0.0, 4.0, 4.0);
        let source = checker(4);
        let tri = identity_triangulation(&extent);
        for method in [ResamplingMethod::Nearest, ResamplingMethod::Bilinear] {
            let out = render(
                4,
                4,
                1.0,
                1.0,
                &extent,
                1.0,
                &tri,
                &[RenderSource {
                    extent,
                    canvas: &source,
                }],
                method,
            )
            .unwrap();
            for row in 0..4 {
                for col in 0..4 {
                    assert_eq!(out.pixel(col, row), Some(colour(col, row)), "{method:?}");
                }
            }
        }
    }

    #[test]
    fn test_uncovered_pixels_stay_transparent() {
        let extent = Extent::new(0.0, 0.0, 4.0, 4.0);
        let left_half = Canvas::filled(2, 4, [255, 0, 0, 255]);
        let tri = identity_triangulation(&extent);
        let out = render(
            4,
            4,
            1.0,
            1.0,
            &extent,
            1.0,
            &tri,
            &[RenderSource {
                extent: Extent::new(0.0, 0.0, 2.0, 4.0),
                canvas: &left_half,
            }],
            ResamplingMethod::Nearest,
        )
        .unwrap();
        assert_eq!(out.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(out.pixel(1, 3), Some([255, 0, 0, 255]));
        assert_eq!(out.pixel(2, 0), Some(TRANSPARENT));
        assert_eq!(out.pixel(3, 3), Some(TRANSPARENT));
        assert_eq!(out.opaque_pixel_count(), 8);
    }

    #[test]
    fn test_sources_are_stitched() {
        let extent = Extent::new(0.0, 0.0, 4.0, 2.0);
        let red = Canvas::filled(2, 2, [255, 0, 0, 255]);
        let blue = Canvas::filled(2, 2, [0, 0, 255, 255]);
        let tri = identity_triangulation(&extent);
        let out = render(
            8,
            4,
            2.0,
            1.0,
            &extent,
            1.0,
            &tri,
            &[
                RenderSource {
                    extent: Extent::new(0.0, 0.0, 2.0, 2.0),
                    canvas: &red,
                },
                RenderSource {
                    extent: Extent::new(2.0, 0.0, 4.0, 2.0),
                    canvas: &blue,
                },
            ],
            ResamplingMethod::Nearest,
        )
        .unwrap();
        assert_eq!(out.opaque_pixel_count(), 32);
        assert_eq!(out.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(out.pixel(3, 3), Some([255, 0, 0, 255]));
        assert_eq!(out.pixel(4, 0), Some([0, 0, 255, 255]));
        assert_eq!(out.pixel(7, 3), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_shifted_source() {
        // Target x = source x - 100
        let extent = Extent::new(0.0, 0.0, 4.0, 4.0);
        let tri = Triangulation::new(
            &Projection::new("A", Units::Meters),
            &Projection::new("B", Units::Meters),
            &TransformFn::from_point_fn(|x, y| (x + 100.0, y)),
            &extent,
            None,
            TriangulationParams::default(),
        );
        let source = checker(4);
        let out = render(
            4,
            4,
            1.0,
            1.0,
            &extent,
            1.0,
            &tri,
            &[RenderSource {
                extent: Extent::new(100.0, 0.0, 104.0, 4.0),
                canvas: &source,
            }],
            ResamplingMethod::Nearest,
        )
        .unwrap();
        assert_eq!(out.pixel(1, 2), Some(colour(1, 2)));
        assert_eq!(out.pixel(3, 0), Some(colour(3, 0)));
    }

    #[test]
    fn test_no_sources_is_degenerate() {
        let extent = Extent::new(0.0, 0.0, 4.0, 4.0);
        let tri = identity_triangulation(&extent);
        let result = render(4, 4, 1.0, 1.0, &extent, 1.0, &tri, &[], ResamplingMethod::Nearest);
        assert!(matches!(result, Err(ReprojError::DegenerateGeometry(_))));
    }

    #[test]
    fn test_contains() {
        let t = [[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]];
        assert!(contains(&t, 1.0, 1.0));
        assert!(contains(&t, 2.0, 2.0));
        assert!(!contains(&t, 3.0, 3.0));
        assert!(!contains(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]], 1.0, 1.0));
    }
}
