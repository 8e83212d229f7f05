//! Raster reprojection: triangulation, source planning and rendering.

pub mod plan;
pub mod render;
pub mod triangulation;

use serde::{Deserialize, Serialize};

use crate::extent::Extent;
use crate::proj::{get_point_resolution, Projection, TransformFn, TransformRegistry};
use crate::resample::ResamplingMethod;

pub use plan::{plan_source_requests, SourceRequest};
pub use render::{render, RenderSource};
pub use triangulation::{Triangle, Triangulation, TriangulationParams, MAX_SUBDIVISION};

/// Default maximum triangulation error, in source pixels.
pub const ERROR_THRESHOLD: f64 = 0.5;

/// Tuning of a reprojection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReprojectionOptions {
    pub resampling: ResamplingMethod,
    /// Maximum triangulation error, in source pixels.
    pub error_threshold: f64,
    /// Base recursion depth of the triangulation.
    pub max_subdivision: u32,
}

impl Default for ReprojectionOptions {
    fn default() -> Self {
        Self {
            resampling: ResamplingMethod::default(),
            error_threshold: ERROR_THRESHOLD,
            max_subdivision: MAX_SUBDIVISION,
        }
    }
}

/// The projection's validity extent, unbounded in x when it wraps.
pub fn max_extent(projection: &Projection) -> Option<Extent> {
    let mut extent = *projection.extent()?;
    if projection.can_wrap_x() {
        extent.min_x = f64::NEG_INFINITY;
        extent.max_x = f64::INFINITY;
    }
    Some(extent)
}

/// Source resolution matching `target_resolution` at `target_center`.
///
/// The target resolution is converted to ground units at the centre and back
/// into source units; the source projection's own scale distortion at the
/// mapped centre is then compensated.
pub fn calculate_source_resolution(
    transforms: &TransformRegistry,
    source: &Projection,
    target: &Projection,
    target_to_source: &TransformFn,
    target_center: [f64; 2],
    target_resolution: f64,
) -> f64 {
    let (sx, sy) = target_to_source.transform_point(target_center[0], target_center[1]);
    let source_center = [sx, sy];

    let mut source_resolution =
        get_point_resolution(transforms, target, target_resolution, target_center);
    if let Some(mpu) = target.meters_per_unit() {
        source_resolution *= mpu;
    }
    if let Some(mpu) = source.meters_per_unit() {
        source_resolution /= mpu;
    }

    let in_source = source
        .extent()
        .map_or(true, |e| e.contains_xy(source_center[0], source_center[1]));
    if in_source {
        let compensation =
            get_point_resolution(transforms, source, source_resolution, source_center)
                / source_resolution;
        if compensation.is_finite() && compensation > 0.0 {
            source_resolution /= compensation;
        }
    }
    source_resolution
}

/// Pixel size of a raster covering `extent` at `resolution` and `pixel_ratio`.
///
/// Each axis is `ceil(length / resolution) * pixel_ratio`, rounded. Quotients
/// within 1e-9 of an integer count as exact so that float noise does not add
/// a column.
pub fn canvas_size(extent: &Extent, resolution: f64, pixel_ratio: f64) -> (usize, usize) {
    let pixels = |length: f64| {
        let q = length / resolution;
        if !q.is_finite() || q <= 0.0 {
            return 0;
        }
        let nearest = q.round();
        let cells = if (q - nearest).abs() < 1e-9 {
            nearest
        } else {
            q.ceil()
        };
        (cells * pixel_ratio).round().max(0.0) as usize
    };
    (pixels(extent.width()), pixels(extent.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proj::{epsg3857, epsg4326, Units};
    use approx::assert_relative_eq;

    #[test]
    fn test_canvas_size() {
        let extent = Extent::new(-180.0, -85.0, 180.0, 85.0);
        assert_eq!(canvas_size(&extent, 10.0, 1.0), (36, 17));
        assert_eq!(canvas_size(&extent, 10.0, 2.0), (72, 34));
        assert_eq!(canvas_size(&Extent::new(0.0, 0.0, 10.5, 1.0), 1.0, 1.0), (11, 1));
        assert_eq!(canvas_size(&Extent::new(0.0, 0.0, 0.3, 0.3), 0.1, 1.0), (3, 3));
        assert_eq!(canvas_size(&Extent::new(0.0, 0.0, 0.0, 1.0), 1.0, 1.0), (0, 1));
    }

    #[test]
    fn test_max_extent_unbounded_when_wrapping() {
        let wrapping = epsg3857::projection("EPSG:3857");
        let e = max_extent(&wrapping).unwrap();
        assert_eq!(e.min_x, f64::NEG_INFINITY);
        assert_eq!(e.max_y, epsg3857::HALF_SIZE);

        let local = Projection::new("LOCAL", Units::Meters)
            .with_extent(Extent::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(max_extent(&local), Some(Extent::new(0.0, 0.0, 10.0, 10.0)));
        assert_eq!(max_extent(&Projection::new("NONE", Units::Meters)), None);
    }

    #[test]
    fn test_source_resolution_mercator_to_geographic() {
        let transforms = TransformRegistry::new();
        let source = epsg4326::projection("EPSG:4326", "neu");
        let target = epsg3857::projection("EPSG:3857");
        let res = calculate_source_resolution(
            &transforms,
            &source,
            &target,
            &epsg3857::to_epsg4326(),
            [0.0, 0.0],
            10.0,
        );
        assert_relative_eq!(res, 10.0 / epsg4326::METERS_PER_UNIT, epsilon = 1e-15);
    }

    #[test]
    fn test_source_resolution_geographic_to_mercator() {
        let transforms = TransformRegistry::new();
        let source = epsg3857::projection("EPSG:3857");
        let target = epsg4326::projection("EPSG:4326", "neu");
        let res = calculate_source_resolution(
            &transforms,
            &source,
            &target,
            &epsg3857::from_epsg4326(),
            [0.0, 0.0],
            0.01,
        );
        assert_relative_eq!(res, 0.01 * epsg4326::METERS_PER_UNIT, epsilon = 1e-6);
    }

    #[test]
    fn test_options_defaults_and_parsing() {
        let defaults = ReprojectionOptions::default();
        assert_eq!(defaults.resampling, ResamplingMethod::Bilinear);
        assert_eq!(defaults.error_threshold, 0.5);
        assert_eq!(defaults.max_subdivision, 10);

        let parsed: ReprojectionOptions =
            serde_json::from_str(r#"{"resampling": "nearest"}"#).unwrap();
        assert_eq!(parsed.resampling, ResamplingMethod::Nearest);
        assert_eq!(parsed.error_threshold, ERROR_THRESHOLD);
    }
}
