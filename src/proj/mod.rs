//! Projections, the transform registry, and transform lookup.

pub mod epsg3857;
pub mod epsg4326;
pub mod pipeline;
pub mod proj4;
pub mod projections;
pub mod transforms;

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use crate::extent::Extent;

pub use pipeline::{
    add_common, add_coordinate_transforms, add_equivalent_projections,
    add_equivalent_transforms, equivalent, get_transform, get_transform_from_projections,
    register_common, transform, transform_extent, INTERMEDIATE_CODE,
};
pub use projections::ProjectionRegistry;
pub use transforms::{TransformFn, TransformRegistry};

/// Mean earth radius used for great-circle distances (metres).
pub const SPHERE_RADIUS: f64 = 6_371_008.8;

/// Radius of the normal sphere used by the unit conversion table.
const NORMAL_SPHERE_RADIUS: f64 = 6_370_997.0;

/// Units of a projection's coordinate space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Units {
    Radians,
    Degrees,
    Feet,
    Meters,
    Pixels,
    TilePixels,
    UsFeet,
}

impl Units {
    /// Parse from a unit name ("degrees", "m", "ft", "us-ft", ...).
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "radians" => Some(Self::Radians),
            "degrees" => Some(Self::Degrees),
            "ft" => Some(Self::Feet),
            "m" => Some(Self::Meters),
            "pixels" => Some(Self::Pixels),
            "tile-pixels" => Some(Self::TilePixels),
            "us-ft" => Some(Self::UsFeet),
            _ => None,
        }
    }

    /// Meters per unit, or `None` for screen-space units.
    pub fn meters_per_unit(&self) -> Option<f64> {
        match self {
            Self::Radians => Some(NORMAL_SPHERE_RADIUS / (2.0 * PI)),
            Self::Degrees => Some(2.0 * PI * NORMAL_SPHERE_RADIUS / 360.0),
            Self::Feet => Some(0.3048),
            Self::Meters => Some(1.0),
            Self::UsFeet => Some(1200.0 / 3937.0),
            Self::Pixels | Self::TilePixels => None,
        }
    }
}

/// Computes the ground resolution at a point: `(resolution, [x, y]) -> resolution`.
pub type PointResolutionFn = Arc<dyn Fn(f64, [f64; 2]) -> f64 + Send + Sync>;

/// A coordinate reference system, identified by its code.
///
/// Only the code takes part in transform lookup; the remaining fields
/// describe the coordinate space (validity extent, wrapping, units).
#[derive(Clone)]
pub struct Projection {
    code: String,
    units: Units,
    extent: Option<Extent>,
    world_extent: Option<Extent>,
    axis_orientation: String,
    global: bool,
    meters_per_unit: Option<f64>,
    point_resolution: Option<PointResolutionFn>,
}

impl Projection {
    pub fn new(code: impl Into<String>, units: Units) -> Self {
        Self {
            code: code.into(),
            units,
            extent: None,
            world_extent: None,
            axis_orientation: "enu".to_string(),
            global: false,
            meters_per_unit: None,
            point_resolution: None,
        }
    }

    pub fn with_extent(mut self, extent: Extent) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn with_world_extent(mut self, world_extent: Extent) -> Self {
        self.world_extent = Some(world_extent);
        self
    }

    pub fn with_axis_orientation(mut self, axis_orientation: impl Into<String>) -> Self {
        self.axis_orientation = axis_orientation.into();
        self
    }

    /// Mark the projection as covering the whole world (enables x wrapping).
    pub fn with_global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    pub fn with_meters_per_unit(mut self, meters_per_unit: f64) -> Self {
        self.meters_per_unit = Some(meters_per_unit);
        self
    }

    pub fn with_point_resolution<F>(mut self, func: F) -> Self
    where
        F: Fn(f64, [f64; 2]) -> f64 + Send + Sync + 'static,
    {
        self.point_resolution = Some(Arc::new(func));
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn units(&self) -> Units {
        self.units
    }

    /// Validity extent in projection units.
    pub fn extent(&self) -> Option<&Extent> {
        self.extent.as_ref()
    }

    /// Validity extent in degrees.
    pub fn world_extent(&self) -> Option<&Extent> {
        self.world_extent.as_ref()
    }

    pub fn axis_orientation(&self) -> &str {
        &self.axis_orientation
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Whether x coordinates may be wrapped around the extent's width.
    pub fn can_wrap_x(&self) -> bool {
        self.global && self.extent.is_some()
    }

    pub fn meters_per_unit(&self) -> Option<f64> {
        self.meters_per_unit.or_else(|| self.units.meters_per_unit())
    }

    pub fn point_resolution_fn(&self) -> Option<&PointResolutionFn> {
        self.point_resolution.as_ref()
    }
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projection")
            .field("code", &self.code)
            .field("units", &self.units)
            .field("extent", &self.extent)
            .field("world_extent", &self.world_extent)
            .field("axis_orientation", &self.axis_orientation)
            .field("global", &self.global)
            .field("meters_per_unit", &self.meters_per_unit)
            .field("point_resolution", &self.point_resolution.is_some())
            .finish()
    }
}

/// Great-circle distance between two lon/lat points in degrees (haversine).
pub fn haversine_distance(c1: [f64; 2], c2: [f64; 2], radius: f64) -> f64 {
    let lat1 = c1[1].to_radians();
    let lat2 = c2[1].to_radians();
    let delta_lat_by2 = (lat2 - lat1) / 2.0;
    let delta_lon_by2 = (c2[0] - c1[0]).to_radians() / 2.0;
    let a = delta_lat_by2.sin() * delta_lat_by2.sin()
        + delta_lon_by2.sin() * delta_lon_by2.sin() * lat1.cos() * lat2.cos();
    2.0 * radius * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Ground resolution of `projection` at `point`, in projection units.
///
/// Projected resolutions are distorted away from the projection's true-scale
/// lines. Unless the projection supplies its own function, the resolution is
/// measured by projecting a one-pixel cross around `point` to EPSG:4326 and
/// averaging its great-circle width and height.
pub fn get_point_resolution(
    transforms: &TransformRegistry,
    projection: &Projection,
    resolution: f64,
    point: [f64; 2],
) -> f64 {
    if let Some(func) = projection.point_resolution_fn() {
        return func(resolution, point);
    }
    if projection.units() == Units::Degrees {
        return resolution;
    }

    let Some(to_4326) = pipeline::resolve_transform(transforms, projection.code(), INTERMEDIATE_CODE)
    else {
        return resolution;
    };
    if to_4326.is_identity() {
        return resolution;
    }

    let half = resolution / 2.0;
    let mut vertices = [
        point[0] - half,
        point[1],
        point[0] + half,
        point[1],
        point[0],
        point[1] - half,
        point[0],
        point[1] + half,
    ];
    to_4326.apply_in_place(&mut vertices, 2);
    let width = haversine_distance(
        [vertices[0], vertices[1]],
        [vertices[2], vertices[3]],
        SPHERE_RADIUS,
    );
    let height = haversine_distance(
        [vertices[4], vertices[5]],
        [vertices[6], vertices[7]],
        SPHERE_RADIUS,
    );
    let point_resolution = (width + height) / 2.0;
    match projection.meters_per_unit() {
        Some(mpu) => point_resolution / mpu,
        None => point_resolution,
    }
}
