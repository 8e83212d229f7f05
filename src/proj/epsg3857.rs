//! Spherical Web Mercator (EPSG:3857) and its aliases.
//!
//!   forward: x = R·λ, y = R·ln(tan(π/4 + φ/2))
//!   inverse: λ = x/R, φ = 2·atan(exp(y/R)) - π/2

use std::f64::consts::PI;

use crate::extent::Extent;
use crate::proj::{Projection, TransformFn, Units};

/// Radius of the Web Mercator sphere (metres).
pub const RADIUS: f64 = 6_378_137.0;

/// Half of the projected world width: π·R.
pub const HALF_SIZE: f64 = PI * RADIUS;

pub const EXTENT: Extent = Extent::new(-HALF_SIZE, -HALF_SIZE, HALF_SIZE, HALF_SIZE);

/// Latitude range in which the square extent is valid (≈ ±85.0511°, rounded).
pub const WORLD_EXTENT: Extent = Extent::new(-180.0, -85.0, 180.0, 85.0);

/// Codes that all name this projection.
pub const CODES: &[&str] = &[
    "EPSG:3857",
    "EPSG:102100",
    "EPSG:102113",
    "EPSG:900913",
    "http://www.opengis.net/def/crs/EPSG/0/3857",
    "http://www.opengis.net/gml/srs/epsg.xml#3857",
];

/// Web Mercator projection registered under `code`.
pub fn projection(code: &str) -> Projection {
    Projection::new(code, Units::Meters)
        .with_extent(EXTENT)
        .with_world_extent(WORLD_EXTENT)
        .with_global(true)
        .with_point_resolution(|resolution, point| resolution / (point[1] / RADIUS).cosh())
}

/// One projection per alias in [`CODES`].
pub fn projections() -> Vec<Projection> {
    CODES.iter().map(|code| projection(code)).collect()
}

/// lon/lat degrees → Web Mercator metres.
///
/// Latitudes beyond the square extent are clamped to its top/bottom edge.
pub fn from_epsg4326() -> TransformFn {
    TransformFn::from_point_fn(|lon, lat| {
        let x = RADIUS * PI * lon / 180.0;
        let y = RADIUS * (PI * (lat + 90.0) / 360.0).tan().ln();
        (x, y.clamp(-HALF_SIZE, HALF_SIZE))
    })
}

/// Web Mercator metres → lon/lat degrees.
pub fn to_epsg4326() -> TransformFn {
    TransformFn::from_point_fn(|x, y| {
        let lon = 180.0 * x / HALF_SIZE;
        let lat = 360.0 * (y / RADIUS).exp().atan() / PI - 90.0;
        (lon, lat)
    })
}
