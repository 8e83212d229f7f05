//! Geographic WGS 84 (EPSG:4326) and its aliases.

use std::f64::consts::PI;

use crate::extent::Extent;
use crate::proj::{Projection, Units};

/// Semi-major axis of the WGS 84 ellipsoid (metres).
pub const RADIUS: f64 = 6_378_137.0;

pub const EXTENT: Extent = Extent::new(-180.0, -90.0, 180.0, 90.0);

/// Length of one degree on the equator.
pub const METERS_PER_UNIT: f64 = PI * RADIUS / 180.0;

/// Aliases with their axis orientation. The orientation is descriptive only;
/// coordinates are always handled as (lon, lat).
pub const CODES: &[(&str, &str)] = &[
    ("CRS:84", "enu"),
    ("EPSG:4326", "neu"),
    ("urn:ogc:def:crs:OGC:1.3:CRS84", "enu"),
    ("urn:ogc:def:crs:OGC:2:84", "enu"),
    ("http://www.opengis.net/def/crs/OGC/1.3/CRS84", "enu"),
    ("http://www.opengis.net/gml/srs/epsg.xml#4326", "enu"),
    ("http://www.opengis.net/def/crs/EPSG/0/4326", "neu"),
    ("urn:ogc:def:crs:EPSG::4326", "neu"),
];

pub fn projection(code: &str, axis_orientation: &str) -> Projection {
    Projection::new(code, Units::Degrees)
        .with_extent(EXTENT)
        .with_world_extent(EXTENT)
        .with_axis_orientation(axis_orientation)
        .with_global(true)
        .with_meters_per_unit(METERS_PER_UNIT)
}

/// One projection per alias in [`CODES`].
pub fn projections() -> Vec<Projection> {
    CODES
        .iter()
        .map(|(code, axis)| projection(code, axis))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_meters_per_unit() {
        let p = projection("EPSG:4326", "neu");
        assert_relative_eq!(p.meters_per_unit().unwrap(), 111_319.490_793_273_58, epsilon = 1e-6);
        assert_eq!(p.axis_orientation(), "neu");
    }

    #[test]
    fn test_all_aliases_wrap() {
        let all = projections();
        assert_eq!(all.len(), CODES.len());
        assert!(all.iter().all(|p| p.can_wrap_x() && p.units() == Units::Degrees));
    }
}
