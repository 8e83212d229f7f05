//! Projections defined by PROJ strings, backed by proj4rs.
//!
//! proj4rs works in radians for geographic CRS while registered transforms
//! use degrees; [`Proj4Transform`] converts on both ends.

use std::sync::Arc;

use proj4rs::Proj;
use tracing::debug;

use crate::error::ProjError;
use crate::proj::pipeline::INTERMEDIATE_CODE;
use crate::proj::projections::ProjectionRegistry;
use crate::proj::transforms::{TransformFn, TransformRegistry};
use crate::proj::{Projection, Units};

/// PROJ definition of the intermediate projection.
pub const WGS84_LONGLAT: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// A single-direction transform between two PROJ definitions.
pub struct Proj4Transform {
    src: Proj,
    dst: Proj,
    src_is_geo: bool,
    dst_is_geo: bool,
}

impl Proj4Transform {
    pub fn new(src_def: &str, dst_def: &str) -> Result<Self, ProjError> {
        let src = parse(src_def)?;
        let dst = parse(dst_def)?;
        let src_is_geo = src.is_latlong();
        let dst_is_geo = dst.is_latlong();
        Ok(Self {
            src,
            dst,
            src_is_geo,
            dst_is_geo,
        })
    }

    /// Transform a point from the source to the destination definition, in
    /// native units (degrees for geographic, metres for projected).
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64), ProjError> {
        let mut point = if self.src_is_geo {
            (x.to_radians(), y.to_radians())
        } else {
            (x, y)
        };

        proj4rs::transform::transform(&self.src, &self.dst, &mut point)
            .map_err(|e| ProjError::TransformFailed(e.to_string()))?;

        if self.dst_is_geo {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok(point)
        }
    }

    /// Wrap into a registry transform. Points that fail to transform become NaN.
    pub fn into_transform_fn(self) -> TransformFn {
        TransformFn::from_point_fn(move |x, y| {
            self.transform_point(x, y).unwrap_or((f64::NAN, f64::NAN))
        })
    }
}

fn parse(definition: &str) -> Result<Proj, ProjError> {
    Proj::from_proj_string(definition)
        .map_err(|e| ProjError::InvalidDefinition(format!("{definition}: {e}")))
}

/// Define `code` from a PROJ string and register transforms between it and
/// EPSG:4326. Transforms to other projections resolve through EPSG:4326.
pub fn register(
    projections: &mut ProjectionRegistry,
    transforms: &mut TransformRegistry,
    code: &str,
    definition: &str,
) -> Result<Arc<Projection>, ProjError> {
    let proj = parse(definition)?;
    let units = if proj.is_latlong() {
        Units::Degrees
    } else {
        Units::Meters
    };

    let to_common = Proj4Transform::new(definition, WGS84_LONGLAT)?;
    let from_common = Proj4Transform::new(WGS84_LONGLAT, definition)?;
    transforms.add(code, INTERMEDIATE_CODE, to_common.into_transform_fn());
    transforms.add(INTERMEDIATE_CODE, code, from_common.into_transform_fn());

    debug!(code, definition, "registered proj4 projection");
    Ok(projections.add(Projection::new(code, units)))
}
