//! Transform lookup between projections, including composite transforms
//! chained through a shared intermediate projection.

use crate::error::ProjError;
use crate::extent::Extent;
use crate::proj::projections::ProjectionRegistry;
use crate::proj::transforms::{TransformFn, TransformRegistry};
use crate::proj::{epsg3857, epsg4326, Projection};

/// Projection through which composite transforms are chained.
pub const INTERMEDIATE_CODE: &str = "EPSG:4326";

/// Resolve a transform between two codes.
///
/// Order: a directly registered transform, then the identity for equal
/// codes, then `source → EPSG:4326 → destination` when both legs exist.
pub fn resolve_transform(
    transforms: &TransformRegistry,
    source: &str,
    destination: &str,
) -> Option<TransformFn> {
    if let Some(direct) = transforms.get(source, destination) {
        return Some(direct);
    }
    if source == destination {
        return Some(TransformFn::identity());
    }

    let to_common = if source == INTERMEDIATE_CODE {
        TransformFn::identity()
    } else {
        transforms.get(source, INTERMEDIATE_CODE)?
    };
    let from_common = if destination == INTERMEDIATE_CODE {
        TransformFn::identity()
    } else {
        transforms.get(INTERMEDIATE_CODE, destination)?
    };
    Some(to_common.then(&from_common))
}

pub fn get_transform_from_projections(
    transforms: &TransformRegistry,
    source: &Projection,
    destination: &Projection,
) -> Option<TransformFn> {
    resolve_transform(transforms, source.code(), destination.code())
}

/// Like [`get_transform_from_projections`], keyed by codes and failing with
/// [`ProjError::NoTransform`] instead of returning `None`.
pub fn get_transform(
    transforms: &TransformRegistry,
    source: &str,
    destination: &str,
) -> Result<TransformFn, ProjError> {
    resolve_transform(transforms, source, destination).ok_or_else(|| ProjError::NoTransform {
        from: source.to_string(),
        to: destination.to_string(),
    })
}

/// Transform a single coordinate between two codes.
pub fn transform(
    transforms: &TransformRegistry,
    coordinate: [f64; 2],
    source: &str,
    destination: &str,
) -> Result<[f64; 2], ProjError> {
    let func = get_transform(transforms, source, destination)?;
    let (x, y) = func.transform_point(coordinate[0], coordinate[1]);
    Ok([x, y])
}

/// Transform an extent, sampling each edge at `stops` interior points.
pub fn transform_extent(
    transforms: &TransformRegistry,
    extent: &Extent,
    source: &str,
    destination: &str,
    stops: usize,
) -> Result<Extent, ProjError> {
    let func = get_transform(transforms, source, destination)?;
    Ok(extent.apply_transform(&func, stops))
}

/// Two projections are equivalent when they share a code, or when they
/// share units and are linked by an identity transform.
pub fn equivalent(transforms: &TransformRegistry, a: &Projection, b: &Projection) -> bool {
    if a.code() == b.code() {
        return true;
    }
    a.units() == b.units()
        && transforms
            .get(a.code(), b.code())
            .is_some_and(|t| t.is_identity())
}

/// Register identity transforms between every pair of `codes`.
pub fn add_equivalent_projections(transforms: &mut TransformRegistry, codes: &[&str]) {
    for source in codes {
        for destination in codes {
            transforms.add(source, destination, TransformFn::identity());
        }
    }
}

/// Register `forward` from every code in `group1` to every code in `group2`,
/// and `inverse` for the opposite direction.
pub fn add_equivalent_transforms(
    transforms: &mut TransformRegistry,
    group1: &[&str],
    group2: &[&str],
    forward: &TransformFn,
    inverse: &TransformFn,
) {
    for a in group1 {
        for b in group2 {
            transforms.add(a, b, forward.clone());
            transforms.add(b, a, inverse.clone());
        }
    }
}

/// Register a pair of single-point functions as transforms in both directions.
pub fn add_coordinate_transforms<F, I>(
    transforms: &mut TransformRegistry,
    source: &str,
    destination: &str,
    forward: F,
    inverse: I,
) where
    F: Fn(f64, f64) -> (f64, f64) + Send + Sync + 'static,
    I: Fn(f64, f64) -> (f64, f64) + Send + Sync + 'static,
{
    transforms.add(source, destination, TransformFn::from_point_fn(forward));
    transforms.add(destination, source, TransformFn::from_point_fn(inverse));
}

/// Register the built-in EPSG:3857 and EPSG:4326 families with their
/// aliases and the transforms between them.
pub fn add_common(projections: &mut ProjectionRegistry, transforms: &mut TransformRegistry) {
    for p in epsg3857::projections() {
        projections.add(p);
    }
    for p in epsg4326::projections() {
        projections.add(p);
    }

    let geographic: Vec<&str> = epsg4326::CODES.iter().map(|(code, _)| *code).collect();
    add_equivalent_projections(transforms, epsg3857::CODES);
    add_equivalent_projections(transforms, &geographic);
    add_equivalent_transforms(
        transforms,
        &geographic,
        epsg3857::CODES,
        &epsg3857::from_epsg4326(),
        &epsg3857::to_epsg4326(),
    );
}

/// [`add_common`] on the process-wide registries.
pub fn register_common() {
    let mut projections = ProjectionRegistry::write_global();
    let mut transforms = TransformRegistry::write_global();
    add_common(&mut projections, &mut transforms);
}
