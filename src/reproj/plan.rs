//! Source request planning: maps a triangulated source extent to the source
//! images that have to be requested.

use crate::error::ReprojError;
use crate::extent::Extent;
use crate::proj::Projection;

/// One source image to request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceRequest {
    /// Extent to request from the source, inside the source world.
    pub extent: Extent,
    /// Where the requested image sits in triangulated source space. Differs
    /// from `extent` by whole world widths when the triangles cross the
    /// antimeridian of a wrapping source.
    pub render_extent: Extent,
}

impl SourceRequest {
    fn unshifted(extent: Extent) -> Self {
        Self {
            extent,
            render_extent: extent,
        }
    }

    /// x offset from request space to render space.
    pub fn offset_x(&self) -> f64 {
        self.render_extent.min_x - self.extent.min_x
    }
}

/// Plan the source requests covering `source_extent`.
///
/// The extent is buffered by `kernel_radius` source pixels so the resampling
/// kernel has data at the edges. For a source that wraps in x the buffered
/// extent is normalised into the world, and split in two when it crosses the
/// world's right edge.
pub fn plan_source_requests(
    source_extent: &Extent,
    source: &Projection,
    source_resolution: f64,
    kernel_radius: f64,
) -> Result<Vec<SourceRequest>, ReprojError> {
    if source_extent.is_empty() || !source_extent.is_finite() {
        return Err(ReprojError::DegenerateGeometry(format!(
            "source extent {:?} is empty or not finite",
            source_extent.to_array()
        )));
    }
    if !(source_resolution.is_finite() && source_resolution > 0.0) {
        return Err(ReprojError::DegenerateGeometry(format!(
            "invalid source resolution {source_resolution}"
        )));
    }

    let buffered = source_extent.buffer(kernel_radius * source_resolution);

    let world = match source.extent() {
        Some(world) if source.can_wrap_x() && world.width() > 0.0 => *world,
        _ => return Ok(vec![SourceRequest::unshifted(buffered)]),
    };
    let world_width = world.width();

    if buffered.width() >= world_width {
        let clamped = Extent::new(world.min_x, buffered.min_y, world.max_x, buffered.max_y);
        return Ok(vec![SourceRequest::unshifted(clamped)]);
    }

    let worlds = ((buffered.min_x - world.min_x) / world_width).floor();
    let shift = worlds * world_width;
    let normalised = buffered.translate_x(-shift);

    if normalised.max_x <= world.max_x {
        return Ok(vec![SourceRequest {
            extent: normalised,
            render_extent: buffered,
        }]);
    }

    let right = Extent::new(normalised.min_x, normalised.min_y, world.max_x, normalised.max_y);
    let left = Extent::new(
        world.min_x,
        normalised.min_y,
        normalised.max_x - world_width,
        normalised.max_y,
    );
    Ok(vec![
        SourceRequest {
            extent: right,
            render_extent: right.translate_x(shift),
        },
        SourceRequest {
            extent: left,
            render_extent: left.translate_x(shift + world_width),
        },
    ])
}
