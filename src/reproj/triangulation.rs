//! Adaptive triangulation of a target extent.
//!
//! Instead of projecting every pixel, the target extent is covered by
//! triangles whose vertices are transformed exactly; inside each triangle the
//! target→source mapping is approximated by an affine transform. Quads are
//! recursively subdivided while the inverse-transformed centre deviates from
//! the linear estimate by more than the error threshold (in source units).

use std::collections::HashMap;

use tracing::trace;

use crate::extent::Extent;
use crate::proj::{Projection, TransformFn};

/// Base recursion depth of the quad subdivision.
pub const MAX_SUBDIVISION: u32 = 10;

/// Maximum width of a triangle on a global projection, as a fraction of the
/// world width.
pub const MAX_TRIANGLE_WIDTH: f64 = 0.25;

type Coordinate = [f64; 2];

/// A target triangle and the source positions of its vertices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub source: [Coordinate; 3],
    pub target: [Coordinate; 3],
}

/// Parameters of a triangulation, besides the projections and the transform.
#[derive(Clone, Copy, Debug)]
pub struct TriangulationParams {
    /// Maximum tolerated centre error, in source projection units.
    pub error_threshold: f64,
    /// Base recursion depth; raised for targets much larger than 256 px.
    pub max_subdivision: u32,
    /// Target resolution, used to raise the recursion depth.
    pub target_resolution: Option<f64>,
}

impl Default for TriangulationParams {
    fn default() -> Self {
        Self {
            error_threshold: 0.0,
            max_subdivision: MAX_SUBDIVISION,
            target_resolution: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Triangulation {
    triangles: Vec<Triangle>,
    wraps_x_in_source: bool,
    source_world_width: Option<f64>,
}

impl Triangulation {
    /// Triangulate `target_extent`.
    ///
    /// `transform_inv` maps target coordinates to source coordinates.
    /// Quads whose source footprint lies entirely outside `max_source_extent`
    /// are dropped.
    pub fn new(
        source: &Projection,
        target: &Projection,
        transform_inv: &TransformFn,
        target_extent: &Extent,
        max_source_extent: Option<&Extent>,
        params: TriangulationParams,
    ) -> Self {
        let source_world_width = source.extent().map(Extent::width);
        let can_wrap_x_in_source = source.can_wrap_x()
            && match (max_source_extent, source_world_width) {
                (Some(max), Some(world)) => max.width() >= world,
                _ => false,
            };

        let mut builder = Builder {
            transform_inv,
            cache: HashMap::new(),
            max_source_extent: max_source_extent.copied(),
            error_threshold_squared: params.error_threshold * params.error_threshold,
            triangles: Vec::new(),
            wraps_x_in_source: false,
            can_wrap_x_in_source,
            source_can_wrap_x: source.can_wrap_x(),
            source_is_global: source.is_global(),
            target_is_global: target.is_global(),
            source_world_width,
            target_world_width: target.extent().map(Extent::width),
        };

        let tl = target_extent.top_left();
        let tr = target_extent.top_right();
        let br = target_extent.bottom_right();
        let bl = target_extent.bottom_left();
        let tl_src = builder.transform_inv(tl);
        let tr_src = builder.transform_inv(tr);
        let br_src = builder.transform_inv(br);
        let bl_src = builder.transform_inv(bl);

        let extra = match params.target_resolution {
            Some(res) if res > 0.0 => {
                let pixels = target_extent.area() / (res * res * 256.0 * 256.0);
                let depth = pixels.log2().ceil();
                if depth.is_finite() && depth > 0.0 {
                    depth as u32
                } else {
                    0
                }
            }
            _ => 0,
        };
        let max_subdivision = params.max_subdivision + extra;

        builder.add_quad(
            [tl, tr, br, bl],
            [tl_src, tr_src, br_src, bl_src],
            max_subdivision,
        );

        let Builder {
            mut triangles,
            wraps_x_in_source,
            cache,
            ..
        } = builder;

        if wraps_x_in_source {
            if let Some(world) = source_world_width {
                shift_next_to_left_bound(&mut triangles, world);
            }
        }

        trace!(
            triangles = triangles.len(),
            transformed = cache.len(),
            max_subdivision,
            wraps_x_in_source,
            "triangulated target extent"
        );

        Self {
            triangles,
            wraps_x_in_source,
            source_world_width,
        }
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Whether some triangles cross the source projection's antimeridian.
    pub fn wraps_x_in_source(&self) -> bool {
        self.wraps_x_in_source
    }

    pub fn source_world_width(&self) -> Option<f64> {
        self.source_world_width
    }

    /// Bounding extent of every source vertex.
    pub fn calculate_source_extent(&self) -> Extent {
        let mut extent = Extent::empty();
        for triangle in &self.triangles {
            for v in &triangle.source {
                extent.extend_xy(v[0], v[1]);
            }
        }
        extent
    }
}

/// Move triangles whose source lies more than half a world right of the
/// leftmost source x back by one world width, unless that breaks them.
fn shift_next_to_left_bound(triangles: &mut [Triangle], world_width: f64) {
    let left_bound = triangles
        .iter()
        .flat_map(|t| t.source.iter().map(|v| v[0]))
        .fold(f64::INFINITY, f64::min);
    let half = world_width / 2.0;

    for triangle in triangles.iter_mut() {
        let max_x = triangle.source.iter().map(|v| v[0]).fold(f64::NEG_INFINITY, f64::max);
        if max_x - left_bound <= half {
            continue;
        }
        let mut shifted = triangle.source;
        for v in shifted.iter_mut() {
            if v[0] - left_bound > half {
                v[0] -= world_width;
            }
        }
        // Extents spanning both the antimeridian and the prime meridian can
        // be broken by the shift.
        let min_x = shifted.iter().map(|v| v[0]).fold(f64::INFINITY, f64::min);
        let max_x = shifted.iter().map(|v| v[0]).fold(f64::NEG_INFINITY, f64::max);
        if max_x - min_x < half {
            triangle.source = shifted;
        }
    }
}

fn is_finite_coordinate(c: &Coordinate) -> bool {
    c[0].is_finite() && c[1].is_finite()
}

fn midpoint(a: Coordinate, b: Coordinate) -> Coordinate {
    [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0]
}

struct Builder<'a> {
    transform_inv: &'a TransformFn,
    cache: HashMap<(u64, u64), Coordinate>,
    max_source_extent: Option<Extent>,
    error_threshold_squared: f64,
    triangles: Vec<Triangle>,
    wraps_x_in_source: bool,
    can_wrap_x_in_source: bool,
    source_can_wrap_x: bool,
    source_is_global: bool,
    target_is_global: bool,
    source_world_width: Option<f64>,
    target_world_width: Option<f64>,
}

impl Builder<'_> {
    /// Transform a target coordinate, memoised: adjacent quads share edges.
    fn transform_inv(&mut self, c: Coordinate) -> Coordinate {
        let transform_inv = self.transform_inv;
        *self
            .cache
            .entry((c[0].to_bits(), c[1].to_bits()))
            .or_insert_with(|| {
                let (x, y) = transform_inv.transform_point(c[0], c[1]);
                [x, y]
            })
    }

    fn add_triangle(&mut self, target: [Coordinate; 3], source: [Coordinate; 3]) {
        self.triangles.push(Triangle { source, target });
    }

    /// `target` and `source` are the corners `a b c d` (top-left, top-right,
    /// bottom-right, bottom-left).
    fn add_quad(&mut self, target: [Coordinate; 4], source: [Coordinate; 4], max_subdivision: u32) {
        let [a, b, c, d] = target;
        let [a_src, b_src, c_src, d_src] = source;

        let all_finite = source.iter().all(is_finite_coordinate);
        let source_quad_extent = Extent::from_points(&source);
        let source_coverage_x = self
            .source_world_width
            .filter(|_| all_finite)
            .map(|w| source_quad_extent.width() / w);
        // A quad wrapped in the source covers most of the world, but not all.
        let wraps_x = self.source_can_wrap_x
            && source_coverage_x.is_some_and(|cov| cov > 0.5 && cov < 1.0);

        let mut needs_subdivision = false;
        if max_subdivision > 0 {
            if self.target_is_global {
                if let Some(world) = self.target_world_width {
                    let target_coverage_x = Extent::from_points(&target).width() / world;
                    needs_subdivision |= target_coverage_x > MAX_TRIANGLE_WIDTH;
                }
            }
            if !wraps_x && self.source_is_global {
                needs_subdivision |=
                    source_coverage_x.is_some_and(|cov| cov > MAX_TRIANGLE_WIDTH);
            }
        }

        if !needs_subdivision && all_finite {
            if let Some(max) = &self.max_source_extent {
                if !source_quad_extent.intersects(max) {
                    return;
                }
            }
        }

        // Bits 8, 4, 2, 1 flag non-finite a, b, c, d.
        let mut not_finite = 0u8;
        if !needs_subdivision && !all_finite {
            if max_subdivision > 0 {
                needs_subdivision = true;
            } else {
                for (bit, corner) in [8u8, 4, 2, 1].into_iter().zip(source.iter()) {
                    if !is_finite_coordinate(corner) {
                        not_finite |= bit;
                    }
                }
                // Only a single missing corner still leaves a triangle.
                if !matches!(not_finite, 1 | 2 | 4 | 8) {
                    return;
                }
            }
        }

        if max_subdivision > 0 {
            if !needs_subdivision {
                let center = midpoint(a, c);
                let center_src = self.transform_inv(center);
                let dx = match (wraps_x, self.source_world_width) {
                    (true, Some(world)) => {
                        let estimate =
                            (a_src[0].rem_euclid(world) + c_src[0].rem_euclid(world)) / 2.0;
                        estimate - center_src[0].rem_euclid(world)
                    }
                    _ => (a_src[0] + c_src[0]) / 2.0 - center_src[0],
                };
                let dy = (a_src[1] + c_src[1]) / 2.0 - center_src[1];
                needs_subdivision = dx * dx + dy * dy > self.error_threshold_squared;
            }

            if needs_subdivision {
                if (a[0] - c[0]).abs() <= (a[1] - c[1]).abs() {
                    // Split into top and bottom halves.
                    let bc = midpoint(b, c);
                    let bc_src = self.transform_inv(bc);
                    let da = midpoint(d, a);
                    let da_src = self.transform_inv(da);
                    self.add_quad([a, b, bc, da], [a_src, b_src, bc_src, da_src], max_subdivision - 1);
                    self.add_quad([da, bc, c, d], [da_src, bc_src, c_src, d_src], max_subdivision - 1);
                } else {
                    // Split into left and right halves.
                    let ab = midpoint(a, b);
                    let ab_src = self.transform_inv(ab);
                    let cd = midpoint(c, d);
                    let cd_src = self.transform_inv(cd);
                    self.add_quad([a, ab, cd, d], [a_src, ab_src, cd_src, d_src], max_subdivision - 1);
                    self.add_quad([ab, b, c, cd], [ab_src, b_src, c_src, cd_src], max_subdivision - 1);
                }
                return;
            }
        }

        if wraps_x {
            if !self.can_wrap_x_in_source {
                return;
            }
            self.wraps_x_in_source = true;
        }

        // The diagonal a-c is the first side of both triangles.
        if not_finite & 0xb == 0 {
            self.add_triangle([a, c, d], [a_src, c_src, d_src]);
        }
        if not_finite & 0xe == 0 {
            self.add_triangle([a, c, b], [a_src, c_src, b_src]);
        }
        if not_finite != 0 {
            // Fall back to the other diagonal.
            if not_finite & 0xd == 0 {
                self.add_triangle([b, d, a], [b_src, d_src, a_src]);
            }
            if not_finite & 0x7 == 0 {
                self.add_triangle([b, d, c], [b_src, d_src, c_src]);
            }
        }
    }
}
