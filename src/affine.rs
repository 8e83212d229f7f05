use crate::error::ReprojError;

/// A 2D affine transform.
///
/// Maps (u, v) to (x, y):
///   x = a * u + b * v + c
///   y = d * u + e * v + f
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 0.0,
        e: 1.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// The transform taking the unit triangle `(0,0), (1,0), (0,1)` onto `p`.
    fn from_unit_triangle(p: &[[f64; 2]; 3]) -> Self {
        Self {
            a: p[1][0] - p[0][0],
            b: p[2][0] - p[0][0],
            c: p[0][0],
            d: p[1][1] - p[0][1],
            e: p[2][1] - p[0][1],
            f: p[0][1],
        }
    }

    /// The unique transform mapping each vertex of `from` onto the matching
    /// vertex of `to`.
    ///
    /// Fails when `from` is degenerate (collinear vertices).
    pub fn from_triangles(from: &[[f64; 2]; 3], to: &[[f64; 2]; 3]) -> Result<Affine, ReprojError> {
        let from_unit = Self::from_unit_triangle(from).inverse()?;
        Ok(from_unit.then(&Self::from_unit_triangle(to)))
    }

    /// Apply the forward transform: (u, v) -> (x, y).
    pub fn forward(&self, u: f64, v: f64) -> (f64, f64) {
        let x = self.a * u + self.b * v + self.c;
        let y = self.d * u + self.e * v + self.f;
        (x, y)
    }

    /// Compose: apply `self` first, then `next`.
    pub fn then(&self, next: &Affine) -> Affine {
        Affine {
            a: next.a * self.a + next.b * self.d,
            b: next.a * self.b + next.b * self.e,
            c: next.a * self.c + next.b * self.f + next.c,
            d: next.d * self.a + next.e * self.d,
            e: next.d * self.b + next.e * self.e,
            f: next.d * self.c + next.e * self.f + next.f,
        }
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Compute the inverse affine transform.
    pub fn inverse(&self) -> Result<Affine, ReprojError> {
        let det = self.determinant();
        if det.abs() < f64::EPSILON || !det.is_finite() {
            return Err(ReprojError::Affine(
                "Singular affine transform (determinant is zero)".into(),
            ));
        }
        let inv_det = 1.0 / det;
        Ok(Affine {
            a: self.e * inv_det,
            b: -self.b * inv_det,
            c: (self.b * self.f - self.e * self.c) * inv_det,
            d: -self.d * inv_det,
            e: self.a * inv_det,
            f: (self.d * self.c - self.a * self.f) * inv_det,
        })
    }
}
