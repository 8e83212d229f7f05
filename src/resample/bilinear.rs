//! Bilinear interpolation resampling kernel.

use ndarray::ArrayView3;
use num_traits::NumCast;

use crate::canvas::{ALPHA, CHANNELS};

/// Sample an RGBA raster using bilinear interpolation.
///
/// Subtracts 0.5 from input coordinates to center on pixel centers. Colour
/// channels are weighted by alpha so transparent neighbours do not bleed
/// their colour into the result. Neighbours past the raster edge are clamped
/// to the edge pixel. Returns `None` outside the raster.
pub fn sample<T>(src: &ArrayView3<'_, T>, x: f64, y: f64) -> Option<[T; CHANNELS]>
where
    T: Copy + NumCast,
{
    let (rows, cols, _) = src.dim();
    if rows == 0 || cols == 0 {
        return None;
    }
    if !(x >= 0.0 && y >= 0.0 && x <= cols as f64 && y <= rows as f64) {
        return None;
    }

    // Convert from corner-based to center-based coordinates
    let cx = x - 0.5;
    let cy = y - 0.5;
    let fx = cx.floor();
    let fy = cy.floor();
    let dx = cx - fx;
    let dy = cy - fy;

    let clamp = |v: f64, n: usize| v.max(0.0).min((n - 1) as f64) as usize;
    let (x0, x1) = (clamp(fx, cols), clamp(fx + 1.0, cols));
    let (y0, y1) = (clamp(fy, rows), clamp(fy + 1.0, rows));

    let neighbours = [
        (y0, x0, (1.0 - dx) * (1.0 - dy)),
        (y0, x1, dx * (1.0 - dy)),
        (y1, x0, (1.0 - dx) * dy),
        (y1, x1, dx * dy),
    ];

    let mut alpha = 0.0;
    let mut colour = [0.0f64; ALPHA];
    for &(r, c, w) in &neighbours {
        let a: f64 = NumCast::from(src[(r, c, ALPHA)])?;
        let wa = w * a;
        alpha += wa;
        for (ch, acc) in colour.iter_mut().enumerate() {
            let v: f64 = NumCast::from(src[(r, c, ch)])?;
            *acc += wa * v;
        }
    }

    let mut out = [0.0f64; CHANNELS];
    if alpha > 0.0 {
        for (o, acc) in out.iter_mut().zip(colour) {
            *o = (acc / alpha).round();
        }
        out[ALPHA] = alpha.round();
    }

    let mut result: [Option<T>; CHANNELS] = [None; CHANNELS];
    for (r, v) in result.iter_mut().zip(out) {
        *r = NumCast::from(v);
    }
    Some([result[0]?, result[1]?, result[2]?, result[3]?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn gradient(cols: usize) -> Array3<u8> {
        // Opaque red ramp along x: value = 10 * col
        let mut arr = Array3::zeros((3, cols, 4));
        for row in 0..3 {
            for col in 0..cols {
                arr[(row, col, 0)] = (10 * col) as u8;
                arr[(row, col, ALPHA)] = 255;
            }
        }
        arr
    }

    #[test]
    fn test_pixel_center_exact() {
        let arr = gradient(4);
        let val = sample(&arr.view(), 2.5, 1.5).unwrap();
        assert_eq!(val, [20, 0, 0, 255]);
    }

    #[test]
    fn test_midpoint_interpolation() {
        let arr = gradient(4);
        // Midpoint between pixel centers (1.5, _) and (2.5, _)
        let val = sample(&arr.view(), 2.0, 1.5).unwrap();
        assert_eq!(val, [15, 0, 0, 255]);
    }

    #[test]
    fn test_edge_is_clamped() {
        let arr = gradient(4);
        let view = arr.view();
        assert_eq!(sample(&view, 0.0, 0.0).unwrap(), [0, 0, 0, 255]);
        assert_eq!(sample(&view, 4.0, 3.0).unwrap(), [30, 0, 0, 255]);
    }

    #[test]
    fn test_out_of_bounds() {
        let arr = gradient(2);
        let view = arr.view();
        assert!(sample(&view, -0.1, 0.5).is_none());
        assert!(sample(&view, 2.1, 0.5).is_none());
        assert!(sample(&view, f64::NAN, 0.5).is_none());
    }

    #[test]
    fn test_transparent_neighbour_keeps_colour() {
        let mut arr = Array3::zeros((1, 2, 4));
        arr[(0, 0, 0)] = 200;
        arr[(0, 0, ALPHA)] = 255;
        // (0, 1) is fully transparent black
        let val = sample(&arr.view(), 1.0, 0.5).unwrap();
        assert_eq!(val[0], 200);
        assert_eq!(val[ALPHA], 128);
    }

    #[test]
    fn test_linear_gradient_exact_preservation() {
        let arr = gradient(10);
        let view = arr.view();
        for col_f in [1.5_f64, 2.0, 3.25, 4.75, 7.5] {
            let expected = (10.0 * (col_f - 0.5)).round() as u8;
            let val = sample(&view, col_f, 1.5).unwrap();
            assert_eq!(val[0], expected, "at x = {col_f}");
        }
    }
}
