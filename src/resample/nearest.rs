//! Nearest-neighbor resampling kernel.

use ndarray::ArrayView3;

use crate::canvas::CHANNELS;

/// Sample an RGBA raster using nearest-neighbor interpolation.
///
/// Nearest-neighbor simply uses `floor()` to find the containing pixel.
/// Returns `None` if the coordinate is outside the raster.
pub fn sample<T>(src: &ArrayView3<'_, T>, x: f64, y: f64) -> Option<[T; CHANNELS]>
where
    T: Copy,
{
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    let col = x.floor() as isize;
    let row = y.floor() as isize;

    let (rows, cols, _) = src.dim();
    if col < 0 || col >= cols as isize || row < 0 || row >= rows as isize {
        return None;
    }

    let (r, c) = (row as usize, col as usize);
    Some(std::array::from_fn(|ch| src[(r, c, ch)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn quad() -> Array3<u8> {
        // 2x2: red, green / blue, transparent
        let mut arr = Array3::zeros((2, 2, 4));
        for (row, col, rgba) in [
            (0, 0, [255, 0, 0, 255]),
            (0, 1, [0, 255, 0, 255]),
            (1, 0, [0, 0, 255, 255]),
        ] {
            for (ch, v) in rgba.into_iter().enumerate() {
                arr[(row, col, ch)] = v;
            }
        }
        arr
    }

    #[test]
    fn test_center_of_pixel() {
        let arr = quad();
        let view = arr.view();
        assert_eq!(sample(&view, 0.5, 0.5), Some([255, 0, 0, 255]));
        assert_eq!(sample(&view, 1.5, 0.5), Some([0, 255, 0, 255]));
        assert_eq!(sample(&view, 0.5, 1.5), Some([0, 0, 255, 255]));
        assert_eq!(sample(&view, 1.5, 1.5), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_upper_left_corner() {
        let arr = quad();
        assert_eq!(sample(&arr.view(), 0.0, 0.0), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_out_of_bounds() {
        let arr = quad();
        let view = arr.view();
        assert_eq!(sample(&view, -0.1, 0.5), None);
        assert_eq!(sample(&view, 0.5, -0.1), None);
        assert_eq!(sample(&view, 2.0, 0.5), None);
        assert_eq!(sample(&view, 0.5, 2.0), None);
        assert_eq!(sample(&view, f64::NAN, 0.5), None);
    }
}
