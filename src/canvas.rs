//! Owned RGBA raster surface.

use ndarray::{Array3, ArrayView3};

use crate::error::ReprojError;

/// Channels per pixel (RGBA).
pub const CHANNELS: usize = 4;

/// Index of the alpha channel.
pub const ALPHA: usize = 3;

pub const TRANSPARENT: [u8; CHANNELS] = [0, 0, 0, 0];

/// An RGBA image stored row-major as `(height, width, 4)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Canvas {
    data: Array3<u8>,
}

impl Canvas {
    /// A fully transparent canvas.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: Array3::zeros((height, width, CHANNELS)),
        }
    }

    /// A canvas filled with a single colour.
    pub fn filled(width: usize, height: usize, rgba: [u8; CHANNELS]) -> Self {
        let mut data = Array3::zeros((height, width, CHANNELS));
        for mut px in data.lanes_mut(ndarray::Axis(2)) {
            for (c, v) in px.iter_mut().zip(rgba) {
                *c = v;
            }
        }
        Self { data }
    }

    /// Wrap an existing `(height, width, 4)` array.
    pub fn from_array(data: Array3<u8>) -> Result<Self, ReprojError> {
        let (_, _, channels) = data.dim();
        if channels != CHANNELS {
            return Err(ReprojError::DegenerateGeometry(format!(
                "expected {CHANNELS} channels, got {channels}"
            )));
        }
        Ok(Self { data })
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; CHANNELS]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        Some(std::array::from_fn(|c| self.data[(y, x, c)]))
    }

    /// Write a pixel; out-of-bounds writes are ignored.
    pub fn put_pixel(&mut self, x: usize, y: usize, rgba: [u8; CHANNELS]) {
        if x >= self.width() || y >= self.height() {
            return;
        }
        for (c, v) in rgba.into_iter().enumerate() {
            self.data[(y, x, c)] = v;
        }
    }

    pub fn view(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    /// Number of pixels with non-zero alpha.
    pub fn opaque_pixel_count(&self) -> usize {
        self.data
            .lanes(ndarray::Axis(2))
            .into_iter()
            .filter(|px| px[ALPHA] > 0)
            .count()
    }
}
