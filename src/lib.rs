//! Coordinate transform registry and on-demand raster image reprojection.
//!
//! [`proj::TransformRegistry`] maps ordered pairs of projection codes to
//! transform functions. [`image::ReprojectedImage`] requests source images in
//! one projection through a factory and resamples them into another once
//! they have loaded.

pub mod affine;
pub mod canvas;
pub mod error;
pub mod events;
pub mod extent;
pub mod image;
pub mod proj;
pub mod reproj;
pub mod resample;

pub use canvas::Canvas;
pub use error::{ProjError, ReprojError};
pub use events::{EventType, ListenerKey};
pub use extent::Extent;
pub use image::{ImageLike, ImageState, LoadHandle, ReprojectedImage, SourceImage};
pub use proj::{Projection, TransformFn, TransformRegistry, Units};
pub use reproj::ReprojectionOptions;
pub use resample::ResamplingMethod;
