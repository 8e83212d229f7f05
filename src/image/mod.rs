//! Loadable raster units and their shared lifecycle.

pub mod reprojected;
pub mod source;

use std::fmt;
use std::rc::Rc;

use crate::canvas::Canvas;
use crate::events::{Listener, ListenerKey};
use crate::extent::Extent;

pub use reprojected::ReprojectedImage;
pub use source::{ImageRequest, LoadHandle, SourceImage};

/// Lifecycle of an image: `Idle → Loading → {Loaded | Error}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ImageState {
    Idle = 0,
    Loading = 1,
    Loaded = 2,
    Error = 3,
}

impl ImageState {
    /// `Loaded` and `Error` are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Loaded | Self::Error)
    }
}

impl fmt::Display for ImageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// The contract shared by source images and reprojected images.
///
/// Observers subscribe with [`ImageLike::on_change`] and are notified once
/// per state transition.
pub trait ImageLike {
    fn extent(&self) -> Extent;

    fn resolution(&self) -> f64;

    fn pixel_ratio(&self) -> f64;

    fn state(&self) -> ImageState;

    /// The raster, available once the image is `Loaded`.
    fn image(&self) -> Option<Rc<Canvas>>;

    /// Start loading. No-op unless the image is `Idle`.
    fn load(&self);

    fn on_change(&self, listener: Listener) -> ListenerKey;

    fn un_by_key(&self, key: ListenerKey) -> bool;
}

/// Produces the source image for `(extent, resolution, pixel_ratio)` in the
/// source projection, or `None` when nothing can be provided.
pub type SourceFactory = Box<dyn FnMut(&Extent, f64, f64) -> Option<Rc<dyn ImageLike>>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_order_and_terminal() {
        assert_eq!(ImageState::Idle as u8, 0);
        assert_eq!(ImageState::Loading as u8, 1);
        assert_eq!(ImageState::Loaded as u8, 2);
        assert_eq!(ImageState::Error as u8, 3);
        assert!(!ImageState::Idle.is_terminal());
        assert!(!ImageState::Loading.is_terminal());
        assert!(ImageState::Loaded.is_terminal());
        assert!(ImageState::Error.is_terminal());
        assert_eq!(ImageState::Loaded.to_string(), "loaded");
    }
}
