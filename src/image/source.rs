//! Source images filled by an external loader.

use std::cell::RefCell;
use std::fmt::{self, Display};
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::canvas::Canvas;
use crate::events::{EventType, Listener, ListenerKey, Observable};
use crate::extent::Extent;
use crate::image::{ImageLike, ImageState};

/// What a loader is asked to provide.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageRequest {
    pub extent: Extent,
    pub resolution: f64,
    pub pixel_ratio: f64,
}

/// Performs the fetch/decode of a [`SourceImage`] and completes it through
/// the handle, now or later.
pub type Loader = Box<dyn FnOnce(&ImageRequest, LoadHandle)>;

/// A loadable raster unit.
pub struct SourceImage {
    this: Weak<SourceImage>,
    inner: RefCell<Inner>,
    events: Observable,
}

struct Inner {
    request: ImageRequest,
    state: ImageState,
    canvas: Option<Rc<Canvas>>,
    loader: Option<Loader>,
    error: Option<String>,
}

impl SourceImage {
    pub fn new<F>(extent: Extent, resolution: f64, pixel_ratio: f64, loader: F) -> Rc<Self>
    where
        F: FnOnce(&ImageRequest, LoadHandle) + 'static,
    {
        Self::build(
            ImageRequest {
                extent,
                resolution,
                pixel_ratio,
            },
            ImageState::Idle,
            None,
            Some(Box::new(loader)),
        )
    }

    /// An image that is already in `state`, e.g. a cached raster (`Loaded`)
    /// or a known-missing one (`Error`). Loading it has no effect.
    pub fn from_state(
        extent: Extent,
        resolution: f64,
        pixel_ratio: f64,
        state: ImageState,
        canvas: Option<Canvas>,
    ) -> Rc<Self> {
        Self::build(
            ImageRequest {
                extent,
                resolution,
                pixel_ratio,
            },
            state,
            canvas.map(Rc::new),
            None,
        )
    }

    fn build(
        request: ImageRequest,
        state: ImageState,
        canvas: Option<Rc<Canvas>>,
        loader: Option<Loader>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            inner: RefCell::new(Inner {
                request,
                state,
                canvas,
                loader,
                error: None,
            }),
            events: Observable::new(),
        })
    }

    pub fn request(&self) -> ImageRequest {
        self.inner.borrow().request
    }

    /// Failure message of an image in the `Error` state.
    pub fn error(&self) -> Option<String> {
        self.inner.borrow().error.clone()
    }

    fn complete(&self, outcome: Result<Loaded, String>) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state != ImageState::Loading {
                return;
            }
            match outcome {
                Ok(loaded) => {
                    if let Some(extent) = loaded.extent {
                        inner.request.extent = extent;
                    }
                    if let Some(resolution) = loaded.resolution {
                        inner.request.resolution = resolution;
                    }
                    if let Some(pixel_ratio) = loaded.pixel_ratio {
                        inner.request.pixel_ratio = pixel_ratio;
                    }
                    debug!(
                        width = loaded.canvas.width(),
                        height = loaded.canvas.height(),
                        "source image loaded"
                    );
                    inner.canvas = Some(Rc::new(loaded.canvas));
                    inner.state = ImageState::Loaded;
                }
                Err(message) => {
                    warn!(error = %message, "source image failed to load");
                    inner.error = Some(message);
                    inner.state = ImageState::Error;
                }
            }
        }
        self.events.changed();
    }
}

struct Loaded {
    canvas: Canvas,
    extent: Option<Extent>,
    resolution: Option<f64>,
    pixel_ratio: Option<f64>,
}

impl ImageLike for SourceImage {
    fn extent(&self) -> Extent {
        self.inner.borrow().request.extent
    }

    fn resolution(&self) -> f64 {
        self.inner.borrow().request.resolution
    }

    fn pixel_ratio(&self) -> f64 {
        self.inner.borrow().request.pixel_ratio
    }

    fn state(&self) -> ImageState {
        self.inner.borrow().state
    }

    fn image(&self) -> Option<Rc<Canvas>> {
        self.inner.borrow().canvas.clone()
    }

    fn load(&self) {
        let (request, loader) = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != ImageState::Idle {
                return;
            }
            inner.state = ImageState::Loading;
            (inner.request, inner.loader.take())
        };
        self.events.changed();

        let handle = LoadHandle {
            target: self.this.clone(),
        };
        match loader {
            Some(loader) => loader(&request, handle),
            None => handle.fail("no loader"),
        }
    }

    fn on_change(&self, listener: Listener) -> ListenerKey {
        self.events.on(EventType::Change, listener)
    }

    fn un_by_key(&self, key: ListenerKey) -> bool {
        self.events.un_by_key(key)
    }
}

impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SourceImage")
            .field("request", &inner.request)
            .field("state", &inner.state)
            .finish()
    }
}

/// Completes a loading [`SourceImage`]. Consumed on use; a handle whose
/// image was dropped, or is no longer loading, does nothing.
pub struct LoadHandle {
    target: Weak<SourceImage>,
}

impl LoadHandle {
    pub fn loaded(self, canvas: Canvas) {
        self.loaded_with(canvas, None, None, None);
    }

    /// Complete with the image's actual extent, resolution or pixel ratio
    /// where they differ from the request.
    pub fn loaded_with(
        self,
        canvas: Canvas,
        extent: Option<Extent>,
        resolution: Option<f64>,
        pixel_ratio: Option<f64>,
    ) {
        if let Some(image) = self.target.upgrade() {
            image.complete(Ok(Loaded {
                canvas,
                extent,
                resolution,
                pixel_ratio,
            }));
        }
    }

    pub fn fail(self, error: impl Display) {
        if let Some(image) = self.target.upgrade() {
            image.complete(Err(error.to_string()));
        }
    }
}

impl fmt::Debug for LoadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadHandle")
            .field("alive", &(self.target.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn extent() -> Extent {
        Extent::new(0.0, 0.0, 10.0, 10.0)
    }

    fn count_changes(image: &SourceImage) -> Rc<Cell<u32>> {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        image.on_change(Rc::new(move || c.set(c.get() + 1)));
        count
    }

    #[test]
    fn test_synchronous_load() {
        let image = SourceImage::new(extent(), 1.0, 2.0, |request, handle| {
            assert_eq!(request.pixel_ratio, 2.0);
            handle.loaded(Canvas::new(20, 20));
        });
        let changes = count_changes(&image);
        assert_eq!(image.state(), ImageState::Idle);
        image.load();
        assert_eq!(image.state(), ImageState::Loaded);
        assert_eq!(changes.get(), 2);
        assert_eq!(image.image().unwrap().width(), 20);
    }

    #[test]
    fn test_deferred_failure() {
        let slot: Rc<RefCell<Option<LoadHandle>>> = Rc::new(RefCell::new(None));
        let stash = Rc::clone(&slot);
        let image = SourceImage::new(extent(), 1.0, 1.0, move |_, handle| {
            *stash.borrow_mut() = Some(handle);
        });
        image.load();
        assert_eq!(image.state(), ImageState::Loading);

        slot.borrow_mut().take().unwrap().fail("404");
        assert_eq!(image.state(), ImageState::Error);
        assert_eq!(image.error().as_deref(), Some("404"));
        assert!(image.image().is_none());
    }

    #[test]
    fn test_load_is_idempotent() {
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let image = SourceImage::new(extent(), 1.0, 1.0, move |_, handle| {
            c.set(c.get() + 1);
            handle.loaded(Canvas::new(1, 1));
        });
        image.load();
        image.load();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_loaded_with_overrides() {
        let image = SourceImage::new(extent(), 1.0, 1.0, |_, handle| {
            handle.loaded_with(
                Canvas::new(4, 4),
                Some(Extent::new(0.0, 0.0, 8.0, 8.0)),
                Some(2.0),
                None,
            );
        });
        image.load();
        assert_eq!(image.extent(), Extent::new(0.0, 0.0, 8.0, 8.0));
        assert_eq!(image.resolution(), 2.0);
        assert_eq!(image.pixel_ratio(), 1.0);
    }

    #[test]
    fn test_from_state_does_not_load() {
        let image = SourceImage::from_state(
            extent(),
            1.0,
            1.0,
            ImageState::Loaded,
            Some(Canvas::new(10, 10)),
        );
        let changes = count_changes(&image);
        image.load();
        assert_eq!(image.state(), ImageState::Loaded);
        assert_eq!(changes.get(), 0);
    }

    #[test]
    fn test_handle_outliving_image() {
        let slot: Rc<RefCell<Option<LoadHandle>>> = Rc::new(RefCell::new(None));
        let stash = Rc::clone(&slot);
        let image = SourceImage::new(extent(), 1.0, 1.0, move |_, handle| {
            *stash.borrow_mut() = Some(handle);
        });
        image.load();
        drop(image);
        slot.borrow_mut().take().unwrap().loaded(Canvas::new(1, 1));
    }
}
