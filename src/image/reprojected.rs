//! An image in a target projection, resampled from source images requested
//! in the source projection.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::canvas::Canvas;
use crate::error::{ProjError, ReprojError};
use crate::events::{EventType, Listener, ListenerKey, Observable};
use crate::extent::Extent;
use crate::image::{ImageLike, ImageState, SourceFactory};
use crate::proj::{equivalent, get_transform, Projection, TransformFn, TransformRegistry};
use crate::reproj::{
    calculate_source_resolution, canvas_size, max_extent, plan_source_requests, render,
    RenderSource, ReprojectionOptions, Triangulation, TriangulationParams,
};

/// A raster in `target_projection` covering `target_extent`, produced from
/// one or more source images once all of them have loaded.
///
/// Created `Idle`; [`ImageLike::load`] requests the source images from the
/// factory and waits for each to reach a terminal state. If any fails the
/// image ends in `Error`, otherwise the sources are resampled into a canvas
/// and the image ends in `Loaded`. Listeners are notified once per
/// transition, so a full lifecycle fires two notifications (`Loading`, then
/// `Loaded` or `Error`), and never after [`ReprojectedImage::dispose`].
pub struct ReprojectedImage {
    this: Weak<ReprojectedImage>,
    source_projection: Arc<Projection>,
    target_projection: Arc<Projection>,
    target_extent: Extent,
    target_resolution: f64,
    pixel_ratio: f64,
    options: ReprojectionOptions,
    mode: Mode,
    inner: RefCell<Inner>,
    events: Observable,
}

enum Mode {
    /// Source and target are equivalent: the single source image is used as is.
    PassThrough,
    Reproject {
        /// Target → source.
        transform: TransformFn,
        source_resolution: f64,
    },
    /// Fails on load.
    Unresolved(ReprojError),
}

struct Inner {
    state: ImageState,
    factory: Option<SourceFactory>,
    dependencies: Vec<Dependency>,
    triangulation: Option<Triangulation>,
    canvas: Option<Rc<Canvas>>,
    error: Option<ReprojError>,
    disposed: bool,
}

struct Dependency {
    image: Rc<dyn ImageLike>,
    key: ListenerKey,
    /// Shift from the image's extent to its place in triangulated source space.
    offset_x: f64,
}

impl ReprojectedImage {
    /// Reproject with the process-wide transform registry and default options.
    pub fn new<F>(
        source_projection: Arc<Projection>,
        target_projection: Arc<Projection>,
        target_extent: Extent,
        target_resolution: f64,
        pixel_ratio: f64,
        factory: F,
    ) -> Rc<Self>
    where
        F: FnMut(&Extent, f64, f64) -> Option<Rc<dyn ImageLike>> + 'static,
    {
        let transforms = TransformRegistry::read_global();
        Self::with_registry(
            &transforms,
            ReprojectionOptions::default(),
            source_projection,
            target_projection,
            target_extent,
            target_resolution,
            pixel_ratio,
            factory,
        )
    }

    /// Reproject, resolving the target → source transform in `transforms`.
    #[allow(clippy::too_many_arguments)]
    pub fn with_registry<F>(
        transforms: &TransformRegistry,
        options: ReprojectionOptions,
        source_projection: Arc<Projection>,
        target_projection: Arc<Projection>,
        target_extent: Extent,
        target_resolution: f64,
        pixel_ratio: f64,
        factory: F,
    ) -> Rc<Self>
    where
        F: FnMut(&Extent, f64, f64) -> Option<Rc<dyn ImageLike>> + 'static,
    {
        let mode = if equivalent(transforms, &source_projection, &target_projection) {
            Mode::PassThrough
        } else {
            match get_transform(transforms, target_projection.code(), source_projection.code()) {
                Ok(transform) => Self::reproject_mode(
                    transforms,
                    &source_projection,
                    &target_projection,
                    transform,
                    &target_extent,
                    target_resolution,
                ),
                Err(err) => Mode::Unresolved(err.into()),
            }
        };
        Self::build(
            mode,
            options,
            source_projection,
            target_projection,
            target_extent,
            target_resolution,
            pixel_ratio,
            Box::new(factory),
        )
    }

    /// Reproject through an externally supplied target → source `transform`.
    #[allow(clippy::too_many_arguments)]
    pub fn with_transform<F>(
        options: ReprojectionOptions,
        source_projection: Arc<Projection>,
        target_projection: Arc<Projection>,
        transform: TransformFn,
        target_extent: Extent,
        target_resolution: f64,
        pixel_ratio: f64,
        factory: F,
    ) -> Rc<Self>
    where
        F: FnMut(&Extent, f64, f64) -> Option<Rc<dyn ImageLike>> + 'static,
    {
        let pass_through = source_projection.code() == target_projection.code()
            || (transform.is_identity()
                && source_projection.units() == target_projection.units());
        let mode = if pass_through {
            Mode::PassThrough
        } else {
            let transforms = TransformRegistry::read_global();
            Self::reproject_mode(
                &transforms,
                &source_projection,
                &target_projection,
                transform,
                &target_extent,
                target_resolution,
            )
        };
        Self::build(
            mode,
            options,
            source_projection,
            target_projection,
            target_extent,
            target_resolution,
            pixel_ratio,
            Box::new(factory),
        )
    }

    fn reproject_mode(
        transforms: &TransformRegistry,
        source: &Projection,
        target: &Projection,
        transform: TransformFn,
        target_extent: &Extent,
        target_resolution: f64,
    ) -> Mode {
        if !(target_resolution.is_finite() && target_resolution > 0.0) {
            return Mode::Unresolved(ReprojError::DegenerateGeometry(format!(
                "invalid target resolution {target_resolution}"
            )));
        }
        let limited = limited_target_extent(target, target_extent);
        if limited.is_empty() {
            return Mode::Unresolved(ReprojError::DegenerateGeometry(format!(
                "target extent {:?} lies outside {}",
                target_extent.to_array(),
                target.code()
            )));
        }
        let source_resolution = calculate_source_resolution(
            transforms,
            source,
            target,
            &transform,
            limited.center(),
            target_resolution,
        );
        if !(source_resolution.is_finite() && source_resolution > 0.0) {
            return Mode::Unresolved(
                ProjError::TransformFailed(format!(
                    "no source resolution at the centre of {:?}",
                    limited.to_array()
                ))
                .into(),
            );
        }
        Mode::Reproject {
            transform,
            source_resolution,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        mode: Mode,
        options: ReprojectionOptions,
        source_projection: Arc<Projection>,
        target_projection: Arc<Projection>,
        target_extent: Extent,
        target_resolution: f64,
        pixel_ratio: f64,
        factory: SourceFactory,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            source_projection,
            target_projection,
            target_extent,
            target_resolution,
            pixel_ratio,
            options,
            mode,
            inner: RefCell::new(Inner {
                state: ImageState::Idle,
                factory: Some(factory),
                dependencies: Vec::new(),
                triangulation: None,
                canvas: None,
                error: None,
                disposed: false,
            }),
            events: Observable::new(),
        })
    }

    /// The target projection.
    pub fn projection(&self) -> &Arc<Projection> {
        &self.target_projection
    }

    pub fn source_projection(&self) -> &Arc<Projection> {
        &self.source_projection
    }

    pub fn options(&self) -> &ReprojectionOptions {
        &self.options
    }

    /// Whether the image is an unmodified view of its single source image.
    pub fn is_pass_through(&self) -> bool {
        matches!(self.mode, Mode::PassThrough)
    }

    /// Resolution at which source images are requested, if reprojecting.
    pub fn source_resolution(&self) -> Option<f64> {
        match self.mode {
            Mode::Reproject {
                source_resolution, ..
            } => Some(source_resolution),
            Mode::PassThrough => Some(self.target_resolution),
            Mode::Unresolved(_) => None,
        }
    }

    /// Why the image ended in `Error`.
    pub fn error(&self) -> Option<ReprojError> {
        self.inner.borrow().error.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    /// Release the source images, the canvas and the factory, and drop all
    /// listeners. Late source completions are ignored afterwards.
    pub fn dispose(&self) {
        let dependencies = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.canvas = None;
            inner.factory = None;
            inner.triangulation = None;
            std::mem::take(&mut inner.dependencies)
        };
        release(dependencies);
        self.events.clear();
        debug!(
            source = self.source_projection.code(),
            target = self.target_projection.code(),
            "reprojected image disposed"
        );
    }

    /// Ask the factory for the source images this image needs.
    fn request_sources(&self) -> Result<Vec<(Rc<dyn ImageLike>, f64)>, ReprojError> {
        let factory = self.inner.borrow_mut().factory.take();
        let Some(mut factory) = factory else {
            return Err(ReprojError::Load("source factory already released".into()));
        };

        if let Mode::Unresolved(err) = &self.mode {
            return Err(err.clone());
        }
        let (width, height) = canvas_size(&self.target_extent, self.target_resolution, self.pixel_ratio);
        if width == 0 || height == 0 {
            return Err(ReprojError::DegenerateGeometry(format!(
                "target extent {:?} at resolution {} is {width}x{height} pixels",
                self.target_extent.to_array(),
                self.target_resolution
            )));
        }

        let (transform, source_resolution) = match &self.mode {
            Mode::Reproject {
                transform,
                source_resolution,
            } => (transform, *source_resolution),
            _ => {
                let image = factory(&self.target_extent, self.target_resolution, self.pixel_ratio)
                    .ok_or_else(|| {
                        ReprojError::Load("no source image for the target extent".into())
                    })?;
                return Ok(vec![(image, 0.0)]);
            }
        };

        let limited = limited_target_extent(&self.target_projection, &self.target_extent);
        let max_source_extent = max_extent(&self.source_projection);
        let triangulation = Triangulation::new(
            &self.source_projection,
            &self.target_projection,
            transform,
            &limited,
            max_source_extent.as_ref(),
            TriangulationParams {
                error_threshold: self.options.error_threshold * source_resolution,
                max_subdivision: self.options.max_subdivision,
                target_resolution: Some(self.target_resolution),
            },
        );
        let requests = plan_source_requests(
            &triangulation.calculate_source_extent(),
            &self.source_projection,
            source_resolution,
            self.options.resampling.kernel_radius(),
        )?;

        let images: Vec<_> = requests
            .iter()
            .filter_map(|request| {
                factory(&request.extent, source_resolution, self.pixel_ratio)
                    .map(|image| (image, request.offset_x()))
            })
            .collect();
        if images.is_empty() {
            return Err(ReprojError::Load(
                "source factory provided no image".into(),
            ));
        }

        debug!(
            source = self.source_projection.code(),
            target = self.target_projection.code(),
            requests = requests.len(),
            images = images.len(),
            triangles = triangulation.triangles().len(),
            source_resolution,
            "requested source images"
        );
        self.inner.borrow_mut().triangulation = Some(triangulation);
        Ok(images)
    }

    /// Finish once every source image is terminal.
    fn check_dependencies(&self) {
        let outcome = {
            let inner = self.inner.borrow();
            if inner.disposed || inner.state != ImageState::Loading || inner.dependencies.is_empty()
            {
                return;
            }
            let mut failed = None;
            for (i, dependency) in inner.dependencies.iter().enumerate() {
                let state = dependency.image.state();
                if !state.is_terminal() {
                    return;
                }
                if state == ImageState::Error {
                    failed.get_or_insert(i);
                }
            }
            match failed {
                Some(i) => Err(ReprojError::DependencyFailed(format!(
                    "source image {} of {}",
                    i + 1,
                    inner.dependencies.len()
                ))),
                None => self.compose(&inner),
            }
        };
        self.finish(outcome);
    }

    /// Produce the canvas from loaded source images.
    fn compose(&self, inner: &Inner) -> Result<Rc<Canvas>, ReprojError> {
        let source_resolution = match &self.mode {
            Mode::Reproject {
                source_resolution, ..
            } => *source_resolution,
            Mode::PassThrough => {
                return inner
                    .dependencies
                    .first()
                    .and_then(|d| d.image.image())
                    .ok_or_else(|| ReprojError::Load("loaded source image has no raster".into()));
            }
            Mode::Unresolved(err) => return Err(err.clone()),
        };
        let triangulation = inner
            .triangulation
            .as_ref()
            .ok_or_else(|| ReprojError::Load("triangulation was released".into()))?;

        let canvases: Vec<(Extent, Rc<Canvas>)> = inner
            .dependencies
            .iter()
            .filter_map(|d| {
                d.image
                    .image()
                    .map(|canvas| (d.image.extent().translate_x(d.offset_x), canvas))
            })
            .collect();
        let sources: Vec<RenderSource<'_>> = canvases
            .iter()
            .map(|(extent, canvas)| RenderSource {
                extent: *extent,
                canvas: canvas.as_ref(),
            })
            .collect();

        let (width, height) = canvas_size(&self.target_extent, self.target_resolution, self.pixel_ratio);
        render(
            width,
            height,
            self.pixel_ratio,
            source_resolution,
            &self.target_extent,
            self.target_resolution,
            triangulation,
            &sources,
            self.options.resampling,
        )
        .map(Rc::new)
    }

    fn finish(&self, outcome: Result<Rc<Canvas>, ReprojError>) {
        let dependencies = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed || inner.state != ImageState::Loading {
                return;
            }
            inner.triangulation = None;
            match outcome {
                Ok(canvas) => {
                    inner.canvas = Some(canvas);
                    inner.state = ImageState::Loaded;
                }
                Err(err) => {
                    warn!(
                        source = self.source_projection.code(),
                        target = self.target_projection.code(),
                        error = %err,
                        "reprojection failed"
                    );
                    inner.error = Some(err);
                    inner.state = ImageState::Error;
                }
            }
            std::mem::take(&mut inner.dependencies)
        };
        release(dependencies);
        debug!(
            source = self.source_projection.code(),
            target = self.target_projection.code(),
            state = %self.state(),
            "reprojected image finished"
        );
        self.events.changed();
    }
}

fn release(dependencies: Vec<Dependency>) {
    for dependency in dependencies {
        dependency.image.un_by_key(dependency.key);
    }
}

/// The part of `extent` inside the target projection's validity extent.
fn limited_target_extent(target: &Projection, extent: &Extent) -> Extent {
    match max_extent(target) {
        Some(max) => extent.intersection(&max),
        None => *extent,
    }
}

impl ImageLike for ReprojectedImage {
    fn extent(&self) -> Extent {
        self.target_extent
    }

    fn resolution(&self) -> f64 {
        self.target_resolution
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn state(&self) -> ImageState {
        self.inner.borrow().state
    }

    fn image(&self) -> Option<Rc<Canvas>> {
        self.inner.borrow().canvas.clone()
    }

    fn load(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed || inner.state != ImageState::Idle {
                return;
            }
            inner.state = ImageState::Loading;
        }
        debug!(
            source = self.source_projection.code(),
            target = self.target_projection.code(),
            pass_through = self.is_pass_through(),
            "reprojected image loading"
        );
        self.events.changed();
        if self.is_disposed() {
            return;
        }

        let requested = match self.request_sources() {
            Ok(requested) => requested,
            Err(err) => {
                self.finish(Err(err));
                return;
            }
        };

        let mut dependencies = Vec::with_capacity(requested.len());
        for (image, offset_x) in requested {
            let this = self.this.clone();
            let key = image.on_change(Rc::new(move || {
                if let Some(this) = this.upgrade() {
                    this.check_dependencies();
                }
            }));
            dependencies.push(Dependency {
                image,
                key,
                offset_x,
            });
        }
        let images: Vec<Rc<dyn ImageLike>> =
            dependencies.iter().map(|d| Rc::clone(&d.image)).collect();
        {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                drop(inner);
                release(dependencies);
                return;
            }
            inner.dependencies = dependencies;
        }

        for image in images {
            if self.state() != ImageState::Loading {
                break;
            }
            image.load();
        }
        self.check_dependencies();
    }

    fn on_change(&self, listener: Listener) -> ListenerKey {
        self.events.on(EventType::Change, listener)
    }

    fn un_by_key(&self, key: ListenerKey) -> bool {
        self.events.un_by_key(key)
    }
}

impl Drop for ReprojectedImage {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ReprojectedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ReprojectedImage")
            .field("source", &self.source_projection.code())
            .field("target", &self.target_projection.code())
            .field("target_extent", &self.target_extent)
            .field("target_resolution", &self.target_resolution)
            .field("pixel_ratio", &self.pixel_ratio)
            .field("state", &inner.state)
            .field("dependencies", &inner.dependencies.len())
            .field("disposed", &inner.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::SourceImage;
    use crate::proj::{add_common, ProjectionRegistry, Units};

    fn common() -> (ProjectionRegistry, TransformRegistry) {
        let mut projections = ProjectionRegistry::new();
        let mut transforms = TransformRegistry::new();
        add_common(&mut projections, &mut transforms);
        (projections, transforms)
    }

    fn loaded_source(extent: &Extent, resolution: f64, pixel_ratio: f64) -> Rc<dyn ImageLike> {
        let (w, h) = canvas_size(extent, resolution, pixel_ratio);
        SourceImage::from_state(
            *extent,
            resolution,
            pixel_ratio,
            ImageState::Loaded,
            Some(Canvas::filled(w, h, [9, 9, 9, 255])),
        )
    }

    #[test]
    fn test_aliases_pass_through() {
        let (projections, transforms) = common();
        let image = ReprojectedImage::with_registry(
            &transforms,
            ReprojectionOptions::default(),
            projections.get("EPSG:3857").unwrap(),
            projections.get("EPSG:900913").unwrap(),
            Extent::new(0.0, 0.0, 100.0, 100.0),
            10.0,
            1.0,
            |extent, resolution, ratio| Some(loaded_source(extent, resolution, ratio)),
        );
        assert!(image.is_pass_through());
        image.load();
        assert_eq!(image.state(), ImageState::Loaded);
        assert_eq!(image.image().unwrap().width(), 10);
    }

    #[test]
    fn test_missing_transform_errors_on_load() {
        let transforms = TransformRegistry::new();
        let image = ReprojectedImage::with_registry(
            &transforms,
            ReprojectionOptions::default(),
            Arc::new(Projection::new("LOCAL:A", Units::Meters)),
            Arc::new(Projection::new("LOCAL:B", Units::Meters)),
            Extent::new(0.0, 0.0, 100.0, 100.0),
            10.0,
            1.0,
            |_, _, _| panic!("factory must not be called"),
        );
        assert_eq!(image.state(), ImageState::Idle);
        image.load();
        assert_eq!(image.state(), ImageState::Error);
        assert!(matches!(
            image.error(),
            Some(ReprojError::Projection(ProjError::NoTransform { .. }))
        ));
    }

    #[test]
    fn test_zero_area_extent_errors() {
        let (projections, transforms) = common();
        let image = ReprojectedImage::with_registry(
            &transforms,
            ReprojectionOptions::default(),
            projections.get("EPSG:4326").unwrap(),
            projections.get("EPSG:3857").unwrap(),
            Extent::new(0.0, 0.0, 0.0, 100.0),
            10.0,
            1.0,
            |extent, resolution, ratio| Some(loaded_source(extent, resolution, ratio)),
        );
        image.load();
        assert_eq!(image.state(), ImageState::Error);
        assert!(matches!(image.error(), Some(ReprojError::DegenerateGeometry(_))));
    }

    #[test]
    fn test_external_transform() {
        let options = ReprojectionOptions {
            resampling: crate::resample::ResamplingMethod::Nearest,
            ..Default::default()
        };
        let image = ReprojectedImage::with_transform(
            options,
            Arc::new(Projection::new("LOCAL:SRC", Units::Meters)),
            Arc::new(Projection::new("LOCAL:DST", Units::Meters)),
            TransformFn::from_point_fn(|x, y| (x + 1000.0, y)),
            Extent::new(0.0, 0.0, 40.0, 20.0),
            10.0,
            1.0,
            |extent, resolution, ratio| {
                assert!(extent.min_x >= 990.0);
                Some(loaded_source(extent, resolution, ratio))
            },
        );
        assert!(!image.is_pass_through());
        image.load();
        assert_eq!(image.state(), ImageState::Loaded);
        let canvas = image.image().unwrap();
        assert_eq!((canvas.width(), canvas.height()), (4, 2));
        assert_eq!(canvas.opaque_pixel_count(), 8);
        assert_eq!(canvas.pixel(3, 1), Some([9, 9, 9, 255]));
    }

    #[test]
    fn test_dispose_releases_canvas() {
        let (projections, transforms) = common();
        let image = ReprojectedImage::with_registry(
            &transforms,
            ReprojectionOptions::default(),
            projections.get("EPSG:3857").unwrap(),
            projections.get("EPSG:3857").unwrap(),
            Extent::new(0.0, 0.0, 100.0, 100.0),
            10.0,
            1.0,
            |extent, resolution, ratio| Some(loaded_source(extent, resolution, ratio)),
        );
        image.load();
        assert!(image.image().is_some());
        image.dispose();
        assert!(image.is_disposed());
        assert!(image.image().is_none());
        image.dispose();
    }
}
