//! Transform functions and the (source, destination) transform registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of ordinates per coordinate when none is given.
pub const DEFAULT_DIMENSION: usize = 2;

type InPlaceFn = dyn Fn(&mut [f64], usize) + Send + Sync;

/// A coordinate transform between two projections.
///
/// Operates on flat, interleaved coordinate buffers (`x0, y0, [z0, ...], x1,
/// y1, ...`) with a stride of `dimension` ordinates. Only the first two
/// ordinates of each coordinate are transformed; the rest pass through.
///
/// Cloning is cheap and clones share the same underlying function, so a
/// handle retrieved from a [`TransformRegistry`] stays usable after the
/// registry entry is replaced or cleared.
#[derive(Clone)]
pub struct TransformFn {
    func: Arc<InPlaceFn>,
    identity: bool,
}

impl TransformFn {
    /// Wrap an in-place `(buffer, dimension)` function.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&mut [f64], usize) + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            identity: false,
        }
    }

    /// Build a buffer transform from a single-point function.
    pub fn from_point_fn<F>(func: F) -> Self
    where
        F: Fn(f64, f64) -> (f64, f64) + Send + Sync + 'static,
    {
        Self::new(move |coords, dimension| {
            for c in coords.chunks_exact_mut(dimension.max(DEFAULT_DIMENSION)) {
                let (x, y) = func(c[0], c[1]);
                c[0] = x;
                c[1] = y;
            }
        })
    }

    /// The transform between two equivalent projections.
    pub fn identity() -> Self {
        Self {
            func: Arc::new(|_: &mut [f64], _: usize| {}),
            identity: true,
        }
    }

    /// True for transforms that leave coordinates untouched.
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Transform `coords` in place.
    pub fn apply_in_place(&self, coords: &mut [f64], dimension: usize) {
        (self.func)(coords, dimension.max(DEFAULT_DIMENSION));
    }

    /// Transform `input` into `output`, reusing its allocation when given.
    ///
    /// Returns the output buffer, resized to `input.len()`.
    pub fn apply(&self, input: &[f64], output: Option<Vec<f64>>, dimension: usize) -> Vec<f64> {
        let mut out = output.unwrap_or_default();
        out.clear();
        out.extend_from_slice(input);
        self.apply_in_place(&mut out, dimension);
        out
    }

    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        let mut xy = [x, y];
        self.apply_in_place(&mut xy, DEFAULT_DIMENSION);
        (xy[0], xy[1])
    }

    /// Chain two transforms: `self` first, then `next`.
    pub fn then(&self, next: &TransformFn) -> TransformFn {
        if self.identity {
            return next.clone();
        }
        if next.identity {
            return self.clone();
        }
        let first = Arc::clone(&self.func);
        let second = Arc::clone(&next.func);
        Self::new(move |coords, dimension| {
            first(coords, dimension);
            second(coords, dimension);
        })
    }

    /// True when both handles share the same underlying function.
    pub fn ptr_eq(&self, other: &TransformFn) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for TransformFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformFn")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Two-level map from source code to destination code to transform.
///
/// Directional: `(A, B)` and `(B, A)` are independent entries. Lookups of
/// unregistered pairs return `None`; no composite transforms are derived
/// here (see [`crate::proj::get_transform`]).
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, HashMap<String, TransformFn>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created empty on first use.
    pub fn global() -> &'static RwLock<TransformRegistry> {
        static GLOBAL: OnceLock<RwLock<TransformRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| RwLock::new(TransformRegistry::new()))
    }

    /// Read access to the process-wide registry.
    pub fn read_global() -> RwLockReadGuard<'static, TransformRegistry> {
        Self::global()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access to the process-wide registry.
    pub fn write_global() -> RwLockWriteGuard<'static, TransformRegistry> {
        Self::global()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove every registered transform.
    pub fn clear(&mut self) {
        self.transforms.clear();
    }

    /// Register `transform` for the ordered pair, replacing any previous one.
    pub fn add(&mut self, source: &str, destination: &str, transform: TransformFn) {
        self.transforms
            .entry(source.to_string())
            .or_default()
            .insert(destination.to_string(), transform);
    }

    /// Unregister the transform for the ordered pair and return it.
    ///
    /// # Panics
    ///
    /// Panics if no transform is registered for the pair. Use
    /// [`TransformRegistry::try_remove`] when absence is expected.
    pub fn remove(&mut self, source: &str, destination: &str) -> TransformFn {
        match self.try_remove(source, destination) {
            Some(transform) => transform,
            None => panic!("no transform registered from {source} to {destination}"),
        }
    }

    /// Unregister the transform for the ordered pair, if any.
    pub fn try_remove(&mut self, source: &str, destination: &str) -> Option<TransformFn> {
        let inner = self.transforms.get_mut(source)?;
        let removed = inner.remove(destination);
        if inner.is_empty() {
            self.transforms.remove(source);
        }
        removed
    }

    pub fn get(&self, source: &str, destination: &str) -> Option<TransformFn> {
        self.transforms.get(source)?.get(destination).cloned()
    }

    pub fn contains(&self, source: &str, destination: &str) -> bool {
        self.transforms
            .get(source)
            .is_some_and(|inner| inner.contains_key(destination))
    }

    /// Number of registered ordered pairs.
    pub fn len(&self) -> usize {
        self.transforms.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Number of source codes with at least one registered destination.
    pub fn source_count(&self) -> usize {
        self.transforms.len()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pairs: Vec<(&str, &str)> = self
            .transforms
            .iter()
            .flat_map(|(s, inner)| inner.keys().map(move |d| (s.as_str(), d.as_str())))
            .collect();
        pairs.sort_unstable();
        f.debug_struct("TransformRegistry")
            .field("pairs", &pairs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scale(factor: f64) -> TransformFn {
        TransformFn::from_point_fn(move |x, y| (x * factor, y * factor))
    }

    #[test]
    fn test_get_returns_registered_function() {
        let mut registry = TransformRegistry::new();
        let f = scale(2.0);
        registry.add("EPSG:A", "EPSG:B", f.clone());
        let got = registry.get("EPSG:A", "EPSG:B").unwrap();
        assert!(got.ptr_eq(&f));
    }

    #[test]
    fn test_add_overwrites() {
        let mut registry = TransformRegistry::new();
        let first = scale(2.0);
        let second = scale(3.0);
        registry.add("EPSG:A", "EPSG:B", first.clone());
        registry.add("EPSG:A", "EPSG:B", second.clone());
        let got = registry.get("EPSG:A", "EPSG:B").unwrap();
        assert!(got.ptr_eq(&second));
        assert!(!got.ptr_eq(&first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_pairs_are_directional() {
        let mut registry = TransformRegistry::new();
        registry.add("EPSG:A", "EPSG:B", scale(2.0));
        assert!(registry.get("EPSG:B", "EPSG:A").is_none());
    }

    #[test]
    fn test_remove_then_get_is_none() {
        let mut registry = TransformRegistry::new();
        let f = scale(2.0);
        registry.add("EPSG:A", "EPSG:B", f.clone());
        registry.add("EPSG:A", "EPSG:C", scale(4.0));

        let removed = registry.remove("EPSG:A", "EPSG:B");
        assert!(removed.ptr_eq(&f));
        assert!(registry.get("EPSG:A", "EPSG:B").is_none());
        assert!(registry.get("EPSG:A", "EPSG:C").is_some());
    }

    #[test]
    fn test_removing_last_pair_drops_source_bucket() {
        let mut registry = TransformRegistry::new();
        registry.add("EPSG:A", "EPSG:B", scale(2.0));
        registry.remove("EPSG:A", "EPSG:B");
        assert!(registry.is_empty());
        assert_eq!(registry.source_count(), 0);
        assert!(registry.get("EPSG:A", "EPSG:B").is_none());
        assert!(registry.get("EPSG:A", "EPSG:Z").is_none());
    }

    #[test]
    #[should_panic(expected = "no transform registered from EPSG:A to EPSG:B")]
    fn test_remove_missing_pair_panics() {
        let mut registry = TransformRegistry::new();
        registry.remove("EPSG:A", "EPSG:B");
    }

    #[test]
    fn test_try_remove_missing_pair() {
        let mut registry = TransformRegistry::new();
        registry.add("EPSG:A", "EPSG:C", scale(2.0));
        assert!(registry.try_remove("EPSG:A", "EPSG:B").is_none());
        assert!(registry.try_remove("EPSG:X", "EPSG:B").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clear_keeps_retrieved_handles_working() {
        let mut registry = TransformRegistry::new();
        registry.add("EPSG:A", "EPSG:B", scale(2.0));
        registry.add("EPSG:B", "EPSG:A", scale(0.5));
        let held = registry.get("EPSG:A", "EPSG:B").unwrap();

        registry.clear();
        assert!(registry.get("EPSG:A", "EPSG:B").is_none());
        assert!(registry.get("EPSG:B", "EPSG:A").is_none());
        assert_eq!(held.transform_point(1.0, 2.0), (2.0, 4.0));
    }

    #[test]
    fn test_apply_reuses_output_buffer() {
        let f = scale(10.0);
        let input = [1.0, 2.0, 3.0, 4.0];
        let buffer = Vec::with_capacity(16);
        let out = f.apply(&input, Some(buffer), 2);
        assert_eq!(out, vec![10.0, 20.0, 30.0, 40.0]);
        assert!(out.capacity() >= 16);
        // input untouched
        assert_eq!(input, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_stride_passes_extra_ordinates_through() {
        let f = scale(2.0);
        let mut coords = [1.0, 1.0, 7.0, 2.0, 2.0, 8.0];
        f.apply_in_place(&mut coords, 3);
        assert_eq!(coords, [2.0, 2.0, 7.0, 4.0, 4.0, 8.0]);
    }

    #[test]
    fn test_then_composes_in_order() {
        let add_one = TransformFn::from_point_fn(|x, y| (x + 1.0, y + 1.0));
        let double = scale(2.0);
        let composed = add_one.then(&double);
        let (x, y) = composed.transform_point(1.0, 2.0);
        assert_relative_eq!(x, 4.0);
        assert_relative_eq!(y, 6.0);

        let id = TransformFn::identity();
        assert!(id.then(&double).ptr_eq(&double));
        assert!(double.then(&id).ptr_eq(&double));
    }

    #[test]
    fn test_identity() {
        let id = TransformFn::identity();
        assert!(id.is_identity());
        assert!(!scale(1.0).is_identity());
        assert_eq!(id.transform_point(3.0, -4.0), (3.0, -4.0));
    }
}
