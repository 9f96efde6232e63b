use super::types::SegmentationBackend;
use anyhow::Result;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

pub const STUB_MODEL_NAME: &str = "stub-segmenter";
pub const STUB_MODEL_VERSION: &str = "stub-v0.1.0";

/// Constructs the native backend on first use
pub type BackendLoader = Box<dyn Fn() -> Result<Arc<dyn SegmentationBackend>> + Send + Sync>;

/// The shared segmentation model
///
/// `backend` is `None` for the stub model.
pub struct SegmenterModel {
    pub name: String,
    pub version: String,
    backend: Option<Arc<dyn SegmentationBackend>>,
}

impl SegmenterModel {
    fn native(backend: Arc<dyn SegmentationBackend>) -> Self {
        Self {
            name: backend.name().to_string(),
            version: backend.version().to_string(),
            backend: Some(backend),
        }
    }

    fn stub() -> Self {
        Self {
            name: STUB_MODEL_NAME.to_string(),
            version: STUB_MODEL_VERSION.to_string(),
            backend: None,
        }
    }

    pub fn backend(&self) -> Option<&Arc<dyn SegmentationBackend>> {
        self.backend.as_ref()
    }

    pub fn is_stub(&self) -> bool {
        self.backend.is_none()
    }
}

impl fmt::Debug for SegmenterModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmenterModel")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("native", &self.backend.is_some())
            .finish()
    }
}

/// Lazily constructed, process-wide handle to the segmentation model
///
/// At most one [`SegmenterModel`] is live at a time. Construction happens
/// under the cache lock so concurrent first callers share one instance.
pub struct ModelCache {
    slot: Mutex<Option<Arc<SegmenterModel>>>,
    loader: BackendLoader,
}

impl ModelCache {
    pub fn new(loader: BackendLoader) -> Self {
        Self {
            slot: Mutex::new(None),
            loader,
        }
    }

    /// Cache whose native initialization always fails, yielding the stub
    pub fn stub_only() -> Self {
        Self::new(Box::new(|| -> Result<Arc<dyn SegmentationBackend>> {
            anyhow::bail!("native segmentation disabled")
        }))
    }

    /// Return the cached model, constructing it on first use
    ///
    /// Never fails: a native initialization error degrades to the stub model.
    pub fn acquire(&self) -> Arc<SegmenterModel> {
        let mut slot = self.slot.lock();
        if let Some(model) = slot.as_ref() {
            return Arc::clone(model);
        }

        let model = match (self.loader)() {
            Ok(backend) => {
                let model = SegmenterModel::native(backend);
                tracing::info!("Segmenter {} ({}) initialized", model.name, model.version);
                model
            }
            Err(err) => {
                tracing::warn!("Native segmenter unavailable, using stub: {:#}", err);
                SegmenterModel::stub()
            }
        };

        let model = Arc::new(model);
        *slot = Some(Arc::clone(&model));
        model
    }

    /// Drop the cached model so the next [`acquire`](Self::acquire) rebuilds it
    ///
    /// Native resources are released best-effort; release errors are logged.
    pub fn reset(&self) {
        let mut slot = self.slot.lock();
        if let Some(backend) = slot.as_ref().and_then(|model| model.backend()) {
            if let Err(err) = backend.release() {
                tracing::warn!("Failed to release segmenter backend: {:#}", err);
            }
        }
        if slot.take().is_some() {
            tracing::info!("Segmenter cache reset");
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCache")
            .field("slot", &*self.slot.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::types::Matte;
    use image::RgbImage;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[derive(Default)]
    struct FakeBackend {
        released: AtomicBool,
        fail_release: bool,
    }

    impl SegmentationBackend for FakeBackend {
        fn name(&self) -> &str {
            "fake-segmenter"
        }

        fn version(&self) -> &str {
            "fake-v1"
        }

        fn segment(&self, _frame: &RgbImage) -> Result<Option<Matte>> {
            Ok(None)
        }

        fn release(&self) -> Result<()> {
            self.released.store(true, Ordering::SeqCst);
            if self.fail_release {
                anyhow::bail!("release failed");
            }
            Ok(())
        }
    }

    fn counting_cache(counter: Arc<AtomicUsize>) -> ModelCache {
        ModelCache::new(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeBackend::default()) as Arc<dyn SegmentationBackend>)
        }))
    }

    #[test]
    fn acquire_returns_same_instance() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Arc::clone(&counter));

        let first = cache.acquire();
        let second = cache.acquire();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name, "fake-segmenter");
        assert_eq!(first.version, "fake-v1");
        assert!(!first.is_stub());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_first_access_constructs_once() {
        const CALLERS: usize = 16;
        let counter = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(counting_cache(Arc::clone(&counter)));
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.acquire()
                })
            })
            .collect();

        let models: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(models.iter().all(|m| Arc::ptr_eq(m, &models[0])));
    }

    #[test]
    fn failing_loader_degrades_to_stub() {
        let cache = ModelCache::new(Box::new(|| -> Result<Arc<dyn SegmentationBackend>> {
            anyhow::bail!("no runtime")
        }));
        let model = cache.acquire();

        assert!(model.is_stub());
        assert_eq!(model.name, STUB_MODEL_NAME);
        assert_eq!(model.version, STUB_MODEL_VERSION);
    }

    #[test]
    fn reset_releases_backend_and_rebuilds() {
        let backend = Arc::new(FakeBackend::default());
        let counter = Arc::new(AtomicUsize::new(0));
        let cache = {
            let backend = Arc::clone(&backend);
            let counter = Arc::clone(&counter);
            ModelCache::new(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::clone(&backend) as Arc<dyn SegmentationBackend>)
            }))
        };

        let first = cache.acquire();
        cache.reset();
        assert!(backend.released.load(Ordering::SeqCst));
        assert!(!cache.is_loaded());

        let second = cache.acquire();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reset_swallows_release_failure() {
        let backend = Arc::new(FakeBackend {
            fail_release: true,
            ..FakeBackend::default()
        });
        let cache = {
            let backend = Arc::clone(&backend);
            ModelCache::new(Box::new(move || {
                Ok(Arc::clone(&backend) as Arc<dyn SegmentationBackend>)
            }))
        };

        cache.acquire();
        cache.reset();

        assert!(backend.released.load(Ordering::SeqCst));
        assert!(!cache.is_loaded());
    }

    #[test]
    fn reset_on_empty_cache_is_noop() {
        let cache = ModelCache::stub_only();
        cache.reset();
        assert!(!cache.is_loaded());
        assert!(cache.acquire().is_stub());
    }
}
