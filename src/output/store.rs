use crate::error::{Result, TryOnError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// 5 minutes
pub const DEFAULT_OUTPUT_TTL: Duration = Duration::from_secs(300);

/// Time source for expiry decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A generated artifact; write-once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOutput {
    pub data: Arc<[u8]>,
    pub content_type: String,
    /// `None` when the TTL reaches past what [`Instant`] can represent.
    pub expires_at: Option<Instant>,
}

impl StoredOutput {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Ephemeral artifact store keyed by opaque identifiers
///
/// Expired entries are evicted lazily when read; [`evict_expired`]
/// sweeps them on demand.
///
/// [`evict_expired`]: OutputStore::evict_expired
pub struct OutputStore {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, StoredOutput>>,
}

impl Default for OutputStore {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_TTL)
    }
}

impl OutputStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store `data` and return its freshly generated identifier
    pub fn save(&self, data: impl Into<Arc<[u8]>>, content_type: &str) -> String {
        let image_id = Uuid::new_v4().simple().to_string();
        let output = StoredOutput {
            data: data.into(),
            content_type: content_type.to_string(),
            expires_at: self.clock.now().checked_add(self.ttl),
        };

        self.entries.lock().insert(image_id.clone(), output);
        tracing::debug!("Stored output {} ({})", image_id, content_type);
        image_id
    }

    /// Fetch a live entry
    ///
    /// Missing and expired identifiers both fail as
    /// [`TryOnError::ArtifactNotFound`]; expired entries are removed.
    pub fn get(&self, image_id: &str) -> Result<StoredOutput> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(image_id) {
            None => return Err(not_found(image_id)),
            Some(output) => output.is_expired(self.clock.now()),
        };

        if expired {
            entries.remove(image_id);
            tracing::debug!("Output {} expired", image_id);
            return Err(not_found(image_id));
        }

        entries.get(image_id).cloned().ok_or_else(|| not_found(image_id))
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Remove all expired entries, returning how many were dropped
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, output| !output.is_expired(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl std::fmt::Debug for OutputStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStore")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish()
    }
}

fn not_found(image_id: &str) -> TryOnError {
    TryOnError::ArtifactNotFound {
        image_id: image_id.to_string(),
    }
}
