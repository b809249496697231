//! Preview frame cache: bounded, evicts strictly in insertion order.
//!
//! Keyed by (input path, half-second bucket) so scrubbing back and forth over
//! the same spot does not spawn FFmpeg again. Lookups do not refresh an entry.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const PREVIEW_CACHE_MAX_ENTRIES: usize = 20;

#[derive(Clone, Hash, Eq, PartialEq, Debug)]
pub struct PreviewCacheKey {
    pub input_path: PathBuf,
    pub time_bucket: i64,
}

impl PreviewCacheKey {
    pub fn new(input_path: &Path, timestamp_seconds: f64) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            time_bucket: time_bucket(timestamp_seconds),
        }
    }
}

/// `floor(t * 2)`: half-second granularity.
pub fn time_bucket(timestamp_seconds: f64) -> i64 {
    if !timestamp_seconds.is_finite() {
        return 0;
    }
    (timestamp_seconds * 2.0).floor() as i64
}

/// Encoded frame bytes, shared with callers without copying.
pub type FrameBytes = Arc<Vec<u8>>;

pub struct PreviewCache {
    capacity: usize,
    /// front = oldest insertion.
    order: VecDeque<PreviewCacheKey>,
    entries: HashMap<PreviewCacheKey, FrameBytes>,
}

impl Default for PreviewCache {
    fn default() -> Self {
        Self::with_capacity(PREVIEW_CACHE_MAX_ENTRIES)
    }
}

impl PreviewCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::with_capacity(capacity),
            entries: HashMap::with_capacity(capacity),
        }
    }

    pub fn get(&self, key: &PreviewCacheKey) -> Option<FrameBytes> {
        self.entries.get(key).cloned()
    }

    /// Insert or replace. Replacing keeps the original insertion position.
    pub fn insert(&mut self, key: PreviewCacheKey, frame: FrameBytes) {
        if self.entries.insert(key.clone(), frame).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            self.evict_one();
        }
    }

    fn evict_one(&mut self) {
        let Some(key) = self.order.pop_front() else {
            return;
        };
        log::trace!(
            target: "vidtools::ffmpeg::cache",
            "evicting preview {} @ bucket {}",
            key.input_path.display(),
            key.time_bucket
        );
        self.entries.remove(&key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
