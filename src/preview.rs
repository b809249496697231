//! Still-frame previews with a bounded cache and debounced scheduling.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::ffmpeg::{
    Capabilities, FrameBytes, MediaEngine, PreviewCache, PreviewCacheKey, TempFileManager,
    build_frame_extract_command,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewSettings {
    pub width: u32,
    /// `-q:v` for the extracted image; lower is better.
    pub quality: u32,
    pub cache_capacity: usize,
    pub debounce: Duration,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            width: 360,
            quality: 2,
            cache_capacity: crate::ffmpeg::PREVIEW_CACHE_MAX_ENTRIES,
            debounce: Duration::from_millis(200),
        }
    }
}

/// Cosmetic failures. Callers keep the previous image or show a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreviewError {
    #[error("Input file does not exist.")]
    InputMissing,

    #[error("Preview unavailable: decoder missing for '{codec}'.")]
    DecoderMissing { codec: String },

    #[error("Preview failed: {0}")]
    ExtractionFailed(String),

    #[error("Preview superseded")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewFrame {
    pub bytes: FrameBytes,
    pub cached: bool,
}

/// Delivered only for the latest scheduled request.
#[derive(Debug)]
pub struct PreviewUpdate {
    pub token: u64,
    pub input_path: PathBuf,
    pub timestamp_seconds: f64,
    pub result: Result<PreviewFrame, PreviewError>,
}

struct Inner {
    engine: Arc<dyn MediaEngine>,
    caps: Arc<Capabilities>,
    cache: Mutex<PreviewCache>,
    settings: PreviewSettings,
    temp: TempFileManager,
    latest_token: AtomicU64,
}

/// Lets a scheduled request bail out while it is still cheap to do so.
struct StartGate {
    token: u64,
    started: Arc<AtomicBool>,
}

impl Inner {
    fn is_latest(&self, token: u64) -> bool {
        self.latest_token.load(Ordering::SeqCst) == token
    }

    async fn video_codec(&self, path: &Path) -> Option<String> {
        let engine = Arc::clone(&self.engine);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || engine.video_codec(&path))
            .await
            .ok()
            .flatten()
    }

    async fn generate(
        &self,
        input_path: &Path,
        timestamp_seconds: f64,
        gate: Option<&StartGate>,
    ) -> Result<PreviewFrame, PreviewError> {
        if !input_path.is_file() {
            return Err(PreviewError::InputMissing);
        }
        if let Some(codec) = self.video_codec(input_path).await
            && !self.caps.has_decoder(&codec)
        {
            return Err(PreviewError::DecoderMissing { codec });
        }

        let key = PreviewCacheKey::new(input_path, timestamp_seconds);
        let cached = self.cache.lock().get(&key);
        if let Some(bytes) = cached {
            log::debug!(
                target: "vidtools::preview",
                "cache hit {} @ {:.3}s",
                input_path.display(),
                timestamp_seconds
            );
            return Ok(PreviewFrame {
                bytes,
                cached: true,
            });
        }

        if let Some(gate) = gate {
            if !self.is_latest(gate.token) {
                return Err(PreviewError::Cancelled);
            }
            gate.started.store(true, Ordering::SeqCst);
        }

        let artifact = self.temp.create("preview.png");
        let command = build_frame_extract_command(
            input_path,
            timestamp_seconds,
            artifact.path(),
            self.settings.width,
            self.settings.quality,
        );
        let engine = Arc::clone(&self.engine);
        let extracted = tokio::task::spawn_blocking(move || {
            let code = engine
                .run(command, &mut |line: &str| {
                    log::trace!(target: "vidtools::preview", "{}", line)
                })
                .map_err(|e| PreviewError::ExtractionFailed(e.to_string()))?;
            if code != 0 {
                return Err(PreviewError::ExtractionFailed(format!(
                    "FFmpeg exited with code {}",
                    code
                )));
            }
            let bytes = fs::read(artifact.path())
                .map_err(|e| PreviewError::ExtractionFailed(e.to_string()))?;
            if bytes.is_empty() {
                return Err(PreviewError::ExtractionFailed("empty frame".to_string()));
            }
            Ok(bytes)
            // artifact dropped here: temp file removed on every path
        })
        .await
        .map_err(|e| PreviewError::ExtractionFailed(e.to_string()))??;

        let bytes: FrameBytes = Arc::new(extracted);
        self.cache.lock().insert(key, Arc::clone(&bytes));
        Ok(PreviewFrame {
            bytes,
            cached: false,
        })
    }
}

struct Pending {
    handle: JoinHandle<()>,
    started: Arc<AtomicBool>,
}

pub struct PreviewGenerator {
    inner: Arc<Inner>,
    pending: Mutex<Option<Pending>>,
    runtime: Handle,
}

impl PreviewGenerator {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        caps: Arc<Capabilities>,
        settings: PreviewSettings,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                caps,
                cache: Mutex::new(PreviewCache::with_capacity(settings.cache_capacity)),
                settings,
                temp: TempFileManager,
                latest_token: AtomicU64::new(0),
            }),
            pending: Mutex::new(None),
            runtime,
        }
    }

    pub fn cached_frames(&self) -> usize {
        self.inner.cache.lock().len()
    }

    /// One preview, no debounce and no token check.
    pub async fn generate_preview(
        &self,
        input_path: &Path,
        timestamp_seconds: f64,
    ) -> Result<PreviewFrame, PreviewError> {
        self.inner
            .generate(input_path, timestamp_seconds, None)
            .await
    }

    /// Debounced preview. Each call supersedes the previous one: a superseded
    /// request that has not spawned FFmpeg yet is dropped, one that has runs to
    /// completion (filling the cache) but never reaches its `on_ready`.
    /// `force` skips the debounce delay, e.g. on new file selection.
    /// Returns the request token.
    pub fn schedule<F>(
        &self,
        input_path: PathBuf,
        timestamp_seconds: f64,
        force: bool,
        on_ready: F,
    ) -> u64
    where
        F: FnOnce(PreviewUpdate) + Send + 'static,
    {
        let token = self.inner.latest_token.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Arc::new(AtomicBool::new(false));
        let inner = Arc::clone(&self.inner);
        let delay = (!force).then_some(self.inner.settings.debounce);
        let gate = StartGate {
            token,
            started: Arc::clone(&started),
        };

        let handle = self.runtime.spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if !inner.is_latest(token) {
                return;
            }
            let result = inner
                .generate(&input_path, timestamp_seconds, Some(&gate))
                .await;
            if !inner.is_latest(token) {
                log::debug!(
                    target: "vidtools::preview",
                    "discarding stale preview token={} latest={}",
                    token,
                    inner.latest_token.load(Ordering::SeqCst)
                );
                return;
            }
            on_ready(PreviewUpdate {
                token,
                input_path,
                timestamp_seconds,
                result,
            });
        });

        let previous = self.pending.lock().replace(Pending { handle, started });
        if let Some(previous) = previous {
            Self::abort_if_not_started(previous);
        }
        token
    }

    /// Drops the pending request. Returns false when there was none or its
    /// FFmpeg run had already started; a started run still completes, but its
    /// result is discarded.
    pub fn cancel_pending(&self) -> bool {
        self.inner.latest_token.fetch_add(1, Ordering::SeqCst);
        match self.pending.lock().take() {
            Some(pending) => Self::abort_if_not_started(pending),
            None => false,
        }
    }

    fn abort_if_not_started(pending: Pending) -> bool {
        if pending.handle.is_finished() || pending.started.load(Ordering::SeqCst) {
            return false;
        }
        pending.handle.abort();
        true
    }
}
