use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::batch::{
    BatchOutcome, BatchSettings, JobEvent, SortMode, plan_job, sort_inputs, spawn_batch,
};
use crate::error::AppError;
use crate::ffmpeg::{
    Capabilities, MediaEngine, MediaInfo, Toolchain, cleanup_old_temp_files,
    format_args_for_display_multiline, path_to_string,
};
use crate::job::JobRequest;
use crate::presets::Preset;
use crate::preview::{PreviewError, PreviewGenerator, PreviewSettings};

const PROTOCOL_VERSION: u8 = 1;

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppCapabilitiesResult {
    pub protocol_version: u8,
    pub ffmpeg_found: bool,
    pub encoders: Vec<String>,
    pub decoders: Vec<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResult {
    pub args: Vec<String>,
    pub display: String,
    pub display_multiline: String,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSaved {
    pub saved_path: String,
    pub cached: bool,
}

/// Engine-owning state for one sidecar process: the engine (absent when ffmpeg
/// was not found), the capability set probed once at startup, the preview
/// generator and the async runtime previews run on.
pub struct Session {
    engine: Option<Arc<dyn MediaEngine>>,
    caps: Arc<Capabilities>,
    preview: Option<PreviewGenerator>,
    batch_settings: BatchSettings,
    batch_gate: Mutex<()>,
    // Owns the worker threads behind `preview`.
    _runtime: tokio::runtime::Runtime,
}

fn build_runtime() -> Result<tokio::runtime::Runtime, AppError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|e| AppError::from(format!("Failed to initialize async runtime: {}", e)))
}

impl Session {
    /// Discovers ffmpeg and probes its capabilities. A missing ffmpeg is not an
    /// error here; it is reported through `capabilities()` and per request.
    pub fn start() -> Result<Self, AppError> {
        match Toolchain::discover() {
            Ok(toolchain) => {
                let caps = toolchain.probe_capabilities();
                log::info!(
                    target: "vidtools::sidecar_api",
                    "ffmpeg at {} ({} encoders, {} decoders)",
                    toolchain.ffmpeg().display(),
                    caps.encoders().len(),
                    caps.decoders().len()
                );
                Self::with_engine(Some(Arc::new(toolchain)), caps)
            }
            Err(e) => {
                log::warn!(target: "vidtools::sidecar_api", "{}", e);
                Self::with_engine(None, Capabilities::default())
            }
        }
    }

    pub fn with_engine(
        engine: Option<Arc<dyn MediaEngine>>,
        caps: Capabilities,
    ) -> Result<Self, AppError> {
        let runtime = build_runtime()?;
        let caps = Arc::new(caps);
        let preview = engine.as_ref().map(|engine| {
            PreviewGenerator::new(
                Arc::clone(engine),
                Arc::clone(&caps),
                PreviewSettings::default(),
                runtime.handle().clone(),
            )
        });
        Ok(Self {
            engine,
            caps,
            preview,
            batch_settings: BatchSettings::default(),
            batch_gate: Mutex::new(()),
            _runtime: runtime,
        })
    }

    pub fn ffmpeg_found(&self) -> bool {
        self.engine.is_some()
    }

    fn engine(&self) -> Result<&Arc<dyn MediaEngine>, AppError> {
        self.engine.as_ref().ok_or_else(|| {
            AppError::FfmpegNotFound(
                "FFmpeg not found. Install FFmpeg or set FFMPEG_PATH.".to_string(),
            )
        })
    }

    fn preview(&self) -> Result<&PreviewGenerator, AppError> {
        self.engine()?;
        self.preview
            .as_ref()
            .ok_or_else(|| AppError::from("Preview generator unavailable"))
    }

    pub fn capabilities(&self) -> AppCapabilitiesResult {
        AppCapabilitiesResult {
            protocol_version: PROTOCOL_VERSION,
            ffmpeg_found: self.ffmpeg_found(),
            encoders: self.caps.encoders().iter().cloned().collect(),
            decoders: self.caps.decoders().iter().cloned().collect(),
        }
    }

    pub fn inspect(&self, path: &Path) -> Result<MediaInfo, AppError> {
        Ok(self.engine()?.inspect(path))
    }

    /// Plans without running. `preset` is applied on top of `request` first.
    pub fn plan(
        &self,
        mut request: JobRequest,
        batch_size: usize,
        preset: Option<Preset>,
    ) -> Result<PlanResult, AppError> {
        if let Some(preset) = preset {
            log::debug!(target: "vidtools::sidecar_api", "applying preset {}", preset);
            preset.apply(&mut request);
        }
        let engine = self.engine()?;
        let (command, _) = plan_job(
            engine.as_ref(),
            &self.caps,
            &request,
            batch_size.max(1),
            &self.batch_settings,
        )?;
        Ok(PlanResult {
            display: command.display(),
            display_multiline: format_args_for_display_multiline(command.args()),
            args: command.into_args(),
        })
    }

    /// Runs the batch on its own worker thread and forwards its events, in
    /// order, to `on_event` on the calling thread. One batch at a time.
    pub fn run_batch(
        &self,
        requests: Vec<JobRequest>,
        mut on_event: impl FnMut(JobEvent),
    ) -> Result<BatchOutcome, AppError> {
        let Some(_running) = self.batch_gate.try_lock() else {
            return Err(AppError::from("Another batch is already running"));
        };
        let engine = Arc::clone(self.engine()?);
        let handle = spawn_batch(engine, Arc::clone(&self.caps), requests, self.batch_settings);
        for event in handle.events.iter() {
            on_event(event);
        }
        handle.join()
    }

    /// Debounced preview written to `output_path`. Blocks the calling thread until
    /// the frame is ready; a request superseded by a newer one fails with
    /// `AppError::Aborted`. Must not be called from inside the async runtime.
    pub fn preview_to_file(
        &self,
        input_path: PathBuf,
        timestamp_seconds: f64,
        force: bool,
        output_path: &Path,
    ) -> Result<PreviewSaved, AppError> {
        let preview = self.preview()?;
        let (tx, rx) = tokio::sync::oneshot::channel();
        preview.schedule(input_path, timestamp_seconds, force, move |update| {
            let _ = tx.send(update.result);
        });
        // A dropped sender means the request was superseded or cancelled.
        let frame = rx
            .blocking_recv()
            .unwrap_or(Err(PreviewError::Cancelled))
            .map_err(|e| match e {
                PreviewError::Cancelled => AppError::Aborted,
                other => AppError::from(other.to_string()),
            })?;
        fs::write(output_path, frame.bytes.as_slice())?;
        Ok(PreviewSaved {
            saved_path: path_to_string(output_path),
            cached: frame.cached,
        })
    }

    pub fn cancel_preview(&self) -> bool {
        self.preview
            .as_ref()
            .is_some_and(PreviewGenerator::cancel_pending)
    }

    pub fn sort_inputs(&self, mut inputs: Vec<PathBuf>, mode: SortMode) -> Vec<PathBuf> {
        sort_inputs(&mut inputs, mode);
        inputs
    }
}

pub fn cleanup_startup_temp(max_age: Duration) {
    cleanup_old_temp_files(max_age);
}
