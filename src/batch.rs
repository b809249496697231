//! Batch Orchestrator: one job per input, strictly in sequence, stop on first failure.

use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, ValidationError};
use crate::ffmpeg::{
    Capabilities, MediaEngine, PlannedCommand, ProgressTracker, build_ffmpeg_command,
};
use crate::job::{JobOutcome, JobRequest};
use crate::timecode::format_clock;

pub const ALL_JOBS_FINISHED: &str = "All jobs finished.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSettings {
    /// A trim end this close to (or past) the probed duration means "to end of file".
    /// Also the minimum clip length kept after trimming.
    pub trim_end_epsilon: f64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            trim_end_epsilon: 0.01,
        }
    }
}

/// Pushed to the caller in order, from the batch's worker thread.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Started { index: usize, input_path: PathBuf },
    Log { index: usize, line: String },
    Progress { index: usize, percent: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum JobStatus {
    Succeeded { outcome: JobOutcome },
    #[serde(rename_all = "camelCase")]
    Failed {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub index: usize,
    pub input_path: PathBuf,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub succeeded: bool,
    pub message: String,
    pub reports: Vec<JobReport>,
}

impl BatchOutcome {
    pub fn failed_report(&self) -> Option<&JobReport> {
        self.reports
            .iter()
            .find(|r| matches!(r.status, JobStatus::Failed { .. }))
    }
}

/// Re-checks trim bounds against a freshly probed duration. An unknown or zero
/// duration leaves the end bound as requested.
pub fn sanitize_trim(
    request: &JobRequest,
    duration: Option<f64>,
    settings: &BatchSettings,
) -> Result<JobRequest, ValidationError> {
    let mut request = request.clone();
    if !request.trim_enabled {
        return Ok(request);
    }
    let Some(start) = request.trim_start else {
        return Ok(request);
    };
    let duration = duration.filter(|d| *d > 0.0);
    if let Some(d) = duration
        && start >= d
    {
        return Err(ValidationError::TrimStartBeyondDuration);
    }
    let eps = settings.trim_end_epsilon;
    if let (Some(end), Some(d)) = (request.trim_end, duration)
        && end >= d - eps
    {
        request.trim_end = None;
    }
    if let Some(end) = request.trim_end
        && end <= start + eps
    {
        request.trim_end = None;
    }
    Ok(request)
}

/// Everything up to the subprocess for one request: fresh duration, trim
/// sanitisation, output path, codec probe, planning. Also returns the duration
/// used to seed progress. Errors are validation only.
pub fn plan_job(
    engine: &dyn MediaEngine,
    caps: &Capabilities,
    request: &JobRequest,
    batch_len: usize,
    settings: &BatchSettings,
) -> Result<(PlannedCommand, Option<f64>), ValidationError> {
    let duration = engine.duration(&request.input_path);
    let request = sanitize_trim(request, duration, settings)?;
    let output_path = request.resolve_output_path(batch_len)?;
    let codec = engine.video_codec(&request.input_path);
    let command = build_ffmpeg_command(&request, &output_path, caps, codec.as_deref())?;
    Ok((command, duration))
}

/// Runs `requests` in order. The first validation or engine failure stops the
/// queue; later requests are reported as not attempted.
pub fn run_batch(
    engine: &dyn MediaEngine,
    caps: &Capabilities,
    requests: &[JobRequest],
    settings: &BatchSettings,
    sink: &mut dyn FnMut(JobEvent),
) -> BatchOutcome {
    if requests.is_empty() {
        return BatchOutcome {
            succeeded: false,
            message: ValidationError::NoInputs.to_string(),
            reports: Vec::new(),
        };
    }

    let batch_len = requests.len();
    let mut reports: Vec<JobReport> = requests
        .iter()
        .enumerate()
        .map(|(index, r)| JobReport {
            index,
            input_path: r.input_path.clone(),
            status: JobStatus::NotAttempted,
        })
        .collect();

    for (index, request) in requests.iter().enumerate() {
        let (command, duration) = match plan_job(engine, caps, request, batch_len, settings) {
            Ok(planned) => planned,
            Err(e) => {
                log::warn!(
                    target: "vidtools::batch",
                    "job {} rejected: {}",
                    index,
                    e
                );
                let message = e.to_string();
                reports[index].status = JobStatus::Failed {
                    message: message.clone(),
                    exit_code: None,
                };
                return BatchOutcome {
                    succeeded: false,
                    message,
                    reports,
                };
            }
        };

        sink(JobEvent::Started {
            index,
            input_path: request.input_path.clone(),
        });
        sink(JobEvent::Progress {
            index,
            percent: 0.0,
        });
        let mut tracker = ProgressTracker::with_duration(duration);
        let result = engine.run(command, &mut |line: &str| {
            sink(JobEvent::Log {
                index,
                line: line.to_string(),
            });
            if let Some(percent) = tracker.on_line(line) {
                sink(JobEvent::Progress { index, percent });
            }
        });

        let exit_code = match result {
            Ok(0) => None,
            Ok(code) => Some(code),
            Err(e) => {
                sink(JobEvent::Log {
                    index,
                    line: e.to_string(),
                });
                Some(-1)
            }
        };
        if let Some(code) = exit_code {
            let message = AppError::ffmpeg_failed(code).to_string();
            reports[index].status = JobStatus::Failed {
                message: message.clone(),
                exit_code: Some(code),
            };
            return BatchOutcome {
                succeeded: false,
                message,
                reports,
            };
        }
        reports[index].status = JobStatus::Succeeded {
            outcome: JobOutcome::from_exit_code(0),
        };
        log::info!(
            target: "vidtools::batch",
            "job {}/{} finished: {} ({})",
            index + 1,
            batch_len,
            request.input_path.display(),
            format_clock(duration)
        );
    }

    BatchOutcome {
        succeeded: true,
        message: ALL_JOBS_FINISHED.to_string(),
        reports,
    }
}

/// A batch running on its own worker thread. Events arrive on `events` in order;
/// the channel closes when the batch ends.
pub struct BatchHandle {
    pub events: Receiver<JobEvent>,
    handle: thread::JoinHandle<BatchOutcome>,
}

impl BatchHandle {
    pub fn join(self) -> Result<BatchOutcome, AppError> {
        self.handle
            .join()
            .map_err(|_| AppError::from("Batch worker panicked"))
    }
}

pub fn spawn_batch(
    engine: Arc<dyn MediaEngine>,
    caps: Arc<Capabilities>,
    requests: Vec<JobRequest>,
    settings: BatchSettings,
) -> BatchHandle {
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        run_batch(engine.as_ref(), &caps, &requests, &settings, &mut |event: JobEvent| {
            let _ = tx.send(event);
        })
    });
    BatchHandle { events: rx, handle }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortMode {
    #[default]
    #[serde(rename = "Name A-Z")]
    NameAsc,
    #[serde(rename = "Name Z-A")]
    NameDesc,
    #[serde(rename = "Date Newest")]
    DateNewest,
    #[serde(rename = "Date Oldest")]
    DateOldest,
    #[serde(rename = "Size Largest")]
    SizeLargest,
    #[serde(rename = "Size Smallest")]
    SizeSmallest,
}

fn name_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Unreadable files sort as oldest / smallest.
fn modified_key(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

fn size_key(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Stable sort of a batch input list.
pub fn sort_inputs(inputs: &mut [PathBuf], mode: SortMode) {
    match mode {
        SortMode::NameAsc => inputs.sort_by_cached_key(|p| name_key(p)),
        SortMode::NameDesc => inputs.sort_by_cached_key(|p| Reverse(name_key(p))),
        SortMode::DateNewest => inputs.sort_by_cached_key(|p| Reverse(modified_key(p))),
        SortMode::DateOldest => inputs.sort_by_cached_key(|p| modified_key(p)),
        SortMode::SizeLargest => inputs.sort_by_cached_key(|p| Reverse(size_key(p))),
        SortMode::SizeSmallest => inputs.sort_by_cached_key(|p| size_key(p)),
    }
}
