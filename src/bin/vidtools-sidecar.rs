use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use vidtools_core::batch::{JobEvent, SortMode};
use vidtools_core::error::AppError;
use vidtools_core::ffmpeg::FfmpegProgressPayload;
use vidtools_core::job::JobRequest;
use vidtools_core::presets::Preset;
use vidtools_core::sidecar_api::{self, Session};

const STARTUP_CLEANUP_MAX_AGE_HOURS: u64 = 24;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    id: u64,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, serde::Serialize)]
struct RpcSuccess {
    id: u64,
    result: Value,
}

#[derive(Debug, serde::Serialize)]
struct RpcFailure {
    id: u64,
    error: RpcErrorPayload,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RpcErrorPayload {
    summary: String,
    detail: String,
}

#[derive(Debug, serde::Serialize)]
struct RpcEvent {
    event: String,
    payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InspectParams {
    input_path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanParams {
    request: JobRequest,
    batch_size: Option<usize>,
    preset: Option<Preset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchParams {
    #[serde(default)]
    requests: Vec<JobRequest>,
    /// Alternative to `requests`: one set of settings fanned out over `inputPaths`.
    template: Option<JobRequest>,
    #[serde(default)]
    input_paths: Vec<PathBuf>,
}

impl BatchParams {
    fn into_requests(self) -> Vec<JobRequest> {
        match self.template {
            Some(template) => self
                .input_paths
                .into_iter()
                .map(|p| template.for_input(p))
                .collect(),
            None => self.requests,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewParams {
    input_path: PathBuf,
    timestamp_seconds: f64,
    output_path: PathBuf,
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SortParams {
    input_paths: Vec<PathBuf>,
    #[serde(default)]
    mode: SortMode,
}

type SharedWriter = Arc<Mutex<io::Stdout>>;

fn write_json_line<T: serde::Serialize>(writer: &mut impl Write, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, value)
        .map_err(|e| io::Error::other(format!("serialize response: {}", e)))?;
    writer.write_all(b"\n")?;
    writer.flush()
}

fn write_json_line_shared<T: serde::Serialize>(writer: &SharedWriter, value: &T) -> io::Result<()> {
    let mut guard = writer.lock();
    write_json_line(&mut *guard, value)
}

fn emit_rpc_event(writer: &SharedWriter, event: &str, payload: Value) {
    let message = RpcEvent {
        event: event.to_string(),
        payload,
    };
    let _ = write_json_line_shared(writer, &message);
}

fn emit_job_event(writer: &SharedWriter, event: JobEvent) {
    match event {
        JobEvent::Started { index, input_path } => emit_rpc_event(
            writer,
            "media.job.started",
            json!({ "index": index, "inputPath": input_path.to_string_lossy() }),
        ),
        JobEvent::Log { index, line } => emit_rpc_event(
            writer,
            "media.job.log",
            json!({ "index": index, "line": line }),
        ),
        JobEvent::Progress { index, percent } => emit_rpc_event(
            writer,
            "media.job.progress",
            serde_json::to_value(FfmpegProgressPayload { index, percent }).unwrap_or(Value::Null),
        ),
    }
}

fn parse_error_payload(err: &AppError) -> RpcErrorPayload {
    let summary = err.to_string();
    let detail = match err {
        AppError::Validation(_) => "Request rejected before FFmpeg was started.".to_string(),
        AppError::Aborted => "Superseded by a newer request.".to_string(),
        _ => summary.clone(),
    };
    RpcErrorPayload { summary, detail }
}

fn params_from_value<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, AppError> {
    serde_json::from_value(params)
        .map_err(|e| AppError::from(format!("Invalid params payload: {}", e)))
}

fn to_result_value<T: serde::Serialize>(value: T, what: &str) -> Result<Value, AppError> {
    serde_json::to_value(value)
        .map_err(|e| AppError::from(format!("Failed to serialize {}: {}", what, e)))
}

fn is_async_request(method: &str) -> bool {
    matches!(method, "media.batch" | "media.preview")
}

fn dispatch_sync(method: &str, params: Value, session: &Session) -> Result<Value, AppError> {
    match method {
        "app.capabilities" => to_result_value(session.capabilities(), "app capabilities"),
        "media.inspect" => {
            let parsed: InspectParams = params_from_value(params)?;
            to_result_value(session.inspect(&parsed.input_path)?, "media info")
        }
        "media.plan" => {
            let parsed: PlanParams = params_from_value(params)?;
            let plan = session.plan(
                parsed.request,
                parsed.batch_size.unwrap_or(1),
                parsed.preset,
            )?;
            to_result_value(plan, "plan")
        }
        "media.sort" => {
            let parsed: SortParams = params_from_value(params)?;
            let sorted: Vec<String> = session
                .sort_inputs(parsed.input_paths, parsed.mode)
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
            Ok(json!({ "inputPaths": sorted }))
        }
        "media.cancelPreview" => Ok(json!({ "cancelled": session.cancel_preview() })),
        _ => Err(AppError::from(format!("Unknown method: {}", method))),
    }
}

fn dispatch_async(
    method: &str,
    params: Value,
    session: &Session,
    writer: &SharedWriter,
) -> Result<Value, AppError> {
    match method {
        "media.batch" => {
            let parsed: BatchParams = params_from_value(params)?;
            let outcome = session
                .run_batch(parsed.into_requests(), |event| emit_job_event(writer, event))?;
            to_result_value(outcome, "batch outcome")
        }
        "media.preview" => {
            let parsed: PreviewParams = params_from_value(params)?;
            let saved = session.preview_to_file(
                parsed.input_path,
                parsed.timestamp_seconds,
                parsed.force,
                &parsed.output_path,
            )?;
            to_result_value(saved, "preview result")
        }
        _ => Err(AppError::from(format!("Unknown method: {}", method))),
    }
}

fn respond(writer: &SharedWriter, id: u64, result: Result<Value, AppError>) {
    let response = match result {
        Ok(result) => serde_json::to_value(RpcSuccess { id, result })
            .map_err(|e| io::Error::other(format!("serialize success: {}", e))),
        Err(err) => {
            let payload = parse_error_payload(&err);
            serde_json::to_value(RpcFailure { id, error: payload })
                .map_err(|e| io::Error::other(format!("serialize failure: {}", e)))
        }
    };

    match response {
        Ok(value) => {
            let _ = write_json_line_shared(writer, &value);
        }
        Err(err) => {
            let failure = RpcFailure {
                id,
                error: RpcErrorPayload {
                    summary: "Serialization error".to_string(),
                    detail: err.to_string(),
                },
            };
            let _ = write_json_line_shared(writer, &failure);
        }
    }
}

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    sidecar_api::cleanup_startup_temp(Duration::from_secs(STARTUP_CLEANUP_MAX_AGE_HOURS * 3600));

    let session = match Session::start() {
        Ok(session) => Arc::new(session),
        Err(err) => {
            log::error!(target: "vidtools::sidecar", "startup failed: {}", err);
            return Err(io::Error::other(err.to_string()));
        }
    };
    if !session.ffmpeg_found() {
        log::warn!(
            target: "vidtools::sidecar",
            "ffmpeg not found; only app.capabilities will succeed"
        );
    }

    let stdin = io::stdin();
    let stdout: SharedWriter = Arc::new(Mutex::new(io::stdout()));
    let mut async_workers: Vec<thread::JoinHandle<()>> = Vec::new();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                let failure = RpcFailure {
                    id: 0,
                    error: RpcErrorPayload {
                        summary: "Invalid input stream".to_string(),
                        detail: err.to_string(),
                    },
                };
                let _ = write_json_line_shared(&stdout, &failure);
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let request: RpcRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                let failure = RpcFailure {
                    id: 0,
                    error: RpcErrorPayload {
                        summary: "Invalid request".to_string(),
                        detail: err.to_string(),
                    },
                };
                let _ = write_json_line_shared(&stdout, &failure);
                continue;
            }
        };

        log::debug!(
            target: "vidtools::sidecar",
            "request id={} method={}",
            request.id,
            request.method
        );

        if is_async_request(&request.method) {
            let writer = Arc::clone(&stdout);
            let session = Arc::clone(&session);
            let worker = thread::spawn(move || {
                let result = dispatch_async(&request.method, request.params, &session, &writer);
                respond(&writer, request.id, result);
            });
            async_workers.retain(|w| !w.is_finished());
            async_workers.push(worker);
        } else {
            let result = dispatch_sync(&request.method, request.params, &session);
            respond(&stdout, request.id, result);
        }
    }

    for worker in async_workers {
        let _ = worker.join();
    }
    Ok(())
}
