//! Shared test helpers.
//!
//! Layout: unit tests live in each module; orchestrator and preview tests drive
//! `FakeEngine` instead of a real FFmpeg. Tests against a real FFmpeg build live
//! in `tests/` behind the `integration-test-api` feature.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::AppError;
use crate::ffmpeg::{MediaEngine, PlannedCommand};

/// Scripted engine. Unknown paths probe as None and run with exit code 0.
#[derive(Default)]
pub struct FakeEngine {
    durations: HashMap<PathBuf, f64>,
    codecs: HashMap<PathBuf, String>,
    exit_codes: HashMap<PathBuf, i32>,
    output_lines: Vec<String>,
    frame_bytes: Option<Vec<u8>>,
    run_delay: Option<Duration>,
    commands: Mutex<Vec<PlannedCommand>>,
    probes: Mutex<Vec<PathBuf>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(mut self, path: &Path, seconds: f64) -> Self {
        self.durations.insert(path.to_path_buf(), seconds);
        self
    }

    pub fn with_codec(mut self, path: &Path, codec: &str) -> Self {
        self.codecs.insert(path.to_path_buf(), codec.to_string());
        self
    }

    pub fn with_exit_code(mut self, input: &Path, code: i32) -> Self {
        self.exit_codes.insert(input.to_path_buf(), code);
        self
    }

    pub fn with_output_lines(mut self, lines: &[&str]) -> Self {
        self.output_lines = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Bytes written to the command's output path on every run.
    pub fn with_frame_bytes(mut self, bytes: &[u8]) -> Self {
        self.frame_bytes = Some(bytes.to_vec());
        self
    }

    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = Some(delay);
        self
    }

    pub fn commands(&self) -> Vec<PlannedCommand> {
        self.commands.lock().clone()
    }

    pub fn run_count(&self) -> usize {
        self.commands.lock().len()
    }

    /// Paths passed to `duration`, in call order.
    pub fn duration_probes(&self) -> Vec<PathBuf> {
        self.probes.lock().clone()
    }
}

impl MediaEngine for FakeEngine {
    fn duration(&self, path: &Path) -> Option<f64> {
        self.probes.lock().push(path.to_path_buf());
        self.durations.get(path).copied()
    }

    fn video_codec(&self, path: &Path) -> Option<String> {
        self.codecs.get(path).cloned()
    }

    fn run(
        &self,
        command: PlannedCommand,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<i32, AppError> {
        on_line(&format!("$ ffmpeg {}", command.display()));
        if let Some(delay) = self.run_delay {
            std::thread::sleep(delay);
        }
        for line in &self.output_lines {
            on_line(line);
        }
        if let (Some(bytes), Some(out)) = (&self.frame_bytes, command.output_arg()) {
            std::fs::write(out, bytes)?;
        }
        let code = command
            .input_arg()
            .and_then(|input| self.exit_codes.get(Path::new(input)).copied())
            .unwrap_or(0);
        self.commands.lock().push(command);
        Ok(code)
    }
}
