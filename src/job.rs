//! Job requests as supplied by the caller, and their terminal outcomes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Mkv,
    Mov,
    Webm,
    Gif,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Mp4,
        OutputFormat::Mkv,
        OutputFormat::Mov,
        OutputFormat::Webm,
        OutputFormat::Gif,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mkv => "mkv",
            OutputFormat::Mov => "mov",
            OutputFormat::Webm => "webm",
            OutputFormat::Gif => "gif",
        }
    }

    /// Containers that accept the common source streams as-is, so `-c copy` works.
    pub fn is_remuxable(self) -> bool {
        matches!(self, OutputFormat::Mp4 | OutputFormat::Mov | OutputFormat::Mkv)
    }

    /// Containers whose moov atom can be moved to the front (`+faststart`).
    pub fn supports_faststart(self) -> bool {
        matches!(self, OutputFormat::Mp4 | OutputFormat::Mov)
    }

    pub fn is_animated_image(self) -> bool {
        self == OutputFormat::Gif
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::FormatRequired);
        }
        let lower = s.to_ascii_lowercase();
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == lower)
            .ok_or_else(|| ValidationError::UnsupportedFormat(s.to_string()))
    }
}

/// One conversion action for one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobRequest {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub output_name: String,
    pub format: OutputFormat,
    pub fps_enabled: bool,
    pub target_fps: Option<String>,
    pub trim_enabled: bool,
    pub trim_start: Option<f64>,
    pub trim_end: Option<f64>,
    /// Only honoured for batches of more than one input.
    pub keep_original_names: bool,
}

impl Default for JobRequest {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            output_dir: PathBuf::new(),
            output_name: "output".to_string(),
            format: OutputFormat::Mp4,
            fps_enabled: false,
            target_fps: None,
            trim_enabled: false,
            trim_start: None,
            trim_end: None,
            keep_original_names: true,
        }
    }
}

impl JobRequest {
    /// Same settings, different input. Used to fan one request out over a batch.
    pub fn for_input(&self, input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            ..self.clone()
        }
    }

    /// Trimmed target FPS token, validated as a positive number.
    pub fn validated_target_fps(&self) -> Result<&str, ValidationError> {
        let fps = self
            .target_fps
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or(ValidationError::TargetFpsRequired)?;
        let value: f64 = fps
            .parse()
            .map_err(|_| ValidationError::TargetFpsNotNumeric)?;
        if !value.is_finite() {
            return Err(ValidationError::TargetFpsNotNumeric);
        }
        if value <= 0.0 {
            return Err(ValidationError::TargetFpsNotPositive);
        }
        Ok(fps)
    }

    /// Destination file for this request. `batch_len` decides whether
    /// `keep_original_names` applies.
    pub fn resolve_output_path(&self, batch_len: usize) -> Result<PathBuf, ValidationError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(ValidationError::OutputDirRequired);
        }
        if !self.output_dir.is_dir() {
            return Err(ValidationError::OutputDirMissing);
        }
        let mut name = self.output_name.trim().to_string();
        if batch_len > 1 && self.keep_original_names {
            name = file_stem_string(&self.input_path);
        }
        if name.is_empty() {
            return Err(ValidationError::OutputNameRequired);
        }
        let ext = format!(".{}", self.format);
        if !name.ends_with(&ext) {
            name.push_str(&ext);
        }
        Ok(self.output_dir.join(name))
    }
}

fn file_stem_string(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Terminal result of one engine invocation. Never retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub exit_code: i32,
    pub succeeded: bool,
}

impl JobOutcome {
    pub fn from_exit_code(exit_code: i32) -> Self {
        Self {
            exit_code,
            succeeded: exit_code == 0,
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
