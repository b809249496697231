//! App error types. `AppError` implements Display and Serialize for the sidecar protocol.

/// Request problems found before any FFmpeg process is started. Messages are shown verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Choose an input file.")]
    NoInputs,

    #[error("Input file does not exist.")]
    InputMissing,

    #[error("Output format is required.")]
    FormatRequired,

    #[error("Unsupported output format '{0}'.")]
    UnsupportedFormat(String),

    #[error("Trim start time is required when Trim is enabled.")]
    TrimStartRequired,

    #[error("Trim start time cannot be negative.")]
    TrimStartNegative,

    #[error("Trim start must be within the video duration.")]
    TrimStartBeyondDuration,

    #[error("Target FPS is required when FPS change is enabled.")]
    TargetFpsRequired,

    #[error("Target FPS must be a number.")]
    TargetFpsNotNumeric,

    #[error("Target FPS must be greater than zero.")]
    TargetFpsNotPositive,

    #[error(
        "Your FFmpeg build cannot decode '{codec}'. Install a full FFmpeg build or disable trim/FPS change."
    )]
    CannotDecode { codec: String },

    #[error("Choose an output folder.")]
    OutputDirRequired,

    #[error("Output folder does not exist.")]
    OutputDirMissing,

    #[error("Output filename is required.")]
    OutputNameRequired,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    FfmpegNotFound(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Details live in the streamed log lines, not here.
    #[error("FFmpeg finished with errors. Check the log.")]
    FfmpegFailed { code: i32 },

    #[error("Aborted")]
    Aborted,
}

impl AppError {
    pub fn ffmpeg_failed(code: i32) -> Self {
        Self::FfmpegFailed { code }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        if s == "Aborted" {
            AppError::Aborted
        } else {
            AppError::Io(std::io::Error::other(s))
        }
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        s.to_string().into()
    }
}
