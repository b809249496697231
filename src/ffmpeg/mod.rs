mod builder;
mod cache;
pub mod capabilities;
pub mod discovery;
mod error;
pub mod ffprobe;
mod progress;
mod runner;
mod temp;
mod toolchain;

pub use builder::{
    PlannedCommand, build_ffmpeg_command, build_frame_extract_command,
    format_args_for_display_multiline, needs_full_decode,
};
pub use cache::{FrameBytes, PREVIEW_CACHE_MAX_ENTRIES, PreviewCache, PreviewCacheKey, time_bucket};
pub use capabilities::Capabilities;
pub use ffprobe::MediaInfo;
pub use progress::ProgressTracker;
pub use runner::{EngineProcess, run_ffmpeg_blocking};
pub use temp::{TempArtifact, TempFileManager, cleanup_old_temp_files};
pub use toolchain::{MediaEngine, Toolchain};

/// Progress payload for job progress events.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FfmpegProgressPayload {
    pub index: usize,
    pub percent: f64,
}

pub fn path_to_string(path: &(impl AsRef<std::path::Path> + ?Sized)) -> String {
    path.as_ref().to_string_lossy().to_string()
}
