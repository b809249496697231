use std::path::{Path, PathBuf};

use super::builder::PlannedCommand;
use super::capabilities::Capabilities;
use super::discovery::{resolve_ffmpeg_path, resolve_ffprobe_path};
use super::ffprobe::{self, MediaInfo};
use super::runner::run_ffmpeg_blocking;
use crate::error::AppError;

/// Everything the orchestrator and preview generator need from the external engine.
/// `Toolchain` is the real one; tests substitute a scripted engine.
pub trait MediaEngine: Send + Sync {
    /// Container duration in seconds. None when unknown.
    fn duration(&self, path: &Path) -> Option<f64>;

    /// Codec name of the first video stream. None when unknown.
    fn video_codec(&self, path: &Path) -> Option<String>;

    /// Run to completion, streaming lines to `on_line`. Returns the exit code.
    fn run(&self, command: PlannedCommand, on_line: &mut dyn FnMut(&str))
    -> Result<i32, AppError>;

    fn inspect(&self, path: &Path) -> MediaInfo {
        MediaInfo {
            duration_seconds: self.duration(path),
            video_codec: self.video_codec(path),
        }
    }
}

/// Resolved ffmpeg/ffprobe binaries for the session.
#[derive(Debug, Clone)]
pub struct Toolchain {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Toolchain {
    pub fn discover() -> Result<Self, AppError> {
        let ffmpeg = resolve_ffmpeg_path()?;
        let ffprobe = resolve_ffprobe_path(&ffmpeg);
        log::debug!(
            target: "vidtools::ffmpeg::toolchain",
            "ffmpeg={} ffprobe={}",
            ffmpeg.display(),
            ffprobe.display()
        );
        Ok(Self { ffmpeg, ffprobe })
    }

    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn ffprobe(&self) -> &Path {
        &self.ffprobe
    }

    pub fn probe_capabilities(&self) -> Capabilities {
        Capabilities::probe(&self.ffmpeg)
    }
}

impl MediaEngine for Toolchain {
    fn duration(&self, path: &Path) -> Option<f64> {
        ffprobe::get_duration(&self.ffprobe, path)
    }

    fn video_codec(&self, path: &Path) -> Option<String> {
        ffprobe::get_video_codec(&self.ffprobe, path)
    }

    fn run(
        &self,
        command: PlannedCommand,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<i32, AppError> {
        run_ffmpeg_blocking(&self.ffmpeg, command, on_line)
    }
}
