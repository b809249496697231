use crate::error::AppError;
use std::path::{Path, PathBuf};
use std::process::Command;

#[cfg(target_os = "windows")]
const LOOKUP_COMMAND: &str = "where";
#[cfg(not(target_os = "windows"))]
const LOOKUP_COMMAND: &str = "which";

fn find_in_path(binary: &str) -> Option<PathBuf> {
    let output = Command::new(LOOKUP_COMMAND).arg(binary).output().ok()?;
    if output.status.success() {
        let path = String::from_utf8_lossy(&output.stdout);
        let first = path.lines().next()?.trim();
        if !first.is_empty() {
            return Some(PathBuf::from(first));
        }
    }
    None
}

fn common_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/opt/homebrew/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/opt/local/bin/ffmpeg"),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            PathBuf::from("C:\\ffmpeg\\bin\\ffmpeg.exe"),
            PathBuf::from("C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe"),
        ]
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", unix)))]
    {
        vec![]
    }
}

fn path_from_env(var: &str) -> Option<PathBuf> {
    let value = std::env::var(var).ok()?;
    let p = PathBuf::from(value);
    if p.exists() {
        log::debug!(
            target: "vidtools::ffmpeg::discovery",
            "{} from env: {}",
            var,
            p.display()
        );
        Some(p)
    } else {
        log::warn!(
            target: "vidtools::ffmpeg::discovery",
            "{} points to a missing file, ignoring: {}",
            var,
            p.display()
        );
        None
    }
}

/// Resolve the FFmpeg binary.
/// Order: FFMPEG_PATH env, common install locations, then PATH lookup.
pub fn resolve_ffmpeg_path() -> Result<PathBuf, AppError> {
    if let Some(p) = path_from_env("FFMPEG_PATH") {
        return Ok(p);
    }

    for path in common_paths() {
        if path.exists() {
            log::debug!(
                target: "vidtools::ffmpeg::discovery",
                "FFmpeg found in common path: {}",
                path.display()
            );
            return Ok(path);
        }
    }

    if let Some(p) = find_in_path("ffmpeg")
        && p.exists()
    {
        log::debug!(
            target: "vidtools::ffmpeg::discovery",
            "FFmpeg found in PATH: {}",
            p.display()
        );
        return Ok(p);
    }

    log::error!(
        target: "vidtools::ffmpeg::discovery",
        "FFmpeg not found in PATH or common locations"
    );
    Err(AppError::FfmpegNotFound(
        "FFmpeg not found. Please install FFmpeg on your system:\n  - macOS: brew install ffmpeg\n  - Linux: sudo apt install ffmpeg\n  - Windows: Download from https://ffmpeg.org/download.html"
            .to_string(),
    ))
}

/// Paths to try for ffprobe given an ffmpeg binary path (suffixed first, then plain).
pub fn ffprobe_candidates(ffmpeg_path: &Path) -> Vec<PathBuf> {
    let parent = match ffmpeg_path.parent() {
        Some(p) => p,
        None => return vec![],
    };
    let mut candidates = Vec::with_capacity(2);
    let stem = ffmpeg_path.file_stem().and_then(|s| s.to_str());
    if let Some(suffix) = stem.and_then(|s| s.strip_prefix("ffmpeg"))
        && !suffix.is_empty()
    {
        #[cfg(target_os = "windows")]
        candidates.push(parent.join(format!("ffprobe{suffix}.exe")));
        #[cfg(not(target_os = "windows"))]
        candidates.push(parent.join(format!("ffprobe{suffix}")));
    }
    #[cfg(target_os = "windows")]
    candidates.push(parent.join("ffprobe.exe"));
    #[cfg(not(target_os = "windows"))]
    candidates.push(parent.join("ffprobe"));
    candidates
}

/// Resolve ffprobe. Never fails: when nothing is found next to ffmpeg the bare
/// name is returned and left to PATH lookup at spawn time, where a failure
/// reads as "metadata unknown".
pub fn resolve_ffprobe_path(ffmpeg_path: &Path) -> PathBuf {
    if let Some(p) = path_from_env("FFPROBE_PATH") {
        return p;
    }
    for candidate in ffprobe_candidates(ffmpeg_path) {
        if candidate.exists() {
            return candidate;
        }
    }
    log::debug!(
        target: "vidtools::ffmpeg::discovery",
        "ffprobe not found next to {}, falling back to PATH",
        ffmpeg_path.display()
    );
    PathBuf::from("ffprobe")
}
