//! FFprobe single-field metadata queries: container duration and primary video codec.
//!
//! Absence is the signal. A missing file, a corrupt file or a missing ffprobe all
//! come back as None.

use std::path::Path;
use std::process::{Command, Stdio};

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
}

fn duration_args(path: &str) -> Vec<&str> {
    vec![
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
        path,
    ]
}

fn codec_args(path: &str) -> Vec<&str> {
    vec![
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=codec_name",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
        path,
    ]
}

/// Stdout of a successful ffprobe run, None otherwise.
fn run_ffprobe(ffprobe: &Path, args: &[&str]) -> Option<String> {
    let mut cmd = Command::new(ffprobe);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(windows)]
    cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
    let output = match cmd.output() {
        Ok(o) => o,
        Err(e) => {
            log::warn!(
                target: "vidtools::ffmpeg::ffprobe",
                "Failed to run ffprobe: {}",
                e
            );
            return None;
        }
    };
    if !output.status.success() {
        log::debug!(
            target: "vidtools::ffmpeg::ffprobe",
            "ffprobe exited with {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Duration in seconds. None for empty output, `N/A`, or a failed run.
pub fn get_duration(ffprobe: &Path, path: &Path) -> Option<f64> {
    let path_str = path.to_string_lossy();
    log::debug!(
        target: "vidtools::ffmpeg::ffprobe",
        "get_duration: path={}",
        path_str
    );
    run_ffprobe(ffprobe, &duration_args(&path_str)).and_then(|out| parse_duration_output(&out))
}

/// Codec name of the first video stream. None when there is no video stream.
pub fn get_video_codec(ffprobe: &Path, path: &Path) -> Option<String> {
    let path_str = path.to_string_lossy();
    log::debug!(
        target: "vidtools::ffmpeg::ffprobe",
        "get_video_codec: path={}",
        path_str
    );
    run_ffprobe(ffprobe, &codec_args(&path_str)).and_then(|out| parse_codec_output(&out))
}

pub fn parse_duration_output(output: &str) -> Option<f64> {
    output
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}

pub fn parse_codec_output(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_parses_bare_decimal() {
        assert_eq!(parse_duration_output("30.500000\n"), Some(30.5));
    }

    #[test]
    fn duration_unknown_values() {
        assert_eq!(parse_duration_output(""), None);
        assert_eq!(parse_duration_output("N/A\n"), None);
        assert_eq!(parse_duration_output("-1"), None);
    }

    #[test]
    fn codec_takes_first_non_empty_line() {
        assert_eq!(parse_codec_output("\nh264\n"), Some("h264".to_string()));
        assert_eq!(parse_codec_output("  \n"), None);
    }

    #[test]
    fn missing_ffprobe_is_absence_not_error() {
        let probe = Path::new("/nonexistent/vidtools/ffprobe");
        assert_eq!(get_duration(probe, Path::new("/tmp/in.mp4")), None);
        assert_eq!(get_video_codec(probe, Path::new("/tmp/in.mp4")), None);
    }
}
