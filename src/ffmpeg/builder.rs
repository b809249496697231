use std::path::Path;

use super::capabilities::Capabilities;
use super::path_to_string;
use crate::error::ValidationError;
use crate::job::{JobRequest, OutputFormat};
use crate::timecode::format_seek;

/// H.264 first, then whatever hardware or fallback encoder the build has.
const MP4_FAMILY_VIDEO_ENCODERS: &[&str] = &[
    "libx264",
    "libopenh264",
    "h264_v4l2m2m",
    "h264_vaapi",
    "h264_nvenc",
    "mpeg4",
];
const WEBM_VIDEO_ENCODERS: &[&str] = &["libvpx-vp9", "libvpx", "vp9", "vp8"];
const MP4_FAMILY_AUDIO_ENCODERS: &[&str] = &["aac", "libfdk_aac"];
const WEBM_AUDIO_ENCODERS: &[&str] = &["libopus", "libvorbis", "opus", "vorbis"];

const GIF_DEFAULT_FPS: &str = "10";
const GIF_SCALE_FILTER: &str = "scale=640:-1:flags=lanczos";

/// Argument vector for one FFmpeg run (program not included). The destination
/// is always the last token. Built once, consumed once by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommand {
    args: Vec<String>,
}

impl PlannedCommand {
    pub fn from_args(args: Vec<String>) -> Self {
        Self { args }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn into_args(self) -> Vec<String> {
        self.args
    }

    pub fn input_arg(&self) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == "-i")
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn output_arg(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }

    /// Shell-quoted single line, for logs.
    pub fn display(&self) -> String {
        quote_words(self.args.iter().map(String::as_str))
    }

    pub fn display_with_program(&self, program: &Path) -> String {
        let program = path_to_string(program);
        quote_words(std::iter::once(program.as_str()).chain(self.args.iter().map(String::as_str)))
    }
}

fn quote_words<'a>(words: impl Iterator<Item = &'a str>) -> String {
    words
        .map(|w| match shlex::try_quote(w) {
            Ok(quoted) => quoted.into_owned(),
            Err(_) => w.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn video_encoder_candidates(format: OutputFormat) -> &'static [&'static str] {
    match format {
        OutputFormat::Mp4 | OutputFormat::Mov | OutputFormat::Mkv => MP4_FAMILY_VIDEO_ENCODERS,
        OutputFormat::Webm => WEBM_VIDEO_ENCODERS,
        OutputFormat::Gif => &[],
    }
}

fn audio_encoder_candidates(format: OutputFormat) -> &'static [&'static str] {
    match format {
        OutputFormat::Mp4 | OutputFormat::Mov | OutputFormat::Mkv => MP4_FAMILY_AUDIO_ENCODERS,
        OutputFormat::Webm => WEBM_AUDIO_ENCODERS,
        OutputFormat::Gif => &[],
    }
}

/// Whether the request forces frames through the decoder (no stream copy possible).
pub fn needs_full_decode(request: &JobRequest) -> bool {
    request.fps_enabled || request.trim_enabled || request.format.is_animated_image()
}

/// Validate `request` and derive its FFmpeg arguments.
///
/// Checks run in order and the first failure wins: input exists, trim start
/// present and non-negative, target FPS present and positive, and finally that a
/// known source codec is decodable whenever frames must be decoded. The output
/// format cannot be empty here; `OutputFormat` parsing already rejected that.
pub fn build_ffmpeg_command(
    request: &JobRequest,
    output_path: &Path,
    capabilities: &Capabilities,
    probed_codec: Option<&str>,
) -> Result<PlannedCommand, ValidationError> {
    if !request.input_path.is_file() {
        return Err(ValidationError::InputMissing);
    }

    let trim_start = if request.trim_enabled {
        let start = request.trim_start.ok_or(ValidationError::TrimStartRequired)?;
        if !start.is_finite() || start < 0.0 {
            return Err(ValidationError::TrimStartNegative);
        }
        Some(start)
    } else {
        None
    };

    let target_fps = if request.fps_enabled {
        Some(request.validated_target_fps()?)
    } else {
        None
    };

    let mut filters: Vec<String> = Vec::new();
    if let Some(fps) = target_fps {
        filters.push(format!("fps={}", fps));
    }

    let needs_decode = !filters.is_empty() || needs_full_decode(request);
    if needs_decode
        && let Some(codec) = probed_codec
        && !capabilities.has_decoder(codec)
    {
        return Err(ValidationError::CannotDecode {
            codec: codec.to_string(),
        });
    }

    let input = path_to_string(&request.input_path);
    let output = path_to_string(output_path);
    let format = request.format;

    let mut args: Vec<String> = vec!["-nostdin".to_string(), "-y".to_string()];

    match trim_start {
        Some(start) => {
            // Input-side seek is fast; output timestamps restart at zero, so the
            // end bound is expressed as a clip length.
            args.extend(["-ss".to_string(), format_seek(start)]);
            args.extend(["-i".to_string(), input]);
            if let Some(end) = request.trim_end
                && end.is_finite()
                && end > start
            {
                args.extend(["-t".to_string(), format_seek(end - start)]);
            }
        }
        None => args.extend(["-i".to_string(), input]),
    }

    if format.is_animated_image() {
        let gif_fps = target_fps.unwrap_or(GIF_DEFAULT_FPS);
        args.extend([
            "-vf".to_string(),
            format!("fps={},{}", gif_fps, GIF_SCALE_FILTER),
            "-an".to_string(),
        ]);
    } else {
        if filters.is_empty() && !request.trim_enabled && format.is_remuxable() {
            args.extend(["-c".to_string(), "copy".to_string()]);
        } else {
            if !filters.is_empty() {
                args.extend(["-filter:v".to_string(), filters.join(",")]);
            }
            if let Some(encoder) = capabilities.first_encoder(video_encoder_candidates(format)) {
                args.extend(["-c:v".to_string(), encoder.to_string()]);
            }
            if let Some(encoder) = capabilities.first_encoder(audio_encoder_candidates(format)) {
                args.extend(["-c:a".to_string(), encoder.to_string()]);
            }
        }
        if format.supports_faststart() {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }
    }

    args.push(output);

    log::debug!(
        target: "vidtools::ffmpeg::builder",
        "Planned FFmpeg command: format={}, decode={}, input={:?} -> output={:?}",
        format,
        needs_decode,
        request.input_path,
        output_path
    );

    Ok(PlannedCommand::from_args(args))
}

/// One scaled still frame at `timestamp_seconds`, written to `output_path`.
pub fn build_frame_extract_command(
    input_path: &Path,
    timestamp_seconds: f64,
    output_path: &Path,
    width: u32,
    quality: u32,
) -> PlannedCommand {
    let args = vec![
        "-nostdin".to_string(),
        "-y".to_string(),
        "-ss".to_string(),
        format_seek(timestamp_seconds.max(0.0)),
        "-i".to_string(),
        path_to_string(input_path),
        "-frames:v".to_string(),
        "1".to_string(),
        "-vf".to_string(),
        format!("scale={}:-1:flags=lanczos", width),
        "-q:v".to_string(),
        quality.to_string(),
        path_to_string(output_path),
    ];
    PlannedCommand::from_args(args)
}

/// Formats args for readable display: option and value on the same line when the next arg is a value.
pub fn format_args_for_display_multiline(args: &[String]) -> String {
    let mut lines = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        let line = if arg.starts_with('-') && i + 1 < args.len() && !args[i + 1].starts_with('-') {
            let value = &args[i + 1];
            i += 2;
            format!("  {} {}", arg, value)
        } else {
            i += 1;
            format!("  {}", arg)
        };
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        input: PathBuf,
        output: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mov");
        std::fs::write(&input, b"not really a video").unwrap();
        let output = dir.path().join("out.mp4");
        Fixture {
            _dir: dir,
            input,
            output,
        }
    }

    fn full_caps() -> Capabilities {
        Capabilities::new(
            ["libx264", "mpeg4", "libvpx-vp9", "aac", "libopus", "gif"],
            ["h264", "hevc", "vp9", "gif"],
        )
    }

    fn request(f: &Fixture) -> JobRequest {
        JobRequest {
            input_path: f.input.clone(),
            output_dir: f.output.parent().unwrap().to_path_buf(),
            ..JobRequest::default()
        }
    }

    fn plan(req: &JobRequest, f: &Fixture, caps: &Capabilities, codec: Option<&str>) -> Vec<String> {
        build_ffmpeg_command(req, &f.output, caps, codec)
            .unwrap()
            .into_args()
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn remuxable_without_transforms_uses_stream_copy() {
        let f = fixture();
        for format in [OutputFormat::Mp4, OutputFormat::Mov, OutputFormat::Mkv] {
            let req = JobRequest {
                format,
                ..request(&f)
            };
            let args = plan(&req, &f, &full_caps(), Some("h264"));
            assert!(has_pair(&args, "-c", "copy"), "{format}: {args:?}");
            assert!(!args.iter().any(|a| a == "-c:v" || a == "-c:a"));
            assert!(!args.iter().any(|a| a == "-filter:v" || a == "-vf"));
        }
    }

    #[test]
    fn always_overwrites_and_ends_with_destination() {
        let f = fixture();
        let args = plan(&request(&f), &f, &full_caps(), None);
        assert!(args.contains(&"-y".to_string()));
        assert_eq!(args.last().unwrap(), &path_to_string(&f.output));
    }

    #[test]
    fn mp4_and_mov_get_faststart_mkv_does_not() {
        let f = fixture();
        let mp4 = plan(&request(&f), &f, &full_caps(), None);
        assert!(has_pair(&mp4, "-movflags", "+faststart"));
        let mkv = plan(
            &JobRequest {
                format: OutputFormat::Mkv,
                ..request(&f)
            },
            &f,
            &full_caps(),
            None,
        );
        assert!(!mkv.iter().any(|a| a == "-movflags"));
    }

    #[test]
    fn trim_seeks_before_input_with_millisecond_precision() {
        let f = fixture();
        let req = JobRequest {
            trim_enabled: true,
            trim_start: Some(1.5),
            trim_end: Some(4.25),
            ..request(&f)
        };
        let args = plan(&req, &f, &full_caps(), Some("h264"));
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < i);
        assert_eq!(args[ss + 1], "1.500");
        assert!(has_pair(&args, "-t", "2.750"));
        assert!(has_pair(&args, "-c:v", "libx264"));
        assert!(has_pair(&args, "-c:a", "aac"));
        assert!(!args.iter().any(|a| a == "copy"));
    }

    #[test]
    fn trim_end_not_after_start_is_dropped() {
        let f = fixture();
        for end in [0.5, 2.0] {
            let req = JobRequest {
                trim_enabled: true,
                trim_start: Some(2.0),
                trim_end: Some(end),
                ..request(&f)
            };
            let args = plan(&req, &f, &full_caps(), None);
            assert!(!args.iter().any(|a| a == "-t" || a == "-to"), "{args:?}");
        }
    }

    #[test]
    fn trim_requires_start() {
        let f = fixture();
        let req = JobRequest {
            trim_enabled: true,
            ..request(&f)
        };
        assert_eq!(
            build_ffmpeg_command(&req, &f.output, &full_caps(), None),
            Err(ValidationError::TrimStartRequired)
        );
        let req = JobRequest {
            trim_enabled: true,
            trim_start: Some(-1.0),
            ..request(&f)
        };
        assert_eq!(
            build_ffmpeg_command(&req, &f.output, &full_caps(), None),
            Err(ValidationError::TrimStartNegative)
        );
    }

    #[test]
    fn fps_change_adds_filter_and_reencodes() {
        let f = fixture();
        let req = JobRequest {
            fps_enabled: true,
            target_fps: Some("30".into()),
            ..request(&f)
        };
        let args = plan(&req, &f, &full_caps(), Some("h264"));
        assert!(has_pair(&args, "-filter:v", "fps=30"));
        assert!(has_pair(&args, "-c:v", "libx264"));
    }

    #[test]
    fn non_numeric_fps_fails_validation() {
        let f = fixture();
        for fps in ["abc", "", "30fps"] {
            let req = JobRequest {
                fps_enabled: true,
                target_fps: Some(fps.into()),
                ..request(&f)
            };
            let err = build_ffmpeg_command(&req, &f.output, &full_caps(), None).unwrap_err();
            assert!(
                matches!(
                    err,
                    ValidationError::TargetFpsNotNumeric | ValidationError::TargetFpsRequired
                ),
                "{fps}: {err:?}"
            );
        }
    }

    #[test]
    fn missing_input_is_checked_first() {
        let f = fixture();
        let req = JobRequest {
            input_path: f.input.with_file_name("missing.mov"),
            fps_enabled: true,
            target_fps: Some("abc".into()),
            ..request(&f)
        };
        assert_eq!(
            build_ffmpeg_command(&req, &f.output, &full_caps(), None),
            Err(ValidationError::InputMissing)
        );
    }

    #[test]
    fn undecodable_codec_fails_when_decode_needed() {
        let f = fixture();
        let caps = Capabilities::new(["libx264"], ["vp9"]);
        let req = JobRequest {
            fps_enabled: true,
            target_fps: Some("24".into()),
            ..request(&f)
        };
        let err = build_ffmpeg_command(&req, &f.output, &caps, Some("h264")).unwrap_err();
        assert_eq!(
            err,
            ValidationError::CannotDecode {
                codec: "h264".into()
            }
        );
        let msg = err.to_string();
        assert!(msg.contains("h264"));
        assert!(msg.contains("Install a full FFmpeg build or disable trim/FPS change"));
    }

    #[test]
    fn undecodable_codec_is_fine_for_stream_copy() {
        let f = fixture();
        let caps = Capabilities::new(["libx264"], ["vp9"]);
        let args = plan(&request(&f), &f, &caps, Some("h264"));
        assert!(has_pair(&args, "-c", "copy"));
    }

    #[test]
    fn unknown_codec_skips_decode_check() {
        let f = fixture();
        let req = JobRequest {
            format: OutputFormat::Gif,
            ..request(&f)
        };
        let args = plan(&req, &f, &Capabilities::default(), None);
        assert!(has_pair(&args, "-vf", "fps=10,scale=640:-1:flags=lanczos"));
    }

    #[test]
    fn gif_uses_user_fps_and_drops_audio() {
        let f = fixture();
        let req = JobRequest {
            format: OutputFormat::Gif,
            fps_enabled: true,
            target_fps: Some("15".into()),
            ..request(&f)
        };
        let args = plan(&req, &f, &full_caps(), Some("h264"));
        assert!(has_pair(&args, "-vf", "fps=15,scale=640:-1:flags=lanczos"));
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.iter().any(|a| a == "-c:v" || a == "-movflags" || a == "copy"));
    }

    #[test]
    fn webm_picks_vp9_and_opus() {
        let f = fixture();
        let req = JobRequest {
            format: OutputFormat::Webm,
            ..request(&f)
        };
        let args = plan(&req, &f, &full_caps(), None);
        assert!(has_pair(&args, "-c:v", "libvpx-vp9"));
        assert!(has_pair(&args, "-c:a", "libopus"));
        assert!(!args.iter().any(|a| a == "-movflags"));
    }

    #[test]
    fn encoder_preference_degrades_gracefully() {
        let f = fixture();
        let req = JobRequest {
            fps_enabled: true,
            target_fps: Some("25".into()),
            ..request(&f)
        };
        let minimal = Capabilities::new(["mpeg4"], ["h264"]);
        let args = plan(&req, &f, &minimal, Some("h264"));
        assert!(has_pair(&args, "-c:v", "mpeg4"));
        assert!(!args.iter().any(|a| a == "-c:a"));

        let empty = Capabilities::default();
        let args = plan(&req, &f, &empty, None);
        assert!(!args.iter().any(|a| a == "-c:v" || a == "-c:a"));
    }

    #[test]
    fn planning_is_deterministic() {
        let f = fixture();
        let req = JobRequest {
            trim_enabled: true,
            trim_start: Some(0.25),
            trim_end: Some(9.0),
            fps_enabled: true,
            target_fps: Some("60".into()),
            ..request(&f)
        };
        let a = build_ffmpeg_command(&req, &f.output, &full_caps(), Some("h264")).unwrap();
        let b = build_ffmpeg_command(&req, &f.output, &full_caps(), Some("h264")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn display_quotes_paths_with_spaces() {
        let cmd = PlannedCommand::from_args(vec![
            "-i".into(),
            "/tmp/my clip.mov".into(),
            "/tmp/out.mp4".into(),
        ]);
        assert_eq!(cmd.display(), "-i '/tmp/my clip.mov' /tmp/out.mp4");
        assert_eq!(cmd.input_arg(), Some("/tmp/my clip.mov"));
        assert_eq!(cmd.output_arg(), Some("/tmp/out.mp4"));
    }

    #[test]
    fn frame_extract_seeks_scales_and_writes_one_frame() {
        let cmd = build_frame_extract_command(
            Path::new("/v/in.mp4"),
            12.5,
            Path::new("/tmp/frame.png"),
            360,
            2,
        );
        let args = cmd.args();
        assert!(has_pair(args, "-ss", "12.500"));
        assert!(has_pair(args, "-frames:v", "1"));
        assert!(has_pair(args, "-vf", "scale=360:-1:flags=lanczos"));
        assert!(has_pair(args, "-q:v", "2"));
        assert_eq!(cmd.input_arg(), Some("/v/in.mp4"));
        assert_eq!(cmd.output_arg(), Some("/tmp/frame.png"));
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < i);
    }

    #[test]
    fn multiline_display_pairs_flags_with_values() {
        let args: Vec<String> = ["-y", "-i", "in.mp4", "-c", "copy", "out.mp4"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            format_args_for_display_multiline(&args),
            "  -y\n  -i in.mp4\n  -c copy\n  out.mp4"
        );
    }
}
