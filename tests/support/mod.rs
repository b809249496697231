#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;

use vidtools_core::ffmpeg::{Capabilities, Toolchain};
use vidtools_core::job::JobRequest;

pub struct IntegrationEnv {
    pub toolchain: Arc<Toolchain>,
    pub caps: Arc<Capabilities>,
    dir: tempfile::TempDir,
}

impl IntegrationEnv {
    pub fn new() -> Self {
        let (toolchain, caps) =
            vidtools_core::test_support::discover_for_test().expect("FFmpeg not found");
        let dir = tempfile::tempdir().expect("tempdir");
        Self {
            toolchain,
            caps,
            dir,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn with_test_video(&self, input_name: &str, duration_secs: f32) -> PathBuf {
        let output_path = self.path(input_name);
        let status = create_test_video(self.toolchain.ffmpeg(), &output_path, duration_secs)
            .expect("failed to create test video");
        assert!(status.success(), "ffmpeg failed to create test video");
        output_path
    }

    pub fn request(&self, input_path: &Path) -> JobRequest {
        let out = self.path("out");
        std::fs::create_dir_all(&out).expect("create output dir");
        JobRequest {
            input_path: input_path.to_path_buf(),
            output_dir: out,
            ..Default::default()
        }
    }
}

/// Short lavfi clip with a sine audio track. MPEG-4 part 2 video keeps it
/// working on builds without libx264.
pub fn create_test_video(
    ffmpeg: &Path,
    output_path: &Path,
    duration_secs: f32,
) -> std::io::Result<ExitStatus> {
    let duration_arg = format!("{}", duration_secs);
    Command::new(ffmpeg)
        .args([
            "-loglevel",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
            &format!("testsrc=duration={}:size=320x240:rate=30", duration_arg),
            "-f",
            "lavfi",
            "-i",
            &format!("sine=frequency=440:duration={}", duration_arg),
            "-c:v",
            "mpeg4",
            "-c:a",
            "aac",
            "-shortest",
            output_path.to_string_lossy().as_ref(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
}

pub fn probe_duration(env: &IntegrationEnv, path: &Path) -> Option<f64> {
    use vidtools_core::ffmpeg::MediaEngine;
    env.toolchain.duration(path)
}
