#![cfg(feature = "integration-test-api")]

mod support;

use std::fs;

use support::{IntegrationEnv, probe_duration};
use vidtools_core::batch::{BatchSettings, JobEvent, JobStatus, run_batch};
use vidtools_core::ffmpeg::MediaEngine;
use vidtools_core::job::{JobRequest, OutputFormat};

fn run(env: &IntegrationEnv, requests: &[JobRequest]) -> (vidtools_core::BatchOutcome, Vec<JobEvent>) {
    let mut events = Vec::new();
    let outcome = run_batch(
        env.toolchain.as_ref(),
        &env.caps,
        requests,
        &BatchSettings::default(),
        &mut |e: JobEvent| events.push(e),
    );
    (outcome, events)
}

#[test]
fn inspector_reports_duration_and_codec() {
    let env = IntegrationEnv::new();
    let input = env.with_test_video("input.mp4", 2.0);
    let info = env.toolchain.inspect(&input);
    let duration = info.duration_seconds.expect("duration");
    assert!((duration - 2.0).abs() < 0.2, "duration {}", duration);
    assert_eq!(info.video_codec.as_deref(), Some("mpeg4"));
    assert_eq!(env.toolchain.duration(&env.path("missing.mp4")), None);
}

#[test]
fn remux_to_mkv_succeeds_with_progress() {
    let env = IntegrationEnv::new();
    let input = env.with_test_video("input.mp4", 2.0);
    let request = JobRequest {
        format: OutputFormat::Mkv,
        ..env.request(&input)
    };
    let (outcome, events) = run(&env, &[request]);
    assert!(outcome.succeeded, "{:?}", outcome);
    assert!(matches!(
        &events[2],
        JobEvent::Log { line, .. } if line.starts_with("$ ") && line.contains("-c copy")
    ));
    let output = env.path("out").join("output.mkv");
    assert!(fs::metadata(&output).expect("output").len() > 0);
    assert!(probe_duration(&env, &output).is_some());
}

#[test]
fn trimmed_reencode_is_shorter() {
    let env = IntegrationEnv::new();
    let input = env.with_test_video("input.mp4", 4.0);
    let request = JobRequest {
        trim_enabled: true,
        trim_start: Some(1.0),
        trim_end: Some(2.5),
        fps_enabled: true,
        target_fps: Some("15".to_string()),
        ..env.request(&input)
    };
    let (outcome, events) = run(&env, &[request]);
    assert!(outcome.succeeded, "{:?}", outcome);
    let last_percent = events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .last();
    assert!(last_percent.is_some());
    let duration = probe_duration(&env, &env.path("out").join("output.mp4")).expect("duration");
    assert!(duration < 2.5, "trimmed duration {}", duration);
}

#[test]
fn gif_output_has_no_audio_and_is_written() {
    let env = IntegrationEnv::new();
    let input = env.with_test_video("input.mp4", 1.0);
    let request = JobRequest {
        format: OutputFormat::Gif,
        ..env.request(&input)
    };
    let (outcome, _) = run(&env, &[request]);
    assert!(outcome.succeeded, "{:?}", outcome);
    assert!(env.path("out").join("output.gif").exists());
}

#[test]
fn failing_job_stops_the_batch() {
    let env = IntegrationEnv::new();
    let good = env.with_test_video("good.mp4", 1.0);
    let bad = env.path("bad.mp4");
    fs::write(&bad, b"this is not a video").expect("write bad input");
    let third = env.with_test_video("third.mp4", 1.0);
    let requests = vec![env.request(&good), env.request(&bad), env.request(&third)];

    let (outcome, _) = run(&env, &requests);

    assert!(!outcome.succeeded);
    assert_eq!(outcome.message, "FFmpeg finished with errors. Check the log.");
    assert!(matches!(outcome.reports[0].status, JobStatus::Succeeded { .. }));
    assert!(matches!(outcome.reports[1].status, JobStatus::Failed { .. }));
    assert_eq!(outcome.reports[2].status, JobStatus::NotAttempted);
    assert!(env.path("out").join("good.mp4").exists());
    assert!(!env.path("out").join("third.mp4").exists());
}
