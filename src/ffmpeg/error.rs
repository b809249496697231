//! Short summaries for FFmpeg exit codes.
//!
//! Exit codes are from ffmpeg.c: 1 (general), 69 (rate exceeded),
//! 123 (hard exit), 255 (signal). -1 is used for spawn failure or signal death.

pub fn exit_code_summary(code: i32) -> String {
    match code {
        -1 => "FFmpeg not found, failed to start, or was killed.".to_string(),
        1 => "FFmpeg failed.".to_string(),
        69 => "Encoding rate limit exceeded.".to_string(),
        123 | 255 => "Encoding was stopped.".to_string(),
        _ => format!("FFmpeg failed (exit code {}).", code),
    }
}
