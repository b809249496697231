use regex::Regex;
use std::sync::LazyLock;

use crate::timecode::parse_timecode;

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Duration:\s*([^,\s]+)").expect("invalid duration regex"));
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=\s*(\S+)").expect("invalid time regex"));

/// Best-effort percentage derived from FFmpeg's `Duration:` and `time=` lines.
/// One tracker per job. Unknown duration simply means no percentage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressTracker {
    total_duration_seconds: Option<f64>,
    last_percent: f64,
}

impl ProgressTracker {
    /// Seed the total so percentages are available before FFmpeg prints `Duration:`.
    pub fn with_duration(duration_secs: Option<f64>) -> Self {
        Self {
            total_duration_seconds: duration_secs.filter(|d| *d > 0.0),
            last_percent: 0.0,
        }
    }

    pub fn total_duration_seconds(&self) -> Option<f64> {
        self.total_duration_seconds
    }

    pub fn last_percent(&self) -> f64 {
        self.last_percent
    }

    /// Feed one output line. Returns the percentage when this line moved it.
    /// Malformed tokens leave state untouched.
    pub fn on_line(&mut self, line: &str) -> Option<f64> {
        if let Some(caps) = DURATION_RE.captures(line)
            && let Some(duration) = parse_timecode(&caps[1])
        {
            self.total_duration_seconds = Some(duration);
        }

        let caps = TIME_RE.captures(line)?;
        let current = parse_timecode(&caps[1])?;
        let total = self.total_duration_seconds.filter(|d| *d > 0.0)?;
        let percent = (current / total * 100.0).clamp(0.0, 100.0);
        if percent < self.last_percent {
            return None;
        }
        self.last_percent = percent;
        Some(percent)
    }
}
