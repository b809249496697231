//! Clock strings as FFmpeg prints them (`H:MM:SS.ms`) and as shown to users (`MM:SS`).

/// Parse `H:MM:SS(.ms)`, `MM:SS(.ms)` or bare seconds, optionally with a leading
/// `-` that applies to the whole value. Returns None for anything else
/// (including FFmpeg's `N/A`).
pub fn parse_timecode(value: &str) -> Option<f64> {
    let value = value.trim();
    let (sign, value) = match value.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, value),
    };
    if value.is_empty() || value.starts_with(['-', '+']) {
        return None;
    }
    let parts: Vec<&str> = value.split(':').collect();
    let seconds = match parts.as_slice() {
        [h, m, s] => parse_part(h)? * 3600.0 + parse_part(m)? * 60.0 + parse_part(s)?,
        [m, s] => parse_part(m)? * 60.0 + parse_part(s)?,
        [s] => parse_part(s)?,
        _ => return None,
    };
    let seconds = sign * seconds;
    seconds.is_finite().then_some(seconds)
}

fn parse_part(part: &str) -> Option<f64> {
    part.trim().parse::<f64>().ok()
}

/// `MM:SS`, or `HH:MM:SS` once past the hour. `--:--` when unknown.
pub fn format_clock(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds.filter(|s| s.is_finite()) else {
        return "--:--".to_string();
    };
    let total = seconds.max(0.0) as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// Seconds with millisecond precision, the form used for `-ss`/`-t` arguments.
pub fn format_seek(seconds: f64) -> String {
    format!("{:.3}", seconds)
}
