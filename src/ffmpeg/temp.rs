use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const TEMP_PREFIX: &str = "vidtools-";

/// Stateless factory for temp file paths. The file itself is written by FFmpeg.
#[derive(Default)]
pub struct TempFileManager;

/// Generates a short suffix for temp filenames. For uniqueness only.
fn random_alphanumeric_suffix(len: usize) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    static STATE: AtomicU64 = AtomicU64::new(0);
    let seed = STATE.fetch_add(1, Ordering::Relaxed)
        ^ u64::from(std::process::id()).rotate_left(32);
    let mut n = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut s = String::with_capacity(len);
    for _ in 0..len {
        s.push(CHARS[(n % CHARS.len() as u64) as usize] as char);
        n /= CHARS.len() as u64;
        if n == 0 {
            n = seed.wrapping_add(len as u64).wrapping_mul(2862933555777941757);
        }
    }
    s
}

impl TempFileManager {
    pub fn create(&self, suffix: &str) -> TempArtifact {
        let name = format!(
            "{}{}-{}-{}",
            TEMP_PREFIX,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
            random_alphanumeric_suffix(9),
            suffix
        );
        TempArtifact {
            path: std::env::temp_dir().join(name),
        }
    }
}

/// A temp path removed when dropped, whether or not anything was written to it.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::trace!(
                target: "vidtools::ffmpeg::temp",
                "removed {}",
                self.path.display()
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                target: "vidtools::ffmpeg::temp",
                "failed to remove {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Remove leftover temp files (e.g. from a crashed session) older than `max_age`.
pub fn cleanup_old_temp_files(max_age: Duration) -> usize {
    let Ok(entries) = fs::read_dir(std::env::temp_dir()) else {
        return 0;
    };
    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| now.duration_since(t).ok());
        if age.is_some_and(|a| a > max_age) && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        log::info!(
            target: "vidtools::ffmpeg::temp",
            "removed {} stale temp file(s)",
            removed
        );
    }
    removed
}
