//! Encoder/decoder listing of the installed FFmpeg build.
//!
//! Probed once per session. A failed probe yields an empty set, which the planner
//! reads as "nothing known to be available", never as "everything is".

use std::collections::BTreeSet;
use std::path::Path;
use std::process::{Command, Stdio};

#[cfg(windows)]
use std::os::windows::process::CommandExt;

/// Lines shorter than this can't hold a flags column plus a name.
const MIN_LISTING_LINE_LEN: usize = 6;

/// Codec identifiers the engine build can encode and decode. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    encoders: BTreeSet<String>,
    decoders: BTreeSet<String>,
}

impl Capabilities {
    pub fn new<E, D, S>(encoders: E, decoders: D) -> Self
    where
        E: IntoIterator<Item = S>,
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            encoders: encoders.into_iter().map(Into::into).collect(),
            decoders: decoders.into_iter().map(Into::into).collect(),
        }
    }

    /// Query `ffmpeg -encoders` and `ffmpeg -decoders`.
    pub fn probe(ffmpeg: &Path) -> Self {
        let caps = Self {
            encoders: probe_encoders(ffmpeg),
            decoders: probe_decoders(ffmpeg),
        };
        log::debug!(
            target: "vidtools::ffmpeg::capabilities",
            "probed {} encoder(s), {} decoder(s)",
            caps.encoders.len(),
            caps.decoders.len()
        );
        caps
    }

    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoders.contains(name)
    }

    pub fn has_decoder(&self, name: &str) -> bool {
        self.decoders.contains(name)
    }

    pub fn encoders(&self) -> &BTreeSet<String> {
        &self.encoders
    }

    pub fn decoders(&self) -> &BTreeSet<String> {
        &self.decoders
    }

    /// First candidate present in the encoder set.
    pub fn first_encoder<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        candidates.iter().copied().find(|c| self.has_encoder(c))
    }
}

pub fn probe_encoders(ffmpeg: &Path) -> BTreeSet<String> {
    run_listing(ffmpeg, "-encoders")
        .map(|out| parse_codec_listing(&out, "Encoders"))
        .unwrap_or_default()
}

pub fn probe_decoders(ffmpeg: &Path) -> BTreeSet<String> {
    run_listing(ffmpeg, "-decoders")
        .map(|out| parse_codec_listing(&out, "Decoders"))
        .unwrap_or_default()
}

/// Combined stdout+stderr of a listing invocation, or None if it could not run or exited non-zero.
fn run_listing(ffmpeg: &Path, flag: &str) -> Option<String> {
    let mut cmd = Command::new(ffmpeg);
    cmd.args(["-hide_banner", flag])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(windows)]
    cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
    let output = match cmd.output() {
        Ok(o) => o,
        Err(e) => {
            log::warn!(
                target: "vidtools::ffmpeg::capabilities",
                "ffmpeg {} failed to run: {}",
                flag,
                e
            );
            return None;
        }
    };
    if !output.status.success() {
        log::warn!(
            target: "vidtools::ffmpeg::capabilities",
            "ffmpeg {} exited with {:?}",
            flag,
            output.status.code()
        );
        return None;
    }
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Some(text)
}

/// Parse `ffmpeg -encoders`/`-decoders` output. The identifier is the second
/// whitespace token of each data row (` V....D libx264  ...`).
pub fn parse_codec_listing(output: &str, header: &str) -> BTreeSet<String> {
    let mut codecs = BTreeSet::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("--") || line.starts_with(header) {
            continue;
        }
        if line.len() < MIN_LISTING_LINE_LEN {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(_flags), Some(name)) = (parts.next(), parts.next()) else {
            continue;
        };
        // Legend rows: " V..... = Video"
        if name == "=" {
            continue;
        }
        codecs.insert(name.to_string());
    }
    codecs
}
