pub mod batch;
pub mod error;
pub mod ffmpeg;
pub mod job;
pub mod presets;
pub mod preview;
pub mod sidecar_api;
#[cfg(feature = "integration-test-api")]
pub mod test_support;
#[cfg(test)]
mod test_util;
pub mod timecode;

pub use batch::{BatchOutcome, BatchSettings, JobEvent, run_batch};
pub use job::{JobOutcome, JobRequest, OutputFormat};
