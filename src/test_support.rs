//! Test-only wrappers exposed for integration test targets.

use std::path::Path;
use std::sync::Arc;

use crate::error::AppError;
use crate::ffmpeg::{Capabilities, MediaEngine, Toolchain};
use crate::preview::{PreviewError, PreviewFrame, PreviewGenerator, PreviewSettings};

/// Real toolchain plus its probed capabilities.
pub fn discover_for_test() -> Result<(Arc<Toolchain>, Arc<Capabilities>), AppError> {
    let toolchain = Toolchain::discover()?;
    let caps = toolchain.probe_capabilities();
    Ok((Arc::new(toolchain), Arc::new(caps)))
}

/// Runs one undebounced preview on a throwaway runtime.
pub fn generate_preview_blocking(
    engine: Arc<dyn MediaEngine>,
    caps: Arc<Capabilities>,
    input_path: &Path,
    timestamp_seconds: f64,
) -> Result<PreviewFrame, PreviewError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| PreviewError::ExtractionFailed(e.to_string()))?;
    let generator = PreviewGenerator::new(
        engine,
        caps,
        PreviewSettings::default(),
        runtime.handle().clone(),
    );
    runtime.block_on(generator.generate_preview(input_path, timestamp_seconds))
}
