//! Subcommand implementations.

pub mod inspect;
pub mod verify;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Read a saved response body from disk.
pub fn read_response(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read response file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read response");
    Ok(bytes)
}
