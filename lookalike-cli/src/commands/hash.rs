//! Hash command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use lookalike_core::PerceptualHasher;
use tracing::info;

use crate::utils::read_input;

/// Execute the hash command.
///
/// Prints one `<fingerprint>  <path>` line per file, or the bare
/// fingerprint in quiet mode.
pub fn execute(files: &[PathBuf], quiet: bool) -> Result<()> {
    let hasher = PerceptualHasher::new();

    for file in files {
        let data = read_input(file)?;
        let fingerprint = hasher
            .hash_bytes(&data)
            .with_context(|| format!("Failed to decode image: {}", file.display()))?;

        info!(path = %file.display(), image_hash = %fingerprint, "Hashed image");

        if quiet {
            println!("{fingerprint}");
        } else {
            println!("{fingerprint}  {}", file.display());
        }
    }

    Ok(())
}
