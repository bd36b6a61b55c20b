//! Hash command

use std::path::PathBuf;

use anyhow::Result;

/// Print `<fingerprint> <path>` for each file.
pub fn hash(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let fingerprint = lpk_core::fingerprint(file)?;
        println!("{} {}", fingerprint, file.display());
    }
    Ok(())
}
