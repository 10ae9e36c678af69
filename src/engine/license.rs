use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LicenseError {
    #[error("Failed to read license {path}: {source}")]
    Unreadable {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("License file {0} is empty")]
    Empty(Utf8PathBuf),
}

/// Read the license text, dropping trailing line endings.
pub fn read_license(path: &Utf8Path) -> Result<String, LicenseError> {
    let raw = fs::read_to_string(path).map_err(|source| LicenseError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let license = raw.trim_end_matches(['\r', '\n']);
    if license.is_empty() {
        return Err(LicenseError::Empty(path.to_path_buf()));
    }

    tracing::info!("Read license from {} ({} bytes)", path, license.len());
    Ok(license.to_string())
}
