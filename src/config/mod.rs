//! Persistence for session configuration and process settings.
//!
//! Session configuration is stored as JSON:
//! - a fixed default file (`<home>/.sc_config.json`) loaded at startup and written on exit
//! - timestamped snapshots (`sc_config.<epoch_micros>.json`) in the output directory,
//!   one per scan start
//!
//! Application settings (license path, render period, export defaults, ...) live in
//! [`settings`].

pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::AppSettings;

use crate::models::SessionConfiguration;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use std::sync::LazyLock;

/// File name of the default configuration inside the home directory.
pub const DEFAULT_CONFIG_FILE: &str = ".sc_config.json";

static SNAPSHOT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sc_config\.(\d+)\.json$").expect("Invalid snapshot regex"));

/// Home directory as a UTF-8 path. Falls back to the working directory when the
/// platform reports none or it is not UTF-8.
pub fn home_dir() -> Utf8PathBuf {
    match dirs::home_dir().map(Utf8PathBuf::try_from) {
        Some(Ok(home)) => home,
        Some(Err(e)) => {
            tracing::warn!("Home directory is not valid UTF-8 ({}), using working directory", e);
            Utf8PathBuf::from(".")
        }
        None => {
            tracing::warn!("No home directory available, using working directory");
            Utf8PathBuf::from(".")
        }
    }
}

/// `<home>/.sc_config.json`
pub fn default_config_path() -> Utf8PathBuf {
    home_dir().join(DEFAULT_CONFIG_FILE)
}

/// Load a configuration file.
///
/// # Returns
/// `Ok(None)` if the file does not exist; the caller keeps whatever it had.
pub fn load(path: &Utf8Path) -> Result<Option<SessionConfiguration>, ConfigError> {
    if !path.exists() {
        tracing::info!("No configuration at {}, keeping current values", path);
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!("Loaded configuration from {}", path);
    Ok(Some(config))
}

/// Write `config` to `path`, replacing any previous contents.
pub fn save(config: &SessionConfiguration, path: &Utf8Path) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    fs::write(path, json).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!("Saved configuration to {}", path);
    Ok(())
}

/// `sc_config.<stamp>.json`
pub fn snapshot_file_name(stamp_micros: i64) -> String {
    format!("sc_config.{}.json", stamp_micros)
}

/// Stamp encoded in a snapshot file name, if it is one.
pub fn snapshot_stamp(file_name: &str) -> Option<i64> {
    SNAPSHOT_NAME
        .captures(file_name)
        .and_then(|caps| caps[1].parse().ok())
}

/// Newest snapshot in `dir` by stamp. A missing directory has no snapshots.
pub fn latest_snapshot(dir: &Utf8Path) -> Result<Option<Utf8PathBuf>, ConfigError> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let entries = dir.read_dir_utf8().map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut newest: Option<(i64, Utf8PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        if let Some(stamp) = snapshot_stamp(entry.file_name()) {
            if newest.as_ref().is_none_or(|(best, _)| stamp > *best) {
                newest = Some((stamp, entry.into_path()));
            }
        }
    }

    Ok(newest.map(|(_, path)| path))
}

/// Writes timestamped configuration snapshots.
///
/// Stamps are epoch microseconds, bumped when needed so that every snapshot
/// written through one writer sorts strictly after the previous one and never
/// overwrites an existing file.
#[derive(Debug, Default)]
pub struct SnapshotWriter {
    last_stamp: Option<i64>,
}

impl SnapshotWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp of the most recent snapshot written by this writer.
    pub fn last_stamp(&self) -> Option<i64> {
        self.last_stamp
    }

    /// Write `config` into its own output directory.
    ///
    /// The directory must already exist.
    pub fn write(&mut self, config: &SessionConfiguration) -> Result<Utf8PathBuf, ConfigError> {
        let dir = &config.output_directory;
        let mut stamp = chrono::Utc::now().timestamp_micros();
        if let Some(last) = self.last_stamp {
            stamp = stamp.max(last + 1);
        }

        let mut path = dir.join(snapshot_file_name(stamp));
        while path.exists() {
            stamp += 1;
            path = dir.join(snapshot_file_name(stamp));
        }

        save(config, &path)?;
        self.last_stamp = Some(stamp);
        Ok(path)
    }
}
