use crate::config::{default_config_path, home_dir};
use crate::models::session_config::default_output_directory;
use crate::models::{MeshExportOptions, MeshPostProcess};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `SCAN_STATION__RENDER_PERIOD_MS=40`.
pub const ENV_PREFIX: &str = "SCAN_STATION";

/// Pixel size of the display surface the engine renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Process-level settings.
///
/// Layered, lowest priority first:
/// 1. built-in defaults (paths derived from the home directory)
/// 2. YAML settings file
/// 3. `SCAN_STATION__*` environment variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Plain-text license read once at startup
    pub license_path: Utf8PathBuf,

    /// Placeholder mesh shown before the first scan, loaded only if it exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_model_path: Option<Utf8PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_texture_path: Option<Utf8PathBuf>,

    /// Session configuration loaded at startup and written on exit
    pub default_config_path: Utf8PathBuf,

    /// Output directory for a fresh session (a loaded configuration may override it)
    pub output_directory: Utf8PathBuf,

    pub render_period_ms: u64,
    pub persist_on_exit: bool,

    pub log_dir: Utf8PathBuf,
    pub debug: bool,

    pub export: MeshExportOptions,
    pub mesh_post_process: MeshPostProcess,
    pub surface: SurfaceSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        let data_dir = home_dir().join("scan-station");
        Self {
            license_path: data_dir.join("license.txt"),
            demo_model_path: Some(data_dir.join("models").join("placeholder.obj")),
            demo_texture_path: Some(data_dir.join("models").join("placeholder.png")),
            default_config_path: default_config_path(),
            output_directory: default_output_directory(),
            render_period_ms: 25,
            persist_on_exit: true,
            log_dir: data_dir.join("logs"),
            debug: false,
            export: MeshExportOptions::default(),
            mesh_post_process: MeshPostProcess::default(),
            surface: SurfaceSettings::default(),
        }
    }
}

/// `<home>/scan-station/settings.yaml`
pub fn default_settings_path() -> Utf8PathBuf {
    home_dir().join("scan-station").join("settings.yaml")
}

impl AppSettings {
    /// Load settings.
    ///
    /// # Arguments
    /// * `path` - Settings file given by the operator. It must exist. When `None`,
    ///   the default settings file is used if present.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let (file, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (default_settings_path(), false),
        };

        let defaults = config::Config::try_from(&AppSettings::default())
            .context("Failed to build default settings")?;

        let settings: AppSettings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from(file.as_std_path()).required(required))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read settings from {}", file))?
            .try_deserialize()
            .with_context(|| format!("Invalid settings in {}", file))?;

        tracing::debug!("Settings resolved (file={}, required={})", file, required);
        Ok(settings)
    }

    /// Render period as a [`Duration`]. Zero is bumped to 1 ms.
    pub fn render_period(&self) -> Duration {
        Duration::from_millis(self.render_period_ms.max(1))
    }

    /// Effective settings as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).context("Failed to serialize settings to YAML")
    }
}
