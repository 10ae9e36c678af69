use crate::config::ConfigError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;
use strum_macros::{Display, EnumString, IntoStaticStr};

/// Capture source handed to the engine on `init`.
///
/// The full set is exposed through [`ScannerSource::ALL`]; callers iterate that
/// slice instead of counting through discriminants.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ScannerSource {
    /// No source selected yet
    Unknown,
    /// Replay of previously recorded input frames from `input_directory`
    File,
    /// Attached depth sensor
    LiveSensor,
}

impl ScannerSource {
    /// Every selectable source, in presentation order
    pub const ALL: &'static [ScannerSource] = &[Self::Unknown, Self::File, Self::LiveSensor];

    /// Whether the engine reads frames from disk for this source
    pub fn replays_from_disk(self) -> bool {
        matches!(self, Self::File)
    }

    /// Parse a source name; `live-sensor` and `live_sensor` are both accepted.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        let name = name.trim();
        name.replace('-', "_")
            .parse()
            .map_err(|_| ConfigError::UnknownSource(name.to_string()))
    }
}

/// Length unit used by the sensor or the scanning volume.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DistanceUnit {
    #[strum(to_string = "millimeters", serialize = "mm")]
    Millimeters,
    #[strum(to_string = "centimeters", serialize = "cm")]
    Centimeters,
    #[strum(to_string = "meters", serialize = "m")]
    Meters,
    #[strum(to_string = "inches", serialize = "in")]
    Inches,
    #[strum(to_string = "feet", serialize = "ft")]
    Feet,
}

impl DistanceUnit {
    pub const ALL: &'static [DistanceUnit] = &[
        Self::Millimeters,
        Self::Centimeters,
        Self::Meters,
        Self::Inches,
        Self::Feet,
    ];

    /// Parse a unit name, accepting both the long and abbreviated forms.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        name.trim()
            .parse()
            .map_err(|_| ConfigError::UnknownUnit(name.trim().to_string()))
    }
}

/// Sensor and scanning units. Only ever replaced as a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSystem {
    pub sensor: DistanceUnit,
    pub scanning: DistanceUnit,
}

impl UnitSystem {
    pub fn new(sensor: DistanceUnit, scanning: DistanceUnit) -> Self {
        Self { sensor, scanning }
    }

    /// Validate both names before building the pair, so a bad second name
    /// never leaves a half-updated unit system behind.
    pub fn parse(sensor: &str, scanning: &str) -> Result<Self, ConfigError> {
        let sensor = DistanceUnit::parse(sensor)?;
        let scanning = DistanceUnit::parse(scanning)?;
        Ok(Self::new(sensor, scanning))
    }
}

impl Default for UnitSystem {
    fn default() -> Self {
        Self::new(DistanceUnit::Millimeters, DistanceUnit::Meters)
    }
}

/// Thresholds the reconstruction uses to accept or reject frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Threshold {
    Normal,
    Distance,
}

/// Raycast clipping planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Plane {
    Near,
    Far,
}

/// Boolean capture toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ModeFlag {
    /// Unbounded capture volume instead of a fixed cube
    Unbounded,
    /// Persist raw input frames next to the scan output
    SaveInputFrames,
}

/// Mutable scan parameters for one session.
///
/// Serialized as the JSON configuration snapshot. Every field has a default so
/// snapshots written by older builds still load.
///
/// Numeric setters perform no clamping; the capture engine decides whether a
/// value is usable. Non-finite values are rejected because they have no JSON
/// representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfiguration {
    pub scanner_source: ScannerSource,
    pub output_directory: Utf8PathBuf,
    pub input_directory: Option<Utf8PathBuf>,

    // Capture mode
    pub use_unbounded: bool,
    pub save_input_frames: bool,

    // Geometry (meters)
    pub normal_threshold: f32,
    pub distance_threshold: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    pub voxel_size: f32,
    pub scan_size: f32,

    pub units: UnitSystem,
}

impl Default for SessionConfiguration {
    fn default() -> Self {
        Self {
            scanner_source: ScannerSource::LiveSensor,
            output_directory: default_output_directory(),
            input_directory: None,
            use_unbounded: false,
            save_input_frames: false,
            normal_threshold: 0.3,
            distance_threshold: 0.05,
            near_plane: 0.2,
            far_plane: 1.5,
            voxel_size: 0.002,
            scan_size: 1.0,
            units: UnitSystem::default(),
        }
    }
}

/// `<home>/scan-station/scans`, or a relative `scan-station/scans` when no home
/// directory can be determined.
pub fn default_output_directory() -> Utf8PathBuf {
    crate::config::home_dir().join("scan-station").join("scans")
}

fn require_finite(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NonFinite { field, value })
    }
}

impl SessionConfiguration {
    pub fn set_threshold(&mut self, threshold: Threshold, value: f32) -> Result<(), ConfigError> {
        match threshold {
            Threshold::Normal => {
                self.normal_threshold = require_finite("normal_threshold", value)?;
            }
            Threshold::Distance => {
                self.distance_threshold = require_finite("distance_threshold", value)?;
            }
        }
        Ok(())
    }

    pub fn set_plane(&mut self, plane: Plane, value: f32) -> Result<(), ConfigError> {
        match plane {
            Plane::Near => self.near_plane = require_finite("near_plane", value)?,
            Plane::Far => self.far_plane = require_finite("far_plane", value)?,
        }
        Ok(())
    }

    pub fn set_voxel_size(&mut self, value: f32) -> Result<(), ConfigError> {
        self.voxel_size = require_finite("voxel_size", value)?;
        Ok(())
    }

    pub fn set_scan_size(&mut self, value: f32) -> Result<(), ConfigError> {
        self.scan_size = require_finite("scan_size", value)?;
        Ok(())
    }

    pub fn set_mode_flag(&mut self, flag: ModeFlag, enabled: bool) {
        match flag {
            ModeFlag::Unbounded => self.use_unbounded = enabled,
            ModeFlag::SaveInputFrames => self.save_input_frames = enabled,
        }
    }

    pub fn mode_flag(&self, flag: ModeFlag) -> bool {
        match flag {
            ModeFlag::Unbounded => self.use_unbounded,
            ModeFlag::SaveInputFrames => self.save_input_frames,
        }
    }

    /// Replace both units at once.
    pub fn set_units(&mut self, units: UnitSystem) {
        self.units = units;
    }

    /// Parse and apply a unit pair given by name. Neither unit changes unless
    /// both names are valid.
    pub fn set_units_by_name(&mut self, sensor: &str, scanning: &str) -> Result<(), ConfigError> {
        let units = UnitSystem::parse(sensor, scanning)?;
        self.set_units(units);
        Ok(())
    }

    /// Current near and far planes.
    pub fn clip_planes(&self) -> (f32, f32) {
        (self.near_plane, self.far_plane)
    }

    /// Create `output_directory` (and parents) if it does not exist yet.
    pub fn ensure_output_directory(&self) -> Result<&Utf8Path, ConfigError> {
        if !self.output_directory.is_dir() {
            fs::create_dir_all(&self.output_directory).map_err(|source| ConfigError::Io {
                path: self.output_directory.clone(),
                source,
            })?;
            tracing::info!("Created output directory {}", self.output_directory);
        }
        Ok(&self.output_directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SessionConfiguration::default();
        assert_eq!(config.scanner_source, ScannerSource::LiveSensor);
        assert!(config.input_directory.is_none());
        assert!(!config.use_unbounded);
        assert_eq!(config.clip_planes(), (0.2, 1.5));
        assert!(config.output_directory.ends_with("scan-station/scans"));
    }

    #[test]
    fn test_source_list_is_explicit() {
        assert_eq!(ScannerSource::ALL.len(), 3);
        assert_eq!(ScannerSource::ALL[1], ScannerSource::File);
        assert!(ScannerSource::File.replays_from_disk());
        assert!(!ScannerSource::LiveSensor.replays_from_disk());
    }

    #[test]
    fn test_source_parse_and_display() {
        assert_eq!("file".parse::<ScannerSource>().unwrap(), ScannerSource::File);
        assert_eq!("LIVE_SENSOR".parse::<ScannerSource>().unwrap(), ScannerSource::LiveSensor);
        assert_eq!(ScannerSource::LiveSensor.to_string(), "live_sensor");
        assert!("webcam".parse::<ScannerSource>().is_err());
    }

    #[test]
    fn test_source_parse_accepts_hyphen() {
        assert_eq!(ScannerSource::parse(" live-sensor ").unwrap(), ScannerSource::LiveSensor);
        assert!(matches!(
            ScannerSource::parse("webcam"),
            Err(ConfigError::UnknownSource(name)) if name == "webcam"
        ));
    }

    #[test]
    fn test_unit_aliases() {
        assert_eq!(DistanceUnit::parse("mm").unwrap(), DistanceUnit::Millimeters);
        assert_eq!(DistanceUnit::parse("Meters").unwrap(), DistanceUnit::Meters);
        assert_eq!(DistanceUnit::parse(" ft ").unwrap(), DistanceUnit::Feet);
        assert!(matches!(
            DistanceUnit::parse("parsec"),
            Err(ConfigError::UnknownUnit(name)) if name == "parsec"
        ));
    }

    #[test]
    fn test_set_units_rejects_half_valid_pair() {
        let mut config = SessionConfiguration::default();
        let before = config.units;

        assert!(config.set_units_by_name("cm", "lightyears").is_err());
        assert_eq!(config.units, before);

        config.set_units_by_name("cm", "in").unwrap();
        assert_eq!(
            config.units,
            UnitSystem::new(DistanceUnit::Centimeters, DistanceUnit::Inches)
        );
    }

    #[test]
    fn test_numeric_setters_do_not_clamp() {
        let mut config = SessionConfiguration::default();
        config.set_threshold(Threshold::Normal, -4.5).unwrap();
        config.set_plane(Plane::Far, 1000.0).unwrap();
        config.set_voxel_size(-0.1).unwrap();

        assert_eq!(config.normal_threshold, -4.5);
        assert_eq!(config.far_plane, 1000.0);
        assert_eq!(config.voxel_size, -0.1);
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut config = SessionConfiguration::default();
        let result = config.set_plane(Plane::Near, f32::NAN);
        assert!(matches!(result, Err(ConfigError::NonFinite { field: "near_plane", .. })));
        assert_eq!(config.near_plane, 0.2);

        assert!(config.set_scan_size(f32::INFINITY).is_err());
        assert_eq!(config.scan_size, 1.0);
    }

    #[test]
    fn test_mode_flags() {
        let mut config = SessionConfiguration::default();
        config.set_mode_flag(ModeFlag::Unbounded, true);
        config.set_mode_flag(ModeFlag::SaveInputFrames, true);
        assert!(config.use_unbounded);
        assert!(config.mode_flag(ModeFlag::SaveInputFrames));
    }

    #[test]
    fn test_ensure_output_directory_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();

        let mut config = SessionConfiguration::default();
        config.output_directory = root.join("a").join("b").join("c");

        config.ensure_output_directory().unwrap();
        assert!(config.output_directory.is_dir());
        config.ensure_output_directory().unwrap();
        assert!(config.output_directory.is_dir());
    }

    #[test]
    fn test_ensure_output_directory_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let blocker = root.join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let mut config = SessionConfiguration::default();
        config.output_directory = blocker.join("scans");

        match config.ensure_output_directory() {
            Err(ConfigError::Io { path, .. }) => assert_eq!(path, blocker.join("scans")),
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_snapshot_uses_defaults() {
        let config: SessionConfiguration =
            serde_json::from_str(r#"{"voxel_size": 0.004, "scanner_source": "file"}"#).unwrap();
        assert_eq!(config.voxel_size, 0.004);
        assert_eq!(config.scanner_source, ScannerSource::File);
        assert_eq!(config.far_plane, 1.5);
    }

    fn unit_name() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("mm".to_string()),
            Just("meters".to_string()),
            Just("ft".to_string()),
            "[a-z]{1,8}",
        ]
    }

    proptest! {
        #[test]
        fn prop_units_change_together_or_not_at_all(
            sensor in unit_name(),
            scanning in unit_name(),
        ) {
            let mut config = SessionConfiguration::default();
            config.set_units(UnitSystem::new(DistanceUnit::Feet, DistanceUnit::Feet));
            let before = config.units;

            match config.set_units_by_name(&sensor, &scanning) {
                Ok(()) => {
                    prop_assert_eq!(config.units.sensor, DistanceUnit::parse(&sensor).unwrap());
                    prop_assert_eq!(config.units.scanning, DistanceUnit::parse(&scanning).unwrap());
                }
                Err(_) => prop_assert_eq!(config.units, before),
            }
        }
    }
}
