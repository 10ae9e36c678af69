//! Data models for the scan station.
//!
//! - [`SessionConfiguration`]: scan parameters owned by the controller and
//!   persisted as JSON snapshots
//! - [`SessionState`] / [`Trigger`]: the capture lifecycle and its transition table
//! - [`MeshExportOptions`] / [`MeshPostProcess`]: what happens to the reconstructed mesh
//!
//! Sources and units are closed enums with explicit `ALL` slices so UI layers can
//! list them without relying on discriminant order.

pub mod export;
pub mod session_config;
pub mod session_state;

pub use export::{MeshExportOptions, MeshPostProcess};
pub use session_config::{
    DistanceUnit, ModeFlag, Plane, ScannerSource, SessionConfiguration, Threshold, UnitSystem,
};
pub use session_state::{SessionState, Trigger};
