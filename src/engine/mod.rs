//! Boundary to the capture engine.
//!
//! The engine performs sensor acquisition, reconstruction, meshing and 3D
//! rendering. This crate only sequences calls into it through [`CaptureEngine`].
//!
//! # Contract
//!
//! - [`set_license`](CaptureEngine::set_license) must succeed before anything else is called.
//! - [`initialize`](CaptureEngine::initialize) resets the engine's raycast clip planes;
//!   callers re-apply their own planes afterwards.
//! - Lifecycle calls return [`EngineStatus`]; setters are fire-and-forget.
//! - The engine never keeps the [`SessionConfiguration`] it is handed; it copies
//!   whatever values it needs during the call.
//!
//! [`SimulatedEngine`] implements the contract in memory and backs the console binary.

pub mod license;
pub mod simulated;

pub use license::{LicenseError, read_license};
pub use simulated::SimulatedEngine;

use crate::models::{MeshExportOptions, ScannerSource, SessionConfiguration};
use camino::Utf8Path;
use std::fmt;
use thiserror::Error;

/// Non-success status from the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct EngineFailure {
    pub reason: String,
}

impl EngineFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Outcome of a lifecycle call.
pub type EngineStatus = Result<(), EngineFailure>;

/// Handle to a renderable view owned by the engine's visualizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportId(pub u32);

impl fmt::Display for ViewportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewport#{}", self.0)
    }
}

/// Pixel dimensions the engine is bound to at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

/// Opaque capture engine.
///
/// All calls are synchronous and happen on the session's event-loop thread.
pub trait CaptureEngine {
    /// Unlock the engine. Failure is fatal for the process.
    fn set_license(&mut self, license: &str) -> EngineStatus;

    /// Prepare `source` for capture. `input_path` is the replay directory for
    /// file sources and empty otherwise.
    fn initialize(
        &mut self,
        source: ScannerSource,
        input_path: &Utf8Path,
        config: &SessionConfiguration,
    ) -> EngineStatus;

    fn start_preview(&mut self) -> EngineStatus;

    fn start_scanning(&mut self, config: &SessionConfiguration) -> EngineStatus;

    fn stop_scanning(&mut self) -> EngineStatus;

    fn generate_mesh(&mut self) -> EngineStatus;

    fn export_mesh(&mut self, options: &MeshExportOptions) -> EngineStatus;

    fn set_scan_volume_size(&mut self, size: f32);

    fn set_voxel_size(&mut self, size: f32);

    fn set_clip_planes(&mut self, near: f32, far: f32);

    fn smooth_mesh(&mut self, iterations: u32);

    fn reverse_normals(&mut self, reverse: bool);

    /// Bake edits made in the mesh viewport into the mesh.
    fn apply_viewport_edits(&mut self, apply: bool);

    /// Best-effort load of a mesh for display.
    fn load_mesh(&mut self, model: &Utf8Path, texture: &Utf8Path);

    /// Viewports currently known to the visualizer.
    fn viewports(&self) -> Vec<ViewportId>;

    fn render_viewport(&mut self, viewport: ViewportId);
}
