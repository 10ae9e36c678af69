use super::{CaptureEngine, EngineFailure, EngineStatus, SurfaceSize, ViewportId};
use crate::models::{MeshExportOptions, ScannerSource, SessionConfiguration};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;

/// Clip planes the engine falls back to whenever it is initialized.
pub const ENGINE_DEFAULT_CLIP_PLANES: (f32, f32) = (0.1, 1.0);

/// Lifecycle calls that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOperation {
    SetLicense,
    Initialize,
    StartPreview,
    StartScanning,
    StopScanning,
    GenerateMesh,
    ExportMesh,
}

/// One recorded call into the engine. Render calls are counted, not recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetLicense,
    Initialize {
        source: ScannerSource,
        input_path: Utf8PathBuf,
    },
    StartPreview,
    StartScanning,
    StopScanning,
    GenerateMesh,
    ExportMesh(MeshExportOptions),
    SetScanVolumeSize(f32),
    SetVoxelSize(f32),
    SetClipPlanes { near: f32, far: f32 },
    SmoothMesh(u32),
    ReverseNormals(bool),
    ApplyViewportEdits(bool),
    LoadMesh { model: Utf8PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Ready,
    Previewing,
    Scanning,
    Stopped,
    Meshed,
}

/// In-memory capture engine.
///
/// Follows the engine contract closely enough to drive the controller end to
/// end: it checks the license, enforces its own call ordering, resets its clip
/// planes on initialize, and exposes two viewports (scan and mesh).
///
/// Failures can be injected per operation with [`fail_next`](Self::fail_next).
#[derive(Debug)]
pub struct SimulatedEngine {
    surface: SurfaceSize,
    licensed: bool,
    phase: Phase,
    clip_planes: (f32, f32),
    voxel_size: f32,
    scan_volume_size: f32,
    has_mesh: bool,
    calls: Vec<EngineCall>,
    record_calls: bool,
    pending_failures: HashMap<EngineOperation, String>,
    frames: HashMap<ViewportId, u64>,
}

impl SimulatedEngine {
    pub const SCAN_VIEWPORT: ViewportId = ViewportId(0);
    pub const MESH_VIEWPORT: ViewportId = ViewportId(1);

    pub fn new(surface: SurfaceSize) -> Self {
        tracing::info!(
            "Simulated capture engine created ({}x{})",
            surface.width,
            surface.height
        );
        Self {
            surface,
            licensed: false,
            phase: Phase::Idle,
            clip_planes: ENGINE_DEFAULT_CLIP_PLANES,
            voxel_size: 0.002,
            scan_volume_size: 1.0,
            has_mesh: false,
            calls: Vec::new(),
            record_calls: true,
            pending_failures: HashMap::new(),
            frames: HashMap::new(),
        }
    }

    /// Stop keeping the call log. Long-running hosts use this so the log does
    /// not grow with every intent.
    pub fn without_call_log(mut self) -> Self {
        self.record_calls = false;
        self.calls = Vec::new();
        self
    }

    /// Make the next call to `operation` fail with `reason`.
    pub fn fail_next(&mut self, operation: EngineOperation, reason: impl Into<String>) {
        self.pending_failures.insert(operation, reason.into());
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn surface(&self) -> SurfaceSize {
        self.surface
    }

    pub fn clip_planes(&self) -> (f32, f32) {
        self.clip_planes
    }

    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    pub fn scan_volume_size(&self) -> f32 {
        self.scan_volume_size
    }

    pub fn is_licensed(&self) -> bool {
        self.licensed
    }

    /// Frames rendered into `viewport` so far.
    pub fn frames_rendered(&self, viewport: ViewportId) -> u64 {
        self.frames.get(&viewport).copied().unwrap_or(0)
    }

    fn record(&mut self, call: EngineCall) {
        if self.record_calls {
            self.calls.push(call);
        }
    }

    fn check(&mut self, operation: EngineOperation, allowed: &[Phase]) -> EngineStatus {
        if let Some(reason) = self.pending_failures.remove(&operation) {
            tracing::debug!("Injected failure for {:?}: {}", operation, reason);
            return Err(EngineFailure::new(reason));
        }
        if operation != EngineOperation::SetLicense && !self.licensed {
            return Err(EngineFailure::new("invalid license"));
        }
        if !allowed.is_empty() && !allowed.contains(&self.phase) {
            return Err(EngineFailure::new(format!(
                "{:?} not possible while engine is {:?}",
                operation, self.phase
            )));
        }
        Ok(())
    }
}

impl CaptureEngine for SimulatedEngine {
    fn set_license(&mut self, license: &str) -> EngineStatus {
        self.record(EngineCall::SetLicense);
        self.check(EngineOperation::SetLicense, &[])?;

        if license.trim().is_empty() || license.contains(char::is_whitespace) {
            return Err(EngineFailure::new("invalid license"));
        }
        self.licensed = true;
        Ok(())
    }

    fn initialize(
        &mut self,
        source: ScannerSource,
        input_path: &Utf8Path,
        config: &SessionConfiguration,
    ) -> EngineStatus {
        self.record(EngineCall::Initialize {
            source,
            input_path: input_path.to_path_buf(),
        });
        self.check(EngineOperation::Initialize, &[])?;

        if source == ScannerSource::Unknown {
            return Err(EngineFailure::new("no scanner source selected"));
        }
        if source.replays_from_disk() && input_path.as_str().is_empty() {
            tracing::warn!("File source initialized without an input directory");
        }

        self.clip_planes = ENGINE_DEFAULT_CLIP_PLANES;
        self.voxel_size = config.voxel_size;
        self.scan_volume_size = config.scan_size;
        self.has_mesh = false;
        self.phase = Phase::Ready;
        Ok(())
    }

    fn start_preview(&mut self) -> EngineStatus {
        self.record(EngineCall::StartPreview);
        self.check(EngineOperation::StartPreview, &[Phase::Ready])?;
        self.phase = Phase::Previewing;
        Ok(())
    }

    fn start_scanning(&mut self, _config: &SessionConfiguration) -> EngineStatus {
        self.record(EngineCall::StartScanning);
        self.check(
            EngineOperation::StartScanning,
            &[Phase::Ready, Phase::Previewing],
        )?;
        self.phase = Phase::Scanning;
        Ok(())
    }

    fn stop_scanning(&mut self) -> EngineStatus {
        self.record(EngineCall::StopScanning);
        self.check(
            EngineOperation::StopScanning,
            &[Phase::Previewing, Phase::Scanning],
        )?;
        self.phase = Phase::Stopped;
        Ok(())
    }

    fn generate_mesh(&mut self) -> EngineStatus {
        self.record(EngineCall::GenerateMesh);
        self.check(EngineOperation::GenerateMesh, &[Phase::Stopped])?;
        self.has_mesh = true;
        self.phase = Phase::Meshed;
        Ok(())
    }

    fn export_mesh(&mut self, options: &MeshExportOptions) -> EngineStatus {
        self.record(EngineCall::ExportMesh(options.clone()));
        self.check(EngineOperation::ExportMesh, &[Phase::Meshed])?;
        if !self.has_mesh {
            return Err(EngineFailure::new("no mesh to export"));
        }
        tracing::info!("Simulated export to {}", options.destination);
        Ok(())
    }

    fn set_scan_volume_size(&mut self, size: f32) {
        self.record(EngineCall::SetScanVolumeSize(size));
        self.scan_volume_size = size;
    }

    fn set_voxel_size(&mut self, size: f32) {
        self.record(EngineCall::SetVoxelSize(size));
        self.voxel_size = size;
    }

    fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.record(EngineCall::SetClipPlanes { near, far });
        self.clip_planes = (near, far);
    }

    fn smooth_mesh(&mut self, iterations: u32) {
        self.record(EngineCall::SmoothMesh(iterations));
    }

    fn reverse_normals(&mut self, reverse: bool) {
        self.record(EngineCall::ReverseNormals(reverse));
    }

    fn apply_viewport_edits(&mut self, apply: bool) {
        self.record(EngineCall::ApplyViewportEdits(apply));
    }

    fn load_mesh(&mut self, model: &Utf8Path, _texture: &Utf8Path) {
        self.record(EngineCall::LoadMesh {
            model: model.to_path_buf(),
        });
        self.has_mesh = true;
    }

    fn viewports(&self) -> Vec<ViewportId> {
        vec![Self::SCAN_VIEWPORT, Self::MESH_VIEWPORT]
    }

    fn render_viewport(&mut self, viewport: ViewportId) {
        *self.frames.entry(viewport).or_insert(0) += 1;
    }
}
