// Scan session controller
//
// Owns the session configuration and the capture engine, and sequences engine
// calls according to the lifecycle table in `SessionState::on_success`:
//
//   any         --init-->    Initialized   (then re-apply cached clip planes)
//   Initialized --preview--> Previewing
//   Init/Prev   --start-->   Scanning      (output dir first, snapshot after)
//   Prev/Scan   --stop-->    Stopped
//   Stopped     --mesh-->    Meshed        (then post-processing)
//   Meshed      --save-->    Exported
//
// A rejected pair never reaches the engine. A failed engine call leaves the
// state where it was. Nothing is retried.

use crate::config::{ConfigError, SnapshotWriter};
use crate::engine::{CaptureEngine, EngineFailure, EngineStatus};
use crate::models::{
    MeshExportOptions, MeshPostProcess, ModeFlag, Plane, ScannerSource, SessionConfiguration,
    SessionState, Threshold, Trigger, UnitSystem,
};
use crate::state::{EventBus, SessionEvent};
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tokio::sync::broadcast;

/// Why a trigger or field change did not take effect.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("'{trigger}' is not available while {state}")]
    NotAvailable {
        trigger: Trigger,
        state: SessionState,
    },

    #[error("{trigger} failed: {source}")]
    Engine {
        trigger: Trigger,
        #[source]
        source: EngineFailure,
    },

    #[error("start failed: cannot prepare output directory: {0}")]
    OutputDirectory(#[source] ConfigError),

    #[error("scanning started but the configuration snapshot was not written: {0}")]
    SnapshotNotWritten(#[source] ConfigError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Lifecycle orchestrator for one capture engine.
///
/// Single-threaded by construction: every method takes `&mut self` and the
/// owning [`Session`](crate::session::Session) serializes calls on its event
/// loop, so configuration and state need no locking.
#[derive(Debug)]
pub struct ScanController<E: CaptureEngine> {
    engine: E,
    config: SessionConfiguration,
    state: SessionState,
    snapshots: SnapshotWriter,
    post_process: MeshPostProcess,
    events: EventBus,
}

impl<E: CaptureEngine> ScanController<E> {
    pub fn new(engine: E, config: SessionConfiguration, post_process: MeshPostProcess) -> Self {
        Self {
            engine,
            config,
            state: SessionState::default(),
            snapshots: SnapshotWriter::new(),
            post_process,
            events: EventBus::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfiguration {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stamp of the last snapshot written by `start`, if any.
    pub fn last_snapshot_stamp(&self) -> Option<i64> {
        self.snapshots.last_stamp()
    }

    /// Hand the license to the engine. Callers treat failure as fatal.
    pub fn set_license(&mut self, license: &str) -> EngineStatus {
        let status = self.engine.set_license(license);
        match &status {
            Ok(()) => tracing::info!("Capture engine license accepted"),
            Err(e) => tracing::error!("Capture engine rejected license: {}", e),
        }
        status
    }

    /// Best-effort display of a placeholder mesh.
    pub fn load_mesh(&mut self, model: &Utf8Path, texture: &Utf8Path) {
        tracing::info!("Loading mesh {} (texture {})", model, texture);
        self.engine.load_mesh(model, texture);
    }

    // Lifecycle triggers

    /// Prepare the engine for the configured source.
    ///
    /// The engine resets its clip planes while initializing, so the cached
    /// planes are pushed back right after a successful call.
    pub fn init(&mut self) -> Result<SessionState, ControllerError> {
        let target = self.admit(Trigger::Init)?;

        let source = self.config.scanner_source;
        let input_path = match (&self.config.input_directory, source.replays_from_disk()) {
            (Some(dir), true) => dir.clone(),
            _ => Utf8PathBuf::new(),
        };

        tracing::info!("Initializing {} source (input '{}')", source, input_path);
        let status = self.engine.initialize(source, &input_path, &self.config);
        self.settle(Trigger::Init, target, status)?;

        let (near, far) = self.config.clip_planes();
        self.engine.set_clip_planes(near, far);
        tracing::debug!("Re-applied clip planes near={} far={}", near, far);

        Ok(self.state)
    }

    pub fn preview(&mut self) -> Result<SessionState, ControllerError> {
        let target = self.admit(Trigger::Preview)?;
        let status = self.engine.start_preview();
        self.settle(Trigger::Preview, target, status)
    }

    /// Start capturing. Creates the output directory first and writes a
    /// timestamped configuration snapshot once the engine is scanning.
    pub fn start(&mut self) -> Result<SessionState, ControllerError> {
        let target = self.admit(Trigger::Start)?;

        if let Err(e) = self.config.ensure_output_directory() {
            let err = ControllerError::OutputDirectory(e);
            self.report_failure(Trigger::Start, &err);
            return Err(err);
        }

        let status = self.engine.start_scanning(&self.config);
        self.settle(Trigger::Start, target, status)?;

        match self.snapshots.write(&self.config) {
            Ok(path) => {
                tracing::info!("Configuration snapshot written to {}", path);
                self.events.publish(SessionEvent::SnapshotWritten { path });
                Ok(self.state)
            }
            Err(e) => {
                let err = ControllerError::SnapshotNotWritten(e);
                self.report_failure(Trigger::Start, &err);
                Err(err)
            }
        }
    }

    pub fn stop(&mut self) -> Result<SessionState, ControllerError> {
        let target = self.admit(Trigger::Stop)?;
        let status = self.engine.stop_scanning();
        self.settle(Trigger::Stop, target, status)
    }

    /// Reconstruct the mesh, then apply the configured post-processing.
    pub fn mesh(&mut self) -> Result<SessionState, ControllerError> {
        let target = self.admit(Trigger::Mesh)?;
        let status = self.engine.generate_mesh();
        self.settle(Trigger::Mesh, target, status)?;

        let post = &self.post_process;
        if post.smoothing_iterations > 0 {
            self.engine.smooth_mesh(post.smoothing_iterations);
        }
        self.engine.reverse_normals(post.reverse_normals);
        self.engine.apply_viewport_edits(post.apply_viewport_edits);

        Ok(self.state)
    }

    pub fn save(&mut self, options: &MeshExportOptions) -> Result<SessionState, ControllerError> {
        let target = self.admit(Trigger::Save)?;
        tracing::info!("Exporting mesh to {}", options.destination);
        let status = self.engine.export_mesh(options);
        self.settle(Trigger::Save, target, status)
    }

    /// Run `trigger` with the given export options (used only by `save`).
    pub fn fire(
        &mut self,
        trigger: Trigger,
        export: &MeshExportOptions,
    ) -> Result<SessionState, ControllerError> {
        match trigger {
            Trigger::Init => self.init(),
            Trigger::Preview => self.preview(),
            Trigger::Start => self.start(),
            Trigger::Stop => self.stop(),
            Trigger::Mesh => self.mesh(),
            Trigger::Save => self.save(export),
        }
    }

    // Field changes. These only touch configuration, except the two size
    // setters which the engine applies to the live session immediately.

    pub fn set_threshold(
        &mut self,
        threshold: Threshold,
        value: f32,
    ) -> Result<(), ControllerError> {
        self.config.set_threshold(threshold, value)?;
        self.configuration_changed(format_args!("{} threshold = {}", threshold, value));
        Ok(())
    }

    pub fn set_plane(&mut self, plane: Plane, value: f32) -> Result<(), ControllerError> {
        self.config.set_plane(plane, value)?;
        self.configuration_changed(format_args!("{} plane = {}", plane, value));
        Ok(())
    }

    pub fn set_mode_flag(&mut self, flag: ModeFlag, enabled: bool) {
        self.config.set_mode_flag(flag, enabled);
        self.configuration_changed(format_args!("{} = {}", flag, enabled));
    }

    pub fn set_units(&mut self, units: UnitSystem) {
        self.config.set_units(units);
        self.configuration_changed(format_args!(
            "units sensor={} scanning={}",
            units.sensor, units.scanning
        ));
    }

    pub fn set_scanner_source(&mut self, source: ScannerSource) {
        self.config.scanner_source = source;
        self.configuration_changed(format_args!("scanner source = {}", source));
    }

    pub fn set_input_directory(&mut self, dir: Option<Utf8PathBuf>) {
        tracing::debug!("input directory = {:?}", dir);
        self.config.input_directory = dir;
        self.events.publish(SessionEvent::ConfigurationChanged);
    }

    pub fn set_output_directory(&mut self, dir: Utf8PathBuf) {
        tracing::debug!("output directory = {}", dir);
        self.config.output_directory = dir;
        self.events.publish(SessionEvent::ConfigurationChanged);
    }

    pub fn set_voxel_size(&mut self, size: f32) -> Result<(), ControllerError> {
        self.config.set_voxel_size(size)?;
        self.engine.set_voxel_size(size);
        self.configuration_changed(format_args!("voxel size = {}", size));
        Ok(())
    }

    pub fn set_scan_volume_size(&mut self, size: f32) -> Result<(), ControllerError> {
        self.config.set_scan_size(size)?;
        self.engine.set_scan_volume_size(size);
        self.configuration_changed(format_args!("scan volume size = {}", size));
        Ok(())
    }

    /// Swap in a whole configuration (e.g. one loaded from disk) and push the
    /// live sizes to the engine.
    pub fn replace_configuration(&mut self, config: SessionConfiguration) {
        self.config = config;
        self.engine.set_voxel_size(self.config.voxel_size);
        self.engine.set_scan_volume_size(self.config.scan_size);
        self.configuration_changed(format_args!("configuration replaced"));
    }

    fn configuration_changed(&self, what: std::fmt::Arguments<'_>) {
        tracing::debug!("{}", what);
        self.events.publish(SessionEvent::ConfigurationChanged);
    }

    /// Target state for `trigger`, or a rejection that leaves everything as is.
    fn admit(&self, trigger: Trigger) -> Result<SessionState, ControllerError> {
        match self.state.on_success(trigger) {
            Some(target) => Ok(target),
            None => {
                let err = ControllerError::NotAvailable {
                    trigger,
                    state: self.state,
                };
                self.report_failure(trigger, &err);
                Err(err)
            }
        }
    }

    /// Apply the engine's verdict: move to `target` on success, stay put on failure.
    fn settle(
        &mut self,
        trigger: Trigger,
        target: SessionState,
        status: EngineStatus,
    ) -> Result<SessionState, ControllerError> {
        match status {
            Ok(()) => {
                let from = self.state;
                self.state = target;
                tracing::info!("{}: {} -> {}", trigger, from, target);
                self.events.publish(SessionEvent::StateChanged {
                    trigger,
                    from,
                    to: target,
                });
                Ok(target)
            }
            Err(source) => {
                let err = ControllerError::Engine { trigger, source };
                self.report_failure(trigger, &err);
                Err(err)
            }
        }
    }

    fn report_failure(&self, trigger: Trigger, err: &ControllerError) {
        tracing::warn!("{} (session stays {})", err, self.state);
        self.events.publish(SessionEvent::OperationFailed {
            trigger,
            reason: err.to_string(),
        });
    }
}
