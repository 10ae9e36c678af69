//! Session root and event loop.
//!
//! A [`Session`] owns everything one scan station needs: the display surface,
//! the [`ScanController`] (and through it the capture engine) and the
//! [`RenderScheduler`]. There are no process-wide globals; whoever drives the
//! session holds it by `&mut`.
//!
//! # Event loop
//!
//! [`run_event_loop`] selects over operator intents and render ticks on one
//! task. Each handler runs to completion before the next event is looked at,
//! so engine calls, configuration edits and rendering never interleave.
//!
//! ```text
//! intents (mpsc) ──┐
//!                  ├── select! ──> dispatch(intent) -> status line
//! render ticks ────┘          └──> render_frame()
//! ```

pub mod console;
pub mod controller;
pub mod intent;

pub use console::spawn_intent_reader;
pub use controller::{ControllerError, ScanController};
pub use intent::{Intent, IntentParseError};

use crate::config::{self, AppSettings, ConfigError};
use crate::engine::{CaptureEngine, EngineFailure, LicenseError, SurfaceSize, read_license};
use crate::models::{
    DistanceUnit, MeshExportOptions, ScannerSource, SessionConfiguration, SessionState,
};
use crate::render::{self, DisplaySurface, RenderScheduler};
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

/// Process exit code when the license cannot be read or is rejected.
pub const EXIT_INVALID_LICENSE: i32 = 3;

/// Fatal problems while bringing a session up.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("license could not be read: {0}")]
    LicenseUnreadable(#[from] LicenseError),

    #[error("license rejected by the capture engine: {0}")]
    InvalidLicense(#[source] EngineFailure),
}

impl StartupError {
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::LicenseUnreadable(_) | StartupError::InvalidLicense(_) => {
                EXIT_INVALID_LICENSE
            }
        }
    }
}

/// One running scan station.
///
/// The scheduler is declared first so it is dropped (and stops ticking)
/// before the controller and the surface go away.
#[derive(Debug)]
pub struct Session<E: CaptureEngine, S: DisplaySurface> {
    scheduler: RenderScheduler,
    controller: ScanController<E>,
    surface: S,
    export_defaults: MeshExportOptions,
    default_config_path: Utf8PathBuf,
    persist_on_exit: bool,
}

impl<E: CaptureEngine, S: DisplaySurface> Session<E, S> {
    /// Bring up a session on `surface`.
    ///
    /// 1. build the engine for the surface size and attach a default configuration
    /// 2. arm the render scheduler
    /// 3. read and apply the license (fatal on failure)
    /// 4. show the demo mesh if its model file exists
    /// 5. restore the persisted configuration, falling back to the newest snapshot
    ///
    /// Must be called from within a tokio runtime (the scheduler needs its timer).
    pub fn startup<F>(
        surface: S,
        settings: &AppSettings,
        make_engine: F,
    ) -> Result<Self, StartupError>
    where
        F: FnOnce(SurfaceSize) -> E,
    {
        let engine = make_engine(surface.size());
        let config = SessionConfiguration {
            output_directory: settings.output_directory.clone(),
            ..SessionConfiguration::default()
        };

        let mut session = Self {
            scheduler: RenderScheduler::new(settings.render_period()),
            controller: ScanController::new(engine, config, settings.mesh_post_process.clone()),
            surface,
            export_defaults: settings.export.clone(),
            default_config_path: settings.default_config_path.clone(),
            persist_on_exit: settings.persist_on_exit,
        };

        session.scheduler.arm(settings.render_period());

        if let Err(e) = session.apply_license(&settings.license_path) {
            tracing::error!("{}", e);
            session.scheduler.disarm();
            return Err(e);
        }

        if let Some(model) = &settings.demo_model_path {
            if model.is_file() {
                let texture = settings.demo_texture_path.clone().unwrap_or_default();
                session.controller.load_mesh(model, &texture);
            } else {
                tracing::debug!("No demo mesh at {}", model);
            }
        }

        session.restore_configuration();

        tracing::info!(
            "Session ready ({}x{}, render period {:?})",
            session.surface.size().width,
            session.surface.size().height,
            session.scheduler.period()
        );
        Ok(session)
    }

    fn apply_license(&mut self, path: &Utf8Path) -> Result<(), StartupError> {
        let license = read_license(path)?;
        self.controller
            .set_license(&license)
            .map_err(StartupError::InvalidLicense)
    }

    fn restore_configuration(&mut self) {
        let loaded = match config::load(&self.default_config_path) {
            Ok(Some(config)) => Some(config),
            Ok(None) => self.load_latest_snapshot(),
            Err(e) => {
                tracing::warn!("Ignoring persisted configuration: {}", e);
                None
            }
        };

        if let Some(config) = loaded {
            self.controller.replace_configuration(config);
        }
    }

    fn load_latest_snapshot(&self) -> Option<SessionConfiguration> {
        let dir = &self.controller.config().output_directory;
        let result = config::latest_snapshot(dir).and_then(|latest| match latest {
            Some(path) => config::load(&path),
            None => Ok(None),
        });

        match result {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring snapshots in {}: {}", dir, e);
                None
            }
        }
    }

    pub fn controller(&self) -> &ScanController<E> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ScanController<E> {
        &mut self.controller
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn is_render_armed(&self) -> bool {
        self.scheduler.is_armed()
    }

    pub fn render_ticks(&self) -> u64 {
        self.scheduler.ticks()
    }

    /// Draw every viewport and present the result.
    pub fn render_frame(&mut self) {
        render::render_frame(self.controller.engine_mut(), &mut self.surface);
        tracing::trace!("Rendered frame (tick {})", self.scheduler.ticks());
    }

    /// Handle one operator intent and return the status line to show.
    pub fn dispatch(&mut self, intent: Intent) -> String {
        let controller = &mut self.controller;
        match intent {
            Intent::Lifecycle {
                trigger,
                destination,
            } => {
                let export = match destination {
                    Some(path) => self.export_defaults.with_destination(path),
                    None => self.export_defaults.clone(),
                };
                match controller.fire(trigger, &export) {
                    Ok(state) => format!("{}: ok, session {}", trigger, state),
                    Err(e) => e.to_string(),
                }
            }
            Intent::SetSource(source) => {
                controller.set_scanner_source(source);
                if source.replays_from_disk() && controller.config().input_directory.is_none() {
                    format!("source: {} (no input directory yet, use 'input <dir>')", source)
                } else {
                    format!("source: {}", source)
                }
            }
            Intent::SetInputDirectory(dir) => {
                let status = format!("input directory: {}", dir);
                controller.set_input_directory(Some(dir));
                status
            }
            Intent::SetOutputDirectory(dir) => {
                let status = format!("output directory: {}", dir);
                controller.set_output_directory(dir);
                status
            }
            Intent::SetUnits(units) => {
                controller.set_units(units);
                format!("units: sensor {} scanning {}", units.sensor, units.scanning)
            }
            Intent::SetThreshold(threshold, value) => {
                report_field(controller.set_threshold(threshold, value), threshold, value)
            }
            Intent::SetPlane(plane, value) => {
                report_field(controller.set_plane(plane, value), format!("{} plane", plane), value)
            }
            Intent::SetVoxelSize(value) => {
                report_field(controller.set_voxel_size(value), "voxel size", value)
            }
            Intent::SetScanVolumeSize(value) => {
                report_field(controller.set_scan_volume_size(value), "scan size", value)
            }
            Intent::SetModeFlag(flag, enabled) => {
                controller.set_mode_flag(flag, enabled);
                format!("{}: {}", flag, if enabled { "on" } else { "off" })
            }
            Intent::ListSources => {
                let names: Vec<&'static str> =
                    ScannerSource::ALL.iter().map(|&s| s.into()).collect();
                format!("sources: {}", names.join(", "))
            }
            Intent::ListUnits => {
                let names: Vec<String> = DistanceUnit::ALL.iter().map(|u| u.to_string()).collect();
                format!("units: {}", names.join(", "))
            }
            Intent::Status => self.status_line(),
            Intent::Quit => "shutting down".to_string(),
        }
    }

    /// One-line summary of state and configuration.
    pub fn status_line(&self) -> String {
        let config = self.controller.config();
        let available: Vec<String> = self
            .state()
            .available_triggers()
            .iter()
            .map(|t| t.to_string())
            .collect();
        let input = config
            .input_directory
            .as_ref()
            .map_or("-", |dir| dir.as_str());

        format!(
            concat!(
                "state={} source={} input={} output={} units={}/{} ",
                "voxel={} scan_size={} near={} far={} next=[{}]",
            ),
            self.state(),
            config.scanner_source,
            input,
            config.output_directory,
            config.units.sensor,
            config.units.scanning,
            config.voxel_size,
            config.scan_size,
            config.near_plane,
            config.far_plane,
            available.join(", ")
        )
    }

    /// Stop rendering, then persist the configuration when enabled.
    ///
    /// The scheduler is disarmed even if persisting fails. The controller,
    /// engine and surface are released when the session is dropped.
    pub fn teardown(&mut self) -> Result<(), ConfigError> {
        self.scheduler.disarm();

        if self.persist_on_exit {
            config::save(self.controller.config(), &self.default_config_path)?;
        }

        tracing::info!("Session torn down in state {}", self.state());
        Ok(())
    }
}

impl<E: CaptureEngine, S: DisplaySurface> Drop for Session<E, S> {
    fn drop(&mut self) {
        self.scheduler.disarm();
    }
}

fn report_field(
    result: Result<(), ControllerError>,
    field: impl std::fmt::Display,
    value: f32,
) -> String {
    match result {
        Ok(()) => format!("{}: {}", field, value),
        Err(e) => e.to_string(),
    }
}

/// Serve intents and render ticks until `quit` arrives or the sender goes away.
///
/// Every intent produces exactly one status line through `report`.
pub async fn run_event_loop<E, S, R>(
    session: &mut Session<E, S>,
    mut intents: mpsc::Receiver<Intent>,
    mut report: R,
) where
    E: CaptureEngine,
    S: DisplaySurface,
    R: FnMut(&str),
{
    tracing::info!("Event loop started");
    loop {
        tokio::select! {
            next = intents.recv() => match next {
                Some(Intent::Quit) => {
                    report(&session.dispatch(Intent::Quit));
                    break;
                }
                Some(intent) => {
                    tracing::debug!("Intent: {:?}", intent);
                    let status = session.dispatch(intent);
                    report(&status);
                }
                None => {
                    tracing::info!("Intent source closed");
                    break;
                }
            },
            _ = session.scheduler.tick() => session.render_frame(),
        }
    }
    tracing::info!("Event loop stopped after {} render ticks", session.render_ticks());
}
