// Scan Station - session control for a 3D scanning capture engine
//
// This is the library crate containing the session controller, configuration
// persistence and render scheduling. The binary crate (main.rs) provides a
// headless operator console on top of it.

pub mod config;
pub mod engine;
pub mod logging;
pub mod models;
pub mod render;
pub mod session;
pub mod state;

// Re-export commonly used types for convenience
pub use config::{AppSettings, ConfigError};
pub use engine::{CaptureEngine, EngineFailure, SimulatedEngine};
pub use models::{SessionConfiguration, SessionState, Trigger};
pub use render::{DisplaySurface, HeadlessSurface, RenderScheduler};
pub use session::{
    ControllerError, EXIT_INVALID_LICENSE, Intent, ScanController, Session, StartupError,
    run_event_loop, spawn_intent_reader,
};
pub use state::{EventBus, SessionEvent};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
