//! Integration tests for ScanController driving the simulated engine
//!
//! These tests verify that the controller:
//! - Walks the full lifecycle from init to export
//! - Leaves state untouched when the engine reports a failure
//! - Writes one uniquely named snapshot per successful scan start
//! - Follows the transition table for arbitrary trigger sequences

use camino::Utf8PathBuf;
use proptest::prelude::*;
use scan_station::config::{self, snapshot_stamp};
use scan_station::engine::SurfaceSize;
use scan_station::engine::simulated::{EngineCall, EngineOperation};
use scan_station::models::{MeshExportOptions, MeshPostProcess, Plane, ScannerSource};
use scan_station::{
    CaptureEngine, ControllerError, ScanController, SessionConfiguration, SessionEvent,
    SessionState, SimulatedEngine, Trigger,
};
use tempfile::TempDir;

fn licensed_engine() -> SimulatedEngine {
    let mut engine = SimulatedEngine::new(SurfaceSize {
        width: 640,
        height: 480,
    });
    engine.set_license("TEST-LICENSE").unwrap();
    engine
}

fn controller_in(temp_dir: &TempDir) -> ScanController<SimulatedEngine> {
    let config = SessionConfiguration {
        output_directory: Utf8PathBuf::try_from(temp_dir.path().join("scans")).unwrap(),
        ..SessionConfiguration::default()
    };
    ScanController::new(licensed_engine(), config, MeshPostProcess::default())
}

fn snapshot_stamps(dir: &Utf8PathBuf) -> Vec<i64> {
    let mut stamps: Vec<i64> = dir
        .read_dir_utf8()
        .unwrap()
        .filter_map(|entry| snapshot_stamp(entry.unwrap().file_name()))
        .collect();
    stamps.sort();
    stamps
}

#[test]
fn test_full_lifecycle_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let mut controller = controller_in(&temp_dir);
    let output = controller.config().output_directory.clone();

    controller.set_voxel_size(0.003).unwrap();
    controller.set_scanner_source(ScannerSource::File);

    assert_eq!(controller.init().unwrap(), SessionState::Initialized);
    assert!(controller.engine().calls().contains(&EngineCall::Initialize {
        source: ScannerSource::File,
        input_path: Utf8PathBuf::new(),
    }));

    assert_eq!(controller.start().unwrap(), SessionState::Scanning);
    assert!(output.is_dir());
    assert_eq!(snapshot_stamps(&output).len(), 1);

    assert_eq!(controller.stop().unwrap(), SessionState::Stopped);
    assert_eq!(controller.mesh().unwrap(), SessionState::Meshed);

    let options = MeshExportOptions::default().with_destination("/tmp/out.ply");
    assert_eq!(controller.save(&options).unwrap(), SessionState::Exported);

    let exported = controller.engine().calls().iter().find_map(|call| match call {
        EngineCall::ExportMesh(options) => Some(options.destination.clone()),
        _ => None,
    });
    assert_eq!(exported, Some(Utf8PathBuf::from("/tmp/out.ply")));

    // the snapshot carries the voxel size set before init
    let snapshot = output.join(config::snapshot_file_name(snapshot_stamps(&output)[0]));
    let saved = config::load(&snapshot).unwrap().unwrap();
    assert_eq!(saved.voxel_size, 0.003);
    assert_eq!(saved.scanner_source, ScannerSource::File);
}

#[test]
fn test_init_reapplies_configured_clip_planes() {
    let temp_dir = TempDir::new().unwrap();
    let mut controller = controller_in(&temp_dir);
    controller.set_plane(Plane::Far, 3.0).unwrap();

    controller.init().unwrap();

    let (near, far) = controller.config().clip_planes();
    assert_eq!(controller.engine().clip_planes(), (near, far));
    assert_eq!(far, 3.0);
}

#[test]
fn test_failed_init_keeps_prior_state() {
    let temp_dir = TempDir::new().unwrap();
    let mut controller = controller_in(&temp_dir);
    controller.init().unwrap();
    controller.preview().unwrap();

    let mut events = controller.subscribe();
    controller
        .engine_mut()
        .fail_next(EngineOperation::Initialize, "sensor disconnected");

    let err = controller.init().unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Engine {
            trigger: Trigger::Init,
            ..
        }
    ));
    assert!(err.to_string().contains("sensor disconnected"));
    assert_eq!(controller.state(), SessionState::Previewing);

    match events.try_recv().unwrap() {
        SessionEvent::OperationFailed { trigger, reason } => {
            assert_eq!(trigger, Trigger::Init);
            assert!(reason.contains("sensor disconnected"));
        }
        other => panic!("Expected OperationFailed, got {:?}", other),
    }
}

#[test]
fn test_unknown_source_fails_init() {
    let temp_dir = TempDir::new().unwrap();
    let mut controller = controller_in(&temp_dir);
    controller.set_scanner_source(ScannerSource::Unknown);

    assert!(controller.init().is_err());
    assert_eq!(controller.state(), SessionState::Uninitialized);
}

#[test]
fn test_repeated_starts_write_increasing_snapshots() {
    let temp_dir = TempDir::new().unwrap();
    let mut controller = controller_in(&temp_dir);
    let output = controller.config().output_directory.clone();

    controller.init().unwrap();
    for _ in 0..5 {
        controller.start().unwrap();
        controller.stop().unwrap();
        controller.init().unwrap();
    }

    let stamps = snapshot_stamps(&output);
    assert_eq!(stamps.len(), 5);
    assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(controller.last_snapshot_stamp(), stamps.last().copied());
}

#[test]
fn test_start_fails_when_output_is_a_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut controller = controller_in(&temp_dir);
    let output = controller.config().output_directory.clone();
    std::fs::write(&output, "not a directory").unwrap();
    controller.init().unwrap();

    let err = controller.start().unwrap_err();
    assert!(matches!(err, ControllerError::OutputDirectory(_)));
    assert_eq!(controller.state(), SessionState::Initialized);
    assert!(
        !controller
            .engine()
            .calls()
            .contains(&EngineCall::StartScanning)
    );
}

#[test]
fn test_events_follow_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let mut controller = controller_in(&temp_dir);
    let mut events = controller.subscribe();

    controller.init().unwrap();
    controller.start().unwrap();

    let received: Vec<SessionEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(matches!(
        received[0],
        SessionEvent::StateChanged {
            trigger: Trigger::Init,
            from: SessionState::Uninitialized,
            to: SessionState::Initialized
        }
    ));
    assert!(matches!(
        received[1],
        SessionEvent::StateChanged {
            to: SessionState::Scanning,
            ..
        }
    ));
    assert!(matches!(received[2], SessionEvent::SnapshotWritten { .. }));
    assert_eq!(received.len(), 3);
}

#[test]
fn test_mesh_applies_post_processing() {
    let temp_dir = TempDir::new().unwrap();
    let mut controller = controller_in(&temp_dir);
    controller.init().unwrap();
    controller.start().unwrap();
    controller.stop().unwrap();
    controller.mesh().unwrap();

    let calls = controller.engine().calls();
    let tail = &calls[calls.len() - 4..];
    assert_eq!(
        tail,
        &[
            EngineCall::GenerateMesh,
            EngineCall::SmoothMesh(3),
            EngineCall::ReverseNormals(true),
            EngineCall::ApplyViewportEdits(true),
        ]
    );
}

/// Engine outcome for one step of a generated sequence
#[derive(Debug, Clone)]
struct Step {
    trigger: Trigger,
    fails: bool,
}

fn step() -> impl Strategy<Value = Step> {
    (proptest::sample::select(Trigger::ALL.to_vec()), proptest::bool::weighted(0.2))
        .prop_map(|(trigger, fails)| Step { trigger, fails })
}

fn operation_for(trigger: Trigger) -> EngineOperation {
    match trigger {
        Trigger::Init => EngineOperation::Initialize,
        Trigger::Preview => EngineOperation::StartPreview,
        Trigger::Start => EngineOperation::StartScanning,
        Trigger::Stop => EngineOperation::StopScanning,
        Trigger::Mesh => EngineOperation::GenerateMesh,
        Trigger::Save => EngineOperation::ExportMesh,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_state_follows_transition_table(steps in proptest::collection::vec(step(), 1..24)) {
        let temp_dir = TempDir::new().unwrap();
        let mut controller = controller_in(&temp_dir);
        let export = MeshExportOptions::default()
            .with_destination(temp_dir.path().join("out.ply").to_str().unwrap());
        let mut expected = SessionState::Uninitialized;

        for step in steps {
            let calls_before = controller.engine().calls().len();
            // only inject where the engine will actually be called
            let fails = step.fails && expected.accepts(step.trigger);
            if fails {
                controller
                    .engine_mut()
                    .fail_next(operation_for(step.trigger), "injected");
            }

            let result = controller.fire(step.trigger, &export);

            match expected.on_success(step.trigger) {
                Some(target) if !fails => {
                    prop_assert!(
                        result.is_ok(),
                        "{:?} from {} failed: {:?}",
                        step.trigger,
                        expected,
                        result
                    );
                    expected = target;
                }
                Some(_) => {
                    prop_assert!(result.is_err());
                }
                None => {
                    prop_assert!(
                        matches!(result, Err(ControllerError::NotAvailable { .. })),
                        "expected {:?} to be unavailable from {}",
                        step.trigger,
                        expected
                    );
                    // rejected pairs never reach the engine
                    prop_assert_eq!(controller.engine().calls().len(), calls_before);
                }
            }
            prop_assert_eq!(controller.state(), expected);
        }
    }
}
