//! Scenario runner: drives the engine's tick loop against the sim service.

use crate::menu::RecordingSink;
use crate::oracle::WorldOracle;
use crate::service::SimAnchorService;
use anchortrack_core::{TrackingConfig, TrackingManager};
use anchortrack_env::{ObjectLocation, TokioContext};
use nalgebra::{Point3, Vector3};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Parameters of one simulation run.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub seed: u64,
    /// Simulated wall time to run for.
    pub duration: Duration,
    pub tick_rate_hz: u32,
    pub tracking: TrackingConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            duration: Duration::from_secs(5),
            tick_rate_hz: 30,
            tracking: TrackingConfig::default(),
        }
    }
}

/// What happened during a run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub seed: u64,
    pub ticks: u64,
    /// Placements alive when the run ended.
    pub final_placements: usize,
    /// Instances the service still tracks.
    pub final_tracked: usize,
    pub menu_added: usize,
    pub menu_removed: usize,
}

/// Runs the standard maintenance-room scenario: two registered models, one
/// physical instance of each placed ahead of the wearer.
pub async fn run_scenario(config: ScenarioConfig) -> ScenarioReport {
    let door_model = Uuid::new_v4();
    let valve_model = Uuid::new_v4();

    let service = Arc::new(SimAnchorService::new());
    service.register_model(door_model, "door_a", Vector3::new(1.0, 2.0, 0.2));
    service.register_model(valve_model, "valve_b", Vector3::new(0.4, 0.4, 0.4));

    let mut oracle = WorldOracle::new(config.seed);
    oracle.spawn_object(door_model, Point3::new(0.3, 0.0, 1.8), 0.8);
    oracle.spawn_object(valve_model, Point3::new(-0.5, 0.2, 2.2), 0.7);
    service.load_world(oracle.objects().to_vec());

    let sink = Arc::new(RecordingSink::new());
    let ctx = TokioContext::shared();
    let mut manager = TrackingManager::new(
        service.clone(),
        sink.clone(),
        ctx,
        config.tracking.clone(),
    );
    manager.register_models();
    service.connect(manager.event_sender());
    manager.start_search();

    let dt = Duration::from_secs_f64(1.0 / config.tick_rate_hz as f64);
    let total_ticks = (config.duration.as_secs_f64() * config.tick_rate_hz as f64) as u64;

    // The wearer stands at the origin looking down +Z, straight at the
    // spawned objects.
    service.set_camera(ObjectLocation::identity());

    for tick in 0..total_ticks {
        service.advance_clock(dt);
        manager.tick(dt);

        // Background refinement: the service keeps improving coverage for
        // whatever it tracks.
        if tick % 15 == 14 {
            service.refine_tracked(0.02);
        }

        // Yield real time so spawned detection tasks and emitter threads
        // get to run; a fraction of the tick keeps runs fast.
        tokio::time::sleep(Duration::from_millis(2)).await;

        if tick % 30 == 0 {
            debug!(
                tick,
                placements = manager.placement_count(),
                tracked = service.tracked_count(),
                "scenario progress"
            );
        }
    }

    // Drain anything still in the air before reporting.
    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.process_events();

    let report = ScenarioReport {
        seed: config.seed,
        ticks: total_ticks,
        final_placements: manager.placement_count(),
        final_tracked: service.tracked_count(),
        menu_added: sink.added_count(),
        menu_removed: sink.removed_count(),
    };

    manager.shutdown().await;
    info!(?report, "scenario finished");
    report
}
