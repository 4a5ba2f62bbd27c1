//! The tracking manager: detection cycles, event reconciliation, culling.
//!
//! One instance owns all per-model and per-instance state. Each tick it
//! drains the event queue, advances the placement smoothers, and - when
//! searching and no cycle is already in flight - spawns one asynchronous
//! detection cycle. Detection results never return directly; they come back
//! later through the same event queue.
//!
//! Threading: placements and instance snapshots are touched only on the
//! consumer (tick) thread and need no locking. The query registry is shared
//! with the background detection task and sits behind a coarse mutex. The
//! in-flight guard is a compare-and-swap flag ensuring at most one
//! detection cycle runs concurrently, so a slow service cannot cause a
//! request storm.

use crate::config::TrackingConfig;
use crate::events::{EventQueue, EventSender, TrackingEvent};
use crate::placement::{evaluate_update, InstanceState, Placement, UpdateDecision};
use crate::search;
use anchortrack_env::{
    AnchorContext, AnchorService, EnvError, ObjectEventArgs, ObjectListSink, ObjectQuery,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Errors raised while reconciling tracking state.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TrackingError {
    /// A tracking result referenced a model with no registered name or
    /// geometry. This is a setup mistake, not a runtime condition; the
    /// event is skipped and logged rather than crashing the drain loop.
    #[error("No model registered with id {0}")]
    UnknownModel(Uuid),

    /// The service rejected a call.
    #[error("Service error: {0}")]
    Service(#[from] EnvError),
}

/// Mutual exclusion for the detection cycle.
///
/// `try_begin` succeeds for exactly one caller until `complete` is called;
/// a new cycle may only start once the previous one has fully finished.
#[derive(Debug, Default)]
pub struct DetectionGate {
    in_flight: AtomicBool,
}

impl DetectionGate {
    pub fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
        }
    }

    /// Attempts to claim the in-flight slot. Returns true for the single
    /// winner.
    pub fn try_begin(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the slot. Must be called on every cycle exit path,
    /// including errors.
    pub fn complete(&self) {
        self.in_flight.store(false, Ordering::Release);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Owns per-model search queries and per-instance placements, and drives
/// the periodic detection cycle.
pub struct TrackingManager<Ctx: AnchorContext> {
    service: Arc<dyn AnchorService>,
    sink: Arc<dyn ObjectListSink>,
    ctx: Arc<Ctx>,
    config: TrackingConfig,

    /// At most one active query per model. Shared with the detection task.
    queries: Arc<Mutex<HashMap<Uuid, ObjectQuery>>>,

    /// Visual binding per tracked instance. Consumer thread only.
    placements: HashMap<Uuid, Placement>,

    /// Last applied state per model, for update suppression.
    prev_states: HashMap<Uuid, InstanceState>,

    /// Display names captured at registration.
    model_names: HashMap<Uuid, String>,

    events: Arc<EventQueue>,
    gate: Arc<DetectionGate>,
    searching: bool,
}

impl<Ctx: AnchorContext> TrackingManager<Ctx> {
    /// Creates a manager with explicit collaborators. Search starts paused;
    /// call [`start_search`](Self::start_search) to begin detection cycles.
    pub fn new(
        service: Arc<dyn AnchorService>,
        sink: Arc<dyn ObjectListSink>,
        ctx: Arc<Ctx>,
        config: TrackingConfig,
    ) -> Self {
        Self {
            service,
            sink,
            ctx,
            config,
            queries: Arc::new(Mutex::new(HashMap::new())),
            placements: HashMap::new(),
            prev_states: HashMap::new(),
            model_names: HashMap::new(),
            events: Arc::new(EventQueue::new()),
            gate: Arc::new(DetectionGate::new()),
            searching: false,
        }
    }

    /// Snapshots the service's registered models: one query slot and one
    /// display name per model.
    pub fn register_models(&mut self) {
        let mut registry = lock_registry(&self.queries);
        for model_id in self.service.model_ids() {
            match self.service.model_name(model_id) {
                Some(name) => {
                    self.model_names.insert(model_id, name);
                }
                None => {
                    warn!(%model_id, "registered model has no display name");
                }
            }
            registry.entry(model_id).or_insert_with(|| ObjectQuery {
                model_id,
                search_areas: Vec::new(),
                min_surface_coverage: self.config.min_surface_coverage,
                expected_max_vertical_orientation_deg: self.config.max_vertical_orientation_deg,
                observation_mode: self.config.observation_mode,
            });
        }
        info!(models = registry.len(), "object queries initialized");
    }

    /// Producer handle for the service's event callbacks.
    pub fn event_sender(&self) -> EventSender {
        EventSender::new(self.events.clone())
    }

    /// One main-loop tick: drain events, advance smoothing, maybe start a
    /// detection cycle. Never blocks.
    pub fn tick(&mut self, dt: Duration) {
        self.process_events();
        self.advance_placements(dt);
        if self.searching {
            self.try_start_detection();
        }
    }

    /// Drains the event queue and dispatches each event. Per-event failures
    /// are logged and do not stop the drain.
    pub fn process_events(&mut self) {
        for event in self.events.drain() {
            if let Err(err) = self.dispatch(event) {
                warn!(error = %err, "event handling failed");
            }
        }
    }

    /// Advances every placement's smoothing by one frame delta.
    pub fn advance_placements(&mut self, dt: Duration) {
        for placement in self.placements.values_mut() {
            placement.transform.update(dt);
        }
    }

    fn dispatch(&mut self, event: TrackingEvent) -> Result<(), TrackingError> {
        match event {
            TrackingEvent::DetectionAttempted => {
                trace!("detection attempted");
                Ok(())
            }
            TrackingEvent::Added(args) => self.handle_added(args),
            TrackingEvent::Updated(args) => self.handle_updated(args),
            TrackingEvent::Removed(args) => {
                self.handle_removed(args);
                Ok(())
            }
        }
    }

    fn handle_added(&mut self, args: ObjectEventArgs) -> Result<(), TrackingError> {
        debug!(
            instance = %short_id(args.instance_id),
            coverage = format_args!("{:.4}", args.surface_coverage),
            "added"
        );
        let name = self
            .model_names
            .get(&args.model_id)
            .cloned()
            .ok_or(TrackingError::UnknownModel(args.model_id))?;

        self.service
            .set_instance_tracking_mode(args.instance_id, self.config.tracking_mode);
        self.sink.object_added(args.model_id, args.instance_id, &name);
        self.upsert_placement(&args, true)
    }

    fn handle_updated(&mut self, args: ObjectEventArgs) -> Result<(), TrackingError> {
        debug!(
            instance = %short_id(args.instance_id),
            coverage = format_args!("{:.4}", args.surface_coverage),
            "updated"
        );
        self.upsert_placement(&args, false)
    }

    /// Destroys the instance's placement. Silently a no-op when the
    /// instance is unknown, tolerating duplicate or out-of-order Removed
    /// events.
    fn handle_removed(&mut self, args: ObjectEventArgs) {
        debug!(instance = %short_id(args.instance_id), "removed");
        if let Some(placement) = self.placements.remove(&args.instance_id) {
            self.prev_states.remove(&placement.model_id);
            self.sink.object_removed(placement.model_id);
        }
    }

    /// Creates the placement if needed and applies the pose iff the
    /// update-suppression heuristic allows it.
    fn upsert_placement(
        &mut self,
        args: &ObjectEventArgs,
        force_new: bool,
    ) -> Result<(), TrackingError> {
        let name = self
            .model_names
            .get(&args.model_id)
            .cloned()
            .ok_or(TrackingError::UnknownModel(args.model_id))?;
        let model_box = self
            .service
            .model_bounding_box(args.model_id)
            .ok_or(TrackingError::UnknownModel(args.model_id))?;
        let origin_to_center = self
            .service
            .model_origin_to_center_transform(args.model_id)
            .ok_or(TrackingError::UnknownModel(args.model_id))?;

        let cur = InstanceState::from_args(args);
        let is_new = force_new || !self.placements.contains_key(&args.instance_id);

        if !self.placements.contains_key(&args.instance_id) {
            self.placements.insert(
                args.instance_id,
                Placement::new(
                    args.model_id,
                    args.instance_id,
                    name,
                    model_box,
                    origin_to_center,
                    &self.config,
                ),
            );
        }

        let decision = if is_new {
            UpdateDecision::New
        } else {
            match self.prev_states.get(&args.model_id) {
                Some(prev) => evaluate_update(prev, &cur, &self.config),
                None => UpdateDecision::New,
            }
        };

        let Some(placement) = self.placements.get_mut(&args.instance_id) else {
            return Ok(());
        };
        placement.refresh_wireframe(&model_box, args);

        if !decision.should_update() {
            debug!(instance = %short_id(args.instance_id), reason = %decision, "did not update");
            return Ok(());
        }

        let Some(location) = args.location else {
            // A fresh placement with no pose has nothing to show yet; the
            // next located update will place it.
            debug!(instance = %short_id(args.instance_id), "no pose to place yet");
            return Ok(());
        };

        debug!(instance = %short_id(args.instance_id), reason = %decision, "updating placement");
        let instantaneous = matches!(decision, UpdateDecision::New);
        placement.apply_pose(location.position, location.orientation, instantaneous);
        // The snapshot is overwritten unconditionally whenever an update is
        // applied.
        self.prev_states.insert(args.model_id, cur);
        Ok(())
    }

    /// Explicit re-track request from the object menu: drop the instance
    /// on the service and locally.
    pub fn reset_instance(&mut self, model_id: Uuid, instance_id: Uuid) {
        self.service.remove_instance(instance_id);
        self.placements.remove(&instance_id);
        self.prev_states.remove(&model_id);
    }

    /// Resumes detection cycles.
    pub fn start_search(&mut self) {
        self.searching = true;
        info!("search started");
    }

    /// Stops issuing new detection cycles. An in-flight cycle finishes on
    /// its own.
    pub fn stop_search(&mut self) {
        self.searching = false;
        info!("search stopped");
    }

    pub fn toggle_search(&mut self) {
        if self.searching {
            self.stop_search();
        } else {
            self.start_search();
        }
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    /// Starts a detection cycle unless one is already in flight. Returns
    /// true if this call won the slot and spawned a cycle.
    pub fn try_start_detection(&self) -> bool {
        if !self.gate.try_begin() {
            return false;
        }

        let service = self.service.clone();
        let queries = self.queries.clone();
        let events = self.events.clone();
        let config = self.config.clone();
        let gate = self.gate.clone();
        let ctx = self.ctx.clone();

        self.ctx.spawn("detection-cycle", async move {
            // Errors stay on this task: logged here, never thrown across
            // the thread boundary.
            if let Err(err) = run_detection_cycle(service, queries, events, &config, ctx).await {
                warn!(error = %err, "detection failed");
            }
            gate.complete();
        });
        true
    }

    /// Stops searching, waits (bounded) for any in-flight cycle, then
    /// releases all queries and placements.
    pub async fn shutdown(&mut self) {
        self.searching = false;

        let mut attempts = 0;
        while self.gate.is_in_flight() && attempts < 200 {
            self.ctx.sleep(Duration::from_millis(5)).await;
            attempts += 1;
        }
        if self.gate.is_in_flight() {
            warn!("abandoning in-flight detection cycle");
        }

        lock_registry(&self.queries).clear();
        self.placements.clear();
        self.prev_states.clear();
        info!("tracking manager shut down");
    }

    /// Placement for one instance, if it exists.
    pub fn placement(&self, instance_id: Uuid) -> Option<&Placement> {
        self.placements.get(&instance_id)
    }

    /// All current placements.
    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.placements.values()
    }

    /// Number of instances currently placed.
    pub fn placement_count(&self) -> usize {
        self.placements.len()
    }

    /// Shared query registry handle (for harnesses driving the cycle
    /// directly).
    pub fn query_registry(&self) -> Arc<Mutex<HashMap<Uuid, ObjectQuery>>> {
        self.queries.clone()
    }

    pub fn detection_gate(&self) -> Arc<DetectionGate> {
        self.gate.clone()
    }
}

/// One asynchronous detection cycle.
///
/// Returns `Ok(true)` when a detection batch was submitted, `Ok(false)`
/// when the cycle ended early (world frame unavailable, or nothing to
/// query). Runs on a background task; the caller owns the in-flight gate.
pub async fn run_detection_cycle<Ctx: AnchorContext>(
    service: Arc<dyn AnchorService>,
    queries: Arc<Mutex<HashMap<Uuid, ObjectQuery>>>,
    events: Arc<EventQueue>,
    config: &TrackingConfig,
    ctx: Arc<Ctx>,
) -> Result<bool, TrackingError> {
    // The world coordinate frame may not be available early in a session;
    // abort silently and retry next tick.
    if service.world_frame().is_none() {
        return Ok(false);
    }

    let camera = service.camera_pose();
    let target = search::estimated_target(&camera, config.far_distance);

    // Cull tracked instances that drifted beyond the far search range.
    // Culling runs before query rebuilding, so a culled instance cannot
    // also trigger a stale single-instance skip.
    for instance in service.tracking_results() {
        let Some(location) = instance.location else {
            continue;
        };
        let Some(model_box) = service.model_bounding_box(instance.model_id) else {
            warn!(model_id = %instance.model_id, "tracking result references unregistered model");
            continue;
        };

        let instance_center = location.position + location.orientation * model_box.center.coords;
        let offset = instance_center - camera.position;
        if offset.norm() > config.cull_distance() {
            // Best-effort: already-removed instances are fine.
            debug!(instance = %short_id(instance.instance_id), distance = offset.norm(), "culling far instance");
            service.remove_instance(instance.instance_id);
        }
    }

    // Rebuild the per-model queries under the registry lock. Shapes are
    // recomputed every cycle: model boxes are static, the camera is not.
    let tracking_results = service.tracking_results();
    let batch: Vec<ObjectQuery> = {
        let mut registry = lock_registry(&queries);
        let mut batch = Vec::with_capacity(registry.len());
        for (model_id, query) in registry.iter_mut() {
            if config.search_single_instance
                && tracking_results.iter().any(|r| r.model_id == *model_id)
            {
                continue;
            }
            let Some(model_box) = service.model_bounding_box(*model_id) else {
                warn!(%model_id, "registered model has no bounding box");
                continue;
            };

            *query = search::build_query(*model_id, &camera, &target, &model_box, config);
            batch.push(query.clone());
        }
        batch
    };

    // Pause a while if detection is not required.
    if batch.is_empty() {
        ctx.sleep(config.idle_throttle).await;
        return Ok(false);
    }

    events.push(TrackingEvent::DetectionAttempted);
    service.detect_objects(&batch).await?;
    Ok(true)
}

fn lock_registry(
    queries: &Arc<Mutex<HashMap<Uuid, ObjectQuery>>>,
) -> MutexGuard<'_, HashMap<Uuid, ObjectQuery>> {
    queries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn short_id(id: Uuid) -> String {
    id.to_string().chars().take(5).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchortrack_env::{
        ObjectLocation, ObservationMode, OrientedBox, TokioContext, TrackingMode, WorldFrame,
    };
    use async_trait::async_trait;
    use nalgebra::{Isometry3, Point3, UnitQuaternion, Vector3};
    use std::sync::atomic::AtomicUsize;

    struct MockService {
        models: HashMap<Uuid, (String, OrientedBox)>,
        results: Mutex<Vec<ObjectEventArgs>>,
        removed: Mutex<Vec<Uuid>>,
        detect_calls: AtomicUsize,
        world_ready: AtomicBool,
        camera: ObjectLocation,
        fail_detection: bool,
    }

    impl MockService {
        fn new() -> Self {
            Self {
                models: HashMap::new(),
                results: Mutex::new(Vec::new()),
                removed: Mutex::new(Vec::new()),
                detect_calls: AtomicUsize::new(0),
                world_ready: AtomicBool::new(true),
                camera: ObjectLocation::identity(),
                fail_detection: false,
            }
        }

        fn with_model(mut self, model_id: Uuid, name: &str) -> Self {
            let bbox = OrientedBox {
                center: Point3::origin(),
                extents: Vector3::new(1.0, 1.0, 1.0),
                orientation: UnitQuaternion::identity(),
            };
            self.models.insert(model_id, (name.to_string(), bbox));
            self
        }

        fn with_result(self, args: ObjectEventArgs) -> Self {
            self.results.lock().unwrap().push(args);
            self
        }

        fn removed_ids(&self) -> Vec<Uuid> {
            self.removed.lock().unwrap().clone()
        }

        fn detect_count(&self) -> usize {
            self.detect_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnchorService for MockService {
        fn model_ids(&self) -> Vec<Uuid> {
            self.models.keys().copied().collect()
        }

        fn model_name(&self, model_id: Uuid) -> Option<String> {
            self.models.get(&model_id).map(|(name, _)| name.clone())
        }

        fn model_bounding_box(&self, model_id: Uuid) -> Option<OrientedBox> {
            self.models.get(&model_id).map(|(_, bbox)| *bbox)
        }

        fn model_origin_to_center_transform(&self, model_id: Uuid) -> Option<Isometry3<f64>> {
            self.models.get(&model_id).map(|_| Isometry3::identity())
        }

        fn tracking_results(&self) -> Vec<ObjectEventArgs> {
            self.results.lock().unwrap().clone()
        }

        async fn detect_objects(&self, _queries: &[ObjectQuery]) -> Result<(), EnvError> {
            self.detect_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_detection {
                return Err(EnvError::detection("mock failure"));
            }
            Ok(())
        }

        fn set_instance_tracking_mode(&self, _instance_id: Uuid, _mode: TrackingMode) {}

        fn remove_instance(&self, instance_id: Uuid) {
            self.removed.lock().unwrap().push(instance_id);
        }

        fn world_frame(&self) -> Option<WorldFrame> {
            if self.world_ready.load(Ordering::SeqCst) {
                Some(WorldFrame::new())
            } else {
                None
            }
        }

        fn camera_pose(&self) -> ObjectLocation {
            self.camera
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        added: Mutex<Vec<(Uuid, Uuid, String)>>,
        removed: Mutex<Vec<Uuid>>,
    }

    impl ObjectListSink for RecordingSink {
        fn object_added(&self, model_id: Uuid, instance_id: Uuid, display_name: &str) {
            self.added
                .lock()
                .unwrap()
                .push((model_id, instance_id, display_name.to_string()));
        }

        fn object_removed(&self, model_id: Uuid) {
            self.removed.lock().unwrap().push(model_id);
        }
    }

    fn located_args(model_id: Uuid, instance_id: Uuid, x: f64, coverage: f64) -> ObjectEventArgs {
        ObjectEventArgs {
            model_id,
            instance_id,
            location: Some(ObjectLocation::new(
                Point3::new(x, 0.0, 0.0),
                UnitQuaternion::identity(),
            )),
            surface_coverage: coverage,
            scale_change: Vector3::new(1.0, 1.0, 1.0),
            last_updated: Duration::from_secs(1),
            tracking_mode: TrackingMode::LowLatencyCoarsePosition,
        }
    }

    fn manager_with(
        service: Arc<MockService>,
        sink: Arc<RecordingSink>,
    ) -> TrackingManager<TokioContext> {
        let mut manager = TrackingManager::new(
            service,
            sink,
            TokioContext::shared(),
            TrackingConfig::default(),
        );
        manager.register_models();
        manager
    }

    #[test]
    fn test_gate_admits_exactly_one_of_many_threads() {
        let gate = Arc::new(DetectionGate::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let gate = gate.clone();
            handles.push(std::thread::spawn(move || gate.try_begin()));
        }
        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
        assert!(gate.is_in_flight());

        // After completion the slot opens again for exactly one winner.
        gate.complete();
        assert!(gate.try_begin());
        assert!(!gate.try_begin());
    }

    #[tokio::test]
    async fn test_added_creates_placement_and_notifies_menu() {
        let model_id = Uuid::new_v4();
        let instance_id = Uuid::new_v4();
        let service = Arc::new(MockService::new().with_model(model_id, "door"));
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager_with(service, sink.clone());

        let sender = manager.event_sender();
        sender.send(TrackingEvent::Added(located_args(
            model_id,
            instance_id,
            1.0,
            0.6,
        )));
        manager.tick(Duration::from_millis(16));

        assert_eq!(manager.placement_count(), 1);
        let placement = manager.placement(instance_id).unwrap();
        // New placements teleport: the pose is applied instantaneously.
        assert_eq!(placement.transform.position(), Point3::new(1.0, 0.0, 0.0));
        assert_eq!(placement.display_name, "door");

        let added = sink.added.lock().unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0], (model_id, instance_id, "door".to_string()));
    }

    #[tokio::test]
    async fn test_lifecycle_one_placement_created_one_destroyed() {
        let model_id = Uuid::new_v4();
        let instance_id = Uuid::new_v4();
        let service = Arc::new(MockService::new().with_model(model_id, "valve"));
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager_with(service, sink.clone());
        let sender = manager.event_sender();

        assert_eq!(manager.placement_count(), 0);

        sender.send(TrackingEvent::Added(located_args(
            model_id,
            instance_id,
            0.0,
            0.5,
        )));
        sender.send(TrackingEvent::Updated(located_args(
            model_id,
            instance_id,
            0.5,
            0.5,
        )));
        sender.send(TrackingEvent::Updated(located_args(
            model_id,
            instance_id,
            1.0,
            0.5,
        )));
        manager.tick(Duration::from_millis(16));
        assert_eq!(manager.placement_count(), 1);

        sender.send(TrackingEvent::Removed(located_args(
            model_id,
            instance_id,
            1.0,
            0.5,
        )));
        manager.tick(Duration::from_millis(16));
        assert_eq!(manager.placement_count(), 0);
        assert_eq!(sink.removed.lock().unwrap().as_slice(), &[model_id]);

        // Duplicate Removed is a silent no-op.
        sender.send(TrackingEvent::Removed(located_args(
            model_id,
            instance_id,
            1.0,
            0.5,
        )));
        manager.tick(Duration::from_millis(16));
        assert_eq!(manager.placement_count(), 0);
        assert_eq!(sink.removed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insignificant_update_is_suppressed() {
        let model_id = Uuid::new_v4();
        let instance_id = Uuid::new_v4();
        let service = Arc::new(MockService::new().with_model(model_id, "pump"));
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager_with(service, sink);
        let sender = manager.event_sender();

        sender.send(TrackingEvent::Added(located_args(
            model_id,
            instance_id,
            0.0,
            0.5,
        )));
        manager.tick(Duration::from_millis(16));

        // 5cm drift with identical coverage: below the 10cm threshold.
        sender.send(TrackingEvent::Updated(located_args(
            model_id,
            instance_id,
            0.05,
            0.5,
        )));
        // Tick long enough that any accepted retarget would have settled.
        manager.tick(Duration::from_secs(2));

        let placement = manager.placement(instance_id).unwrap();
        assert_eq!(placement.transform.position(), Point3::new(0.0, 0.0, 0.0));
    }

    #[tokio::test]
    async fn test_significant_update_retargets_smoothly() {
        let model_id = Uuid::new_v4();
        let instance_id = Uuid::new_v4();
        let service = Arc::new(MockService::new().with_model(model_id, "pump"));
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager_with(service, sink);
        let sender = manager.event_sender();

        sender.send(TrackingEvent::Added(located_args(
            model_id,
            instance_id,
            0.0,
            0.5,
        )));
        manager.tick(Duration::from_millis(16));

        // Half a meter is well past the threshold.
        sender.send(TrackingEvent::Updated(located_args(
            model_id,
            instance_id,
            0.5,
            0.5,
        )));
        manager.process_events();

        // Immediately after the retarget the hologram has not jumped.
        let placement = manager.placement(instance_id).unwrap();
        assert_eq!(placement.transform.position(), Point3::new(0.0, 0.0, 0.0));
        assert!(placement.transform.is_settling());

        // After the smoothing window it has arrived.
        manager.advance_placements(Duration::from_secs(2));
        let placement = manager.placement(instance_id).unwrap();
        assert_eq!(placement.transform.position(), Point3::new(0.5, 0.0, 0.0));
    }

    #[tokio::test]
    async fn test_unknown_model_event_is_skipped_not_fatal() {
        let known = Uuid::new_v4();
        let service = Arc::new(MockService::new().with_model(known, "door"));
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager_with(service, sink);
        let sender = manager.event_sender();

        // First event references a never-registered model; the second is
        // fine and must still be handled.
        sender.send(TrackingEvent::Added(located_args(
            Uuid::new_v4(),
            Uuid::new_v4(),
            0.0,
            0.5,
        )));
        let instance = Uuid::new_v4();
        sender.send(TrackingEvent::Added(located_args(known, instance, 0.0, 0.5)));
        manager.tick(Duration::from_millis(16));

        assert_eq!(manager.placement_count(), 1);
        assert!(manager.placement(instance).is_some());
    }

    #[tokio::test]
    async fn test_cycle_aborts_without_world_frame() {
        let model_id = Uuid::new_v4();
        let service = Arc::new(MockService::new().with_model(model_id, "door"));
        service.world_ready.store(false, Ordering::SeqCst);
        let sink = Arc::new(RecordingSink::default());
        let manager = manager_with(service.clone(), sink);

        let events = Arc::new(EventQueue::new());
        let submitted = run_detection_cycle(
            service.clone(),
            manager.query_registry(),
            events.clone(),
            &TrackingConfig::default(),
            TokioContext::shared(),
        )
        .await
        .unwrap();

        assert!(!submitted);
        assert_eq!(service.detect_count(), 0);
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_cycle_submits_batch_and_marks_attempt() {
        let model_id = Uuid::new_v4();
        let service = Arc::new(MockService::new().with_model(model_id, "door"));
        let sink = Arc::new(RecordingSink::default());
        let manager = manager_with(service.clone(), sink);

        let events = Arc::new(EventQueue::new());
        let submitted = run_detection_cycle(
            service.clone(),
            manager.query_registry(),
            events.clone(),
            &TrackingConfig::default(),
            TokioContext::shared(),
        )
        .await
        .unwrap();

        assert!(submitted);
        assert_eq!(service.detect_count(), 1);
        assert_eq!(events.drain(), vec![TrackingEvent::DetectionAttempted]);

        // The registry now holds the rebuilt query with one search area.
        let registry = manager.query_registry();
        let registry = registry.lock().unwrap();
        assert_eq!(registry[&model_id].search_areas.len(), 1);
    }

    #[tokio::test]
    async fn test_single_instance_mode_skips_tracked_models() {
        let model_id = Uuid::new_v4();
        let instance_id = Uuid::new_v4();
        let service = Arc::new(
            MockService::new()
                .with_model(model_id, "door")
                .with_result(located_args(model_id, instance_id, 1.0, 0.8)),
        );
        let sink = Arc::new(RecordingSink::default());
        let manager = manager_with(service.clone(), sink);

        let events = Arc::new(EventQueue::new());
        let submitted = run_detection_cycle(
            service.clone(),
            manager.query_registry(),
            events.clone(),
            &TrackingConfig::default(),
            TokioContext::shared(),
        )
        .await
        .unwrap();

        // The only model already has an instance: nothing to query, no
        // detect call, no attempt marker.
        assert!(!submitted);
        assert_eq!(service.detect_count(), 0);
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_multi_instance_mode_keeps_querying() {
        let model_id = Uuid::new_v4();
        let instance_id = Uuid::new_v4();
        let service = Arc::new(
            MockService::new()
                .with_model(model_id, "door")
                .with_result(located_args(model_id, instance_id, 1.0, 0.8)),
        );
        let sink = Arc::new(RecordingSink::default());
        let manager = manager_with(service.clone(), sink);

        let config = TrackingConfig {
            search_single_instance: false,
            ..Default::default()
        };
        let submitted = run_detection_cycle(
            service.clone(),
            manager.query_registry(),
            Arc::new(EventQueue::new()),
            &config,
            TokioContext::shared(),
        )
        .await
        .unwrap();

        assert!(submitted);
        assert_eq!(service.detect_count(), 1);
    }

    #[tokio::test]
    async fn test_culling_is_strictly_beyond_limit() {
        let model_id = Uuid::new_v4();
        let at_limit = Uuid::new_v4();
        let beyond = Uuid::new_v4();
        // far_distance 4.0 and factor 1.5: the cull boundary is 6.0m.
        let service = Arc::new(
            MockService::new()
                .with_model(model_id, "door")
                .with_result(located_args(model_id, at_limit, 6.0, 0.8))
                .with_result(located_args(model_id, beyond, 6.01, 0.8)),
        );
        let sink = Arc::new(RecordingSink::default());
        let manager = manager_with(service.clone(), sink);

        run_detection_cycle(
            service.clone(),
            manager.query_registry(),
            Arc::new(EventQueue::new()),
            &TrackingConfig::default(),
            TokioContext::shared(),
        )
        .await
        .unwrap();

        // Exactly at 1.5x far distance survives; strictly beyond is culled.
        assert_eq!(service.removed_ids(), vec![beyond]);
    }

    #[tokio::test]
    async fn test_detection_failure_releases_the_gate() {
        let model_id = Uuid::new_v4();
        let mut mock = MockService::new().with_model(model_id, "door");
        mock.fail_detection = true;
        let service = Arc::new(mock);
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager_with(service.clone(), sink);
        manager.start_search();

        assert!(manager.try_start_detection());
        // Second attempt while in flight must lose.
        assert!(!manager.try_start_detection());

        // The failing cycle still clears the flag.
        let gate = manager.detection_gate();
        for _ in 0..100 {
            if !gate.is_in_flight() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!gate.is_in_flight());
    }

    #[tokio::test]
    async fn test_shutdown_clears_state() {
        let model_id = Uuid::new_v4();
        let instance_id = Uuid::new_v4();
        let service = Arc::new(MockService::new().with_model(model_id, "door"));
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager_with(service, sink);
        let sender = manager.event_sender();

        sender.send(TrackingEvent::Added(located_args(
            model_id,
            instance_id,
            0.0,
            0.5,
        )));
        manager.tick(Duration::from_millis(16));
        assert_eq!(manager.placement_count(), 1);

        manager.shutdown().await;
        assert_eq!(manager.placement_count(), 0);
        assert!(manager.query_registry().lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_instance_removes_placement_and_service_instance() {
        let model_id = Uuid::new_v4();
        let instance_id = Uuid::new_v4();
        let service = Arc::new(MockService::new().with_model(model_id, "door"));
        let sink = Arc::new(RecordingSink::default());
        let mut manager = manager_with(service.clone(), sink);
        let sender = manager.event_sender();

        sender.send(TrackingEvent::Added(located_args(
            model_id,
            instance_id,
            0.0,
            0.5,
        )));
        manager.tick(Duration::from_millis(16));

        manager.reset_instance(model_id, instance_id);
        assert_eq!(manager.placement_count(), 0);
        assert_eq!(service.removed_ids(), vec![instance_id]);
    }

    #[tokio::test]
    async fn test_rebuilt_query_carries_observation_mode() {
        let model_id = Uuid::new_v4();
        let service = Arc::new(MockService::new().with_model(model_id, "door"));
        let sink = Arc::new(RecordingSink::default());
        let manager = manager_with(service.clone(), sink);

        let config = TrackingConfig {
            observation_mode: ObservationMode::ActivePassiveStereo,
            ..Default::default()
        };
        run_detection_cycle(
            service,
            manager.query_registry(),
            Arc::new(EventQueue::new()),
            &config,
            TokioContext::shared(),
        )
        .await
        .unwrap();

        let registry = manager.query_registry();
        let registry = registry.lock().unwrap();
        assert_eq!(
            registry[&model_id].observation_mode,
            ObservationMode::ActivePassiveStereo
        );
    }

    #[tokio::test]
    async fn test_removed_instance_is_queried_for_again() {
        let model_id = Uuid::new_v4();
        let instance_id = Uuid::new_v4();
        let service = Arc::new(
            MockService::new()
                .with_model(model_id, "door")
                .with_result(located_args(model_id, instance_id, 1.0, 0.8)),
        );
        let sink = Arc::new(RecordingSink::default());
        let manager = manager_with(service.clone(), sink);

        // While the instance is tracked, single-instance mode holds the
        // query back.
        let submitted = run_detection_cycle(
            service.clone(),
            manager.query_registry(),
            Arc::new(EventQueue::new()),
            &TrackingConfig::default(),
            TokioContext::shared(),
        )
        .await
        .unwrap();
        assert!(!submitted);
        assert_eq!(service.detect_count(), 0);

        // The instance goes away (removed or culled): the next cycle must
        // rebuild and submit a query for that model.
        service.results.lock().unwrap().clear();
        let submitted = run_detection_cycle(
            service.clone(),
            manager.query_registry(),
            Arc::new(EventQueue::new()),
            &TrackingConfig::default(),
            TokioContext::shared(),
        )
        .await
        .unwrap();
        assert!(submitted);
        assert_eq!(service.detect_count(), 1);
        let registry = manager.query_registry();
        let registry = registry.lock().unwrap();
        assert_eq!(registry[&model_id].search_areas.len(), 1);
    }
}
