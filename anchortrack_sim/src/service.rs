//! Scripted spatial-anchoring service.
//!
//! Answers detection queries by testing ground-truth objects against the
//! submitted search volumes, then raises Added/Updated/Removed events from
//! a spawned background thread - the same cross-thread path the real
//! service uses, so the engine's queue handoff is exercised for real.

use anchortrack_core::{EventSender, TrackingEvent};
use anchortrack_env::{
    AnchorService, EnvError, ObjectEventArgs, ObjectLocation, ObjectQuery, OrientedBox,
    SearchArea, TrackingMode, WorldFrame,
};
use async_trait::async_trait;
use nalgebra::{Isometry3, Point3, UnitQuaternion, Vector3};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// A registered model: display name plus model-space geometry.
#[derive(Debug, Clone)]
struct ModelInfo {
    name: String,
    bounding_box: OrientedBox,
    origin_to_center: Isometry3<f64>,
}

/// Mock anchoring service backed by a ground-truth object list.
pub struct SimAnchorService {
    models: Mutex<HashMap<Uuid, ModelInfo>>,
    /// Ground-truth objects detection can find.
    objects: Mutex<Vec<crate::oracle::SimObject>>,
    /// Instances currently tracked, as the service would report them.
    tracked: Mutex<HashMap<Uuid, ObjectEventArgs>>,
    sender: Mutex<Option<EventSender>>,
    camera: Mutex<ObjectLocation>,
    localized: AtomicBool,
    /// Virtual clock in milliseconds, advanced by the runner.
    clock_ms: AtomicU64,
}

impl SimAnchorService {
    pub fn new() -> Self {
        Self {
            models: Mutex::new(HashMap::new()),
            objects: Mutex::new(Vec::new()),
            tracked: Mutex::new(HashMap::new()),
            sender: Mutex::new(None),
            camera: Mutex::new(ObjectLocation::identity()),
            localized: AtomicBool::new(true),
            clock_ms: AtomicU64::new(0),
        }
    }

    /// Registers a model with a box of the given extents.
    pub fn register_model(&self, model_id: Uuid, name: &str, extents: Vector3<f64>) {
        self.models.lock().unwrap().insert(
            model_id,
            ModelInfo {
                name: name.to_string(),
                bounding_box: OrientedBox {
                    center: Point3::origin(),
                    extents,
                    orientation: UnitQuaternion::identity(),
                },
                origin_to_center: Isometry3::identity(),
            },
        );
    }

    /// Loads the ground-truth objects detection can discover.
    pub fn load_world(&self, objects: Vec<crate::oracle::SimObject>) {
        *self.objects.lock().unwrap() = objects;
    }

    /// Connects the engine's event queue.
    pub fn connect(&self, sender: EventSender) {
        *self.sender.lock().unwrap() = Some(sender);
    }

    /// Moves the simulated wearer.
    pub fn set_camera(&self, pose: ObjectLocation) {
        *self.camera.lock().unwrap() = pose;
    }

    /// Controls whether the world frame resolves (false simulates a
    /// not-yet-localized headset).
    pub fn set_localized(&self, localized: bool) {
        self.localized.store(localized, Ordering::SeqCst);
    }

    /// Advances the service's virtual clock.
    pub fn advance_clock(&self, dt: Duration) {
        self.clock_ms
            .fetch_add(dt.as_millis() as u64, Ordering::SeqCst);
    }

    fn now(&self) -> Duration {
        Duration::from_millis(self.clock_ms.load(Ordering::SeqCst))
    }

    /// Simulates the service's own background pose refinement: every
    /// tracked instance gets a coverage bump and an Updated event.
    pub fn refine_tracked(&self, coverage_step: f64) {
        let now = self.now();
        let mut to_emit = Vec::new();
        {
            let mut tracked = self.tracked.lock().unwrap();
            for args in tracked.values_mut() {
                args.surface_coverage = (args.surface_coverage + coverage_step).min(1.0);
                args.last_updated = now;
                to_emit.push(TrackingEvent::Updated(args.clone()));
            }
        }
        self.emit_from_worker(to_emit);
    }

    /// Count of instances the service currently tracks.
    pub fn tracked_count(&self) -> usize {
        self.tracked.lock().unwrap().len()
    }

    // Events are raised from a spawned thread to mirror the real service's
    // callback threading.
    fn emit_from_worker(&self, events: Vec<TrackingEvent>) {
        if events.is_empty() {
            return;
        }
        let Some(sender) = self.sender.lock().unwrap().clone() else {
            return;
        };
        std::thread::spawn(move || {
            for event in events {
                sender.send(event);
            }
        });
    }
}

impl Default for SimAnchorService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnchorService for SimAnchorService {
    fn model_ids(&self) -> Vec<Uuid> {
        self.models.lock().unwrap().keys().copied().collect()
    }

    fn model_name(&self, model_id: Uuid) -> Option<String> {
        self.models
            .lock()
            .unwrap()
            .get(&model_id)
            .map(|info| info.name.clone())
    }

    fn model_bounding_box(&self, model_id: Uuid) -> Option<OrientedBox> {
        self.models
            .lock()
            .unwrap()
            .get(&model_id)
            .map(|info| info.bounding_box)
    }

    fn model_origin_to_center_transform(&self, model_id: Uuid) -> Option<Isometry3<f64>> {
        self.models
            .lock()
            .unwrap()
            .get(&model_id)
            .map(|info| info.origin_to_center)
    }

    fn tracking_results(&self) -> Vec<ObjectEventArgs> {
        self.tracked.lock().unwrap().values().cloned().collect()
    }

    async fn detect_objects(&self, queries: &[ObjectQuery]) -> Result<(), EnvError> {
        let now = self.now();
        let mut to_emit = Vec::new();
        {
            let objects = self.objects.lock().unwrap();
            let mut tracked = self.tracked.lock().unwrap();

            for query in queries {
                for object in objects.iter().filter(|o| o.model_id == query.model_id) {
                    let visible = query
                        .search_areas
                        .iter()
                        .any(|area| contains(area, &object.location.position));
                    if !visible {
                        continue;
                    }

                    if let Some(existing) = tracked.get_mut(&object.instance_id) {
                        existing.location = Some(object.location);
                        existing.last_updated = now;
                        to_emit.push(TrackingEvent::Updated(existing.clone()));
                    } else if object.base_coverage >= query.min_surface_coverage {
                        let args = ObjectEventArgs {
                            model_id: object.model_id,
                            instance_id: object.instance_id,
                            location: Some(object.location),
                            surface_coverage: object.base_coverage,
                            scale_change: Vector3::new(1.0, 1.0, 1.0),
                            last_updated: now,
                            tracking_mode: TrackingMode::default(),
                        };
                        tracked.insert(object.instance_id, args.clone());
                        debug!(instance = %object.instance_id, "sim detection hit");
                        to_emit.push(TrackingEvent::Added(args));
                    }
                }
            }
        }
        self.emit_from_worker(to_emit);
        Ok(())
    }

    fn set_instance_tracking_mode(&self, instance_id: Uuid, mode: TrackingMode) {
        if let Some(args) = self.tracked.lock().unwrap().get_mut(&instance_id) {
            args.tracking_mode = mode;
        }
    }

    fn remove_instance(&self, instance_id: Uuid) {
        // Idempotent: removing an unknown instance is success.
        let removed = self.tracked.lock().unwrap().remove(&instance_id);
        if let Some(mut args) = removed {
            args.location = None;
            self.emit_from_worker(vec![TrackingEvent::Removed(args)]);
        }
    }

    fn world_frame(&self) -> Option<WorldFrame> {
        if self.localized.load(Ordering::SeqCst) {
            Some(WorldFrame::new())
        } else {
            None
        }
    }

    fn camera_pose(&self) -> ObjectLocation {
        *self.camera.lock().unwrap()
    }
}

/// Geometric containment of a point in a search volume.
pub fn contains(area: &SearchArea, point: &Point3<f64>) -> bool {
    match area {
        SearchArea::Box(bb) => {
            let local = bb.orientation.inverse() * (point - bb.center);
            local.x.abs() <= bb.extents.x * 0.5
                && local.y.abs() <= bb.extents.y * 0.5
                && local.z.abs() <= bb.extents.z * 0.5
        }
        SearchArea::Sphere(sphere) => (point - sphere.center).norm() <= sphere.radius,
        SearchArea::FieldOfView(fov) => {
            let local = fov.orientation.inverse() * (point - fov.position);
            if local.z <= 0.0 || local.z > fov.far_distance {
                return false;
            }
            let half_h = (fov.horizontal_fov_deg * 0.5).to_radians();
            let half_v = (fov.horizontal_fov_deg / fov.aspect_ratio * 0.5).to_radians();
            local.x.atan2(local.z).abs() <= half_h && local.y.atan2(local.z).abs() <= half_v
        }
    }
}
