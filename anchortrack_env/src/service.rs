//! Spatial-anchoring service abstraction.

use crate::error::EnvError;
use crate::types::{
    ObjectEventArgs, ObjectLocation, ObjectQuery, OrientedBox, TrackingMode, WorldFrame,
};
use async_trait::async_trait;
use nalgebra::Isometry3;
use uuid::Uuid;

/// The spatial-anchoring collaborator.
///
/// # Implementations
///
/// - **Production**: wraps the device's object-anchoring runtime
/// - **Simulation**: scripted mock answering queries from a ground-truth world
///
/// # Event flow
///
/// ```text
/// Engine                        Service                  worker threads
///   |-- detect_objects(q) ------->|                          |
///   |        Ok(())               |-- [matching] ----------->|
///   |                             |                          |-- Added/Updated/Removed
///   |                             |                          |   (pushed into the
///   |                             |                          |    engine's event queue)
/// ```
///
/// `detect_objects` resolving successfully only means the batch was accepted;
/// results surface later as events raised on arbitrary threads.
#[async_trait]
pub trait AnchorService: Send + Sync + 'static {
    /// All registered model identifiers.
    fn model_ids(&self) -> Vec<Uuid>;

    /// Display name for a registered model, if one was configured.
    fn model_name(&self, model_id: Uuid) -> Option<String>;

    /// Model-space bounding box. Present for every registered model.
    fn model_bounding_box(&self, model_id: Uuid) -> Option<OrientedBox>;

    /// Rigid transform from the model's mesh origin to its bounding-box
    /// center, used to align visualization meshes.
    fn model_origin_to_center_transform(&self, model_id: Uuid) -> Option<Isometry3<f64>>;

    /// Snapshot of all instances the service currently tracks.
    fn tracking_results(&self) -> Vec<ObjectEventArgs>;

    /// Submits one batched round of detection queries.
    ///
    /// Results do not come back here - they arrive later through the event
    /// path. An `Err` means the batch was rejected outright.
    async fn detect_objects(&self, queries: &[ObjectQuery]) -> Result<(), EnvError>;

    /// Sets the pose-refinement mode for a tracked instance.
    fn set_instance_tracking_mode(&self, instance_id: Uuid, mode: TrackingMode);

    /// Stops tracking an instance. Idempotent: removing an instance that is
    /// already gone is success, not an error.
    fn remove_instance(&self, instance_id: Uuid);

    /// The world coordinate frame, or `None` if the device has not
    /// localized yet.
    fn world_frame(&self) -> Option<WorldFrame>;

    /// Current head/camera pose in world coordinates.
    fn camera_pose(&self) -> ObjectLocation;
}
