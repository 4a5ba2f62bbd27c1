//! Common types shared between the tracking engine and its collaborators.
//!
//! Coordinate conventions: Y is up, a pose's forward axis is local +Z.
//! All lengths are meters, all angles in the public API are degrees.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A rigid pose reported by the spatial-anchoring service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub position: Point3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl ObjectLocation {
    pub fn new(position: Point3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Identity pose at the origin.
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            orientation: UnitQuaternion::identity(),
        }
    }

    /// World-space forward axis (local +Z rotated by the orientation).
    pub fn forward(&self) -> Vector3<f64> {
        self.orientation * Vector3::z()
    }
}

/// An oriented bounding box. Used both for model-space geometry and for
/// box-shaped search volumes.
///
/// `extents` is the full size along each local axis, matching what the
/// anchoring service reports for model bounding boxes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientedBox {
    pub center: Point3<f64>,
    pub extents: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

/// A camera-aligned search frustum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldOfView {
    pub position: Point3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub far_distance: f64,
    pub horizontal_fov_deg: f64,
    /// Horizontal / vertical aspect ratio.
    pub aspect_ratio: f64,
}

/// A spherical search volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Point3<f64>,
    pub radius: f64,
}

/// One region of space the service is asked to search for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SearchArea {
    Box(OrientedBox),
    FieldOfView(FieldOfView),
    Sphere(Sphere),
}

/// A detection query for one model. Rebuilt every detection cycle; there is
/// at most one active query per model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectQuery {
    pub model_id: Uuid,
    pub search_areas: Vec<SearchArea>,
    /// Fraction of the model surface that must be matched for a detection.
    pub min_surface_coverage: f64,
    /// Maximum expected deviation from vertical orientation, in degrees.
    pub expected_max_vertical_orientation_deg: f64,
    /// Sensor strategy the service should use while answering this query.
    pub observation_mode: ObservationMode,
}

/// How aggressively the service refines an instance's pose after detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingMode {
    LowLatencyCoarsePosition,
    HighLatencyAccuratePosition,
    Paused,
}

impl Default for TrackingMode {
    fn default() -> Self {
        Self::LowLatencyCoarsePosition
    }
}

/// What sensor data the service uses while observing the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservationMode {
    Ambient,
    ActivePassiveStereo,
}

impl Default for ObservationMode {
    fn default() -> Self {
        Self::Ambient
    }
}

/// Payload of an `Added` / `Updated` / `Removed` event.
///
/// `location` is `None` when the instance has lost tracking - consumers must
/// treat the pose as unknown, not stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEventArgs {
    pub model_id: Uuid,
    pub instance_id: Uuid,
    pub location: Option<ObjectLocation>,
    /// Confidence in [0, 1]: fraction of the model surface matched.
    pub surface_coverage: f64,
    /// Per-axis scale deviation between the model and the physical object.
    pub scale_change: Vector3<f64>,
    /// Service-side timestamp of the last state change.
    pub last_updated: Duration,
    pub tracking_mode: TrackingMode,
}

/// Opaque proof that the world coordinate frame is currently resolvable.
///
/// Early in a session the headset may not have localized yet; detection
/// cycles abort silently until the service can hand one of these out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldFrame(());

impl WorldFrame {
    pub fn new() -> Self {
        Self(())
    }
}

impl Default for WorldFrame {
    fn default() -> Self {
        Self::new()
    }
}
