//! Runtime configuration for the tracking engine.

use anchortrack_env::{ObservationMode, TrackingMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shape of the search volume built for each model every detection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchAreaKind {
    Box,
    FieldOfView,
    Sphere,
}

/// Configuration for the TrackingManager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Far distance in meters of the object search frustum (default: 4.0)
    pub far_distance: f64,

    /// Horizontal field of view in degrees of the search frustum (default: 75.0)
    pub horizontal_fov_deg: f64,

    /// Aspect ratio (horizontal / vertical) of the search frustum (default: 1.0)
    pub aspect_ratio: f64,

    /// Scale on model size used to deduce the search area (default: 2.0)
    pub search_area_scale: f64,

    /// Search area shape (default: Box)
    pub search_area_shape: SearchAreaKind,

    /// Observation mode passed through to the service (default: Ambient)
    pub observation_mode: ObservationMode,

    /// Search for a single instance per model vs. multiple (default: true)
    pub search_single_instance: bool,

    /// Fraction of the model surface that must match for a detection
    /// (default: 0.5)
    pub min_surface_coverage: f64,

    /// Maximum expected deviation from vertical orientation in degrees
    /// (default: 0.0)
    pub max_vertical_orientation_deg: f64,

    /// Minimum position delta in meters to count as a real move
    /// (default: 0.1)
    pub position_change_threshold: f64,

    /// Minimum rotation delta in degrees to count as a real turn
    /// (default: 5.0)
    pub rotation_change_threshold_deg: f64,

    /// Tracking mode assigned to newly added instances
    pub tracking_mode: TrackingMode,

    /// Duration of the smooth pose transition (default: 666ms)
    pub smoothing_time: Duration,

    /// Pause inside a detection cycle that found nothing to query
    /// (default: 100ms)
    pub idle_throttle: Duration,

    /// Instances farther than this multiple of `far_distance` from the
    /// camera are culled (default: 1.5)
    pub cull_distance_factor: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            far_distance: 4.0,
            horizontal_fov_deg: 75.0,
            aspect_ratio: 1.0,
            search_area_scale: 2.0,
            search_area_shape: SearchAreaKind::Box,
            observation_mode: ObservationMode::Ambient,
            search_single_instance: true,
            min_surface_coverage: 0.5,
            max_vertical_orientation_deg: 0.0,
            position_change_threshold: 0.1,
            rotation_change_threshold_deg: 5.0,
            tracking_mode: TrackingMode::LowLatencyCoarsePosition,
            smoothing_time: Duration::from_millis(666),
            idle_throttle: Duration::from_millis(100),
            cull_distance_factor: 1.5,
        }
    }
}

impl TrackingConfig {
    /// Distance beyond which a tracked instance is culled.
    pub fn cull_distance(&self) -> f64 {
        self.far_distance * self.cull_distance_factor
    }
}
