//! Search-volume construction for detection queries.
//!
//! Volumes are pure functions of the camera pose, the model's bounding box,
//! and configuration. They are rebuilt from scratch every cycle: model
//! geometry is static but the camera never is, so caching would only cache
//! staleness.

use crate::config::{SearchAreaKind, TrackingConfig};
use anchortrack_env::{FieldOfView, ObjectLocation, ObjectQuery, OrientedBox, SearchArea, Sphere};
use nalgebra::{UnitQuaternion, Vector3};
use uuid::Uuid;

/// Point the search around: half the far distance along the camera's
/// forward axis, oriented by yaw only.
///
/// Zeroing pitch and roll keeps search volumes level regardless of head
/// tilt - a technician looking down at a label should not tip the search
/// box into the floor.
pub fn estimated_target(camera: &ObjectLocation, far_distance: f64) -> ObjectLocation {
    let forward = camera.forward();
    ObjectLocation {
        position: camera.position + forward * (far_distance * 0.5),
        orientation: yaw_only(&camera.orientation),
    }
}

/// Projects an orientation onto the horizontal plane, keeping only the
/// rotation about the up axis. Falls back to identity when the forward
/// axis is vertical and yaw is undefined.
pub fn yaw_only(orientation: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
    let forward = orientation * Vector3::z();
    let flat = Vector3::new(forward.x, 0.0, forward.z);
    if flat.norm() < 1e-9 {
        return UnitQuaternion::identity();
    }
    let yaw = forward.x.atan2(forward.z);
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw)
}

/// Builds the search area for one model this cycle.
///
/// - `Box`: sized from the model's horizontal diagonal and height, centered
///   on the estimated target with its yaw-only orientation;
/// - `FieldOfView`: the camera's own frustum;
/// - `Sphere`: centered on the target, radius from the model diagonal.
pub fn build_search_area(
    camera: &ObjectLocation,
    target: &ObjectLocation,
    model_box: &OrientedBox,
    config: &TrackingConfig,
) -> SearchArea {
    match config.search_area_shape {
        SearchAreaKind::Box => {
            // Extents.z is the model's height; the horizontal footprint is
            // the XY diagonal.
            let horizontal = (model_box.extents.x.powi(2) + model_box.extents.y.powi(2)).sqrt();
            SearchArea::Box(OrientedBox {
                center: target.position,
                orientation: target.orientation,
                extents: Vector3::new(
                    horizontal * config.search_area_scale,
                    model_box.extents.z * config.search_area_scale,
                    horizontal * config.search_area_scale,
                ),
            })
        }
        SearchAreaKind::FieldOfView => SearchArea::FieldOfView(FieldOfView {
            position: camera.position,
            orientation: camera.orientation,
            far_distance: config.far_distance,
            horizontal_fov_deg: config.horizontal_fov_deg,
            aspect_ratio: config.aspect_ratio,
        }),
        SearchAreaKind::Sphere => SearchArea::Sphere(Sphere {
            center: target.position,
            radius: model_box.extents.norm() * 0.5 * config.search_area_scale,
        }),
    }
}

/// Assembles the full query for one model this cycle.
pub fn build_query(
    model_id: Uuid,
    camera: &ObjectLocation,
    target: &ObjectLocation,
    model_box: &OrientedBox,
    config: &TrackingConfig,
) -> ObjectQuery {
    ObjectQuery {
        model_id,
        search_areas: vec![build_search_area(camera, target, model_box, config)],
        min_surface_coverage: config.min_surface_coverage,
        expected_max_vertical_orientation_deg: config.max_vertical_orientation_deg,
        observation_mode: config.observation_mode,
    }
}
