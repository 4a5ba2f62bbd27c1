//! Per-instance visual binding and the update-suppression heuristic.
//!
//! Every `Updated` event carries a fresh pose, but most of them are noise:
//! millimeter drifts and sub-degree wobbles that would make a hologram
//! shimmer if applied. [`evaluate_update`] decides, in a fixed priority
//! order, whether an incoming state is worth re-rendering; the winning
//! reason is kept for diagnostics.

use crate::config::TrackingConfig;
use crate::smoothing::{Easing, SmoothTransform};
use anchortrack_env::{ObjectEventArgs, OrientedBox};
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use std::fmt;
use uuid::Uuid;

/// Snapshot of the last applied state for one model, used to judge whether
/// the next update is visually significant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceState {
    pub position: Option<Point3<f64>>,
    pub rotation: Option<UnitQuaternion<f64>>,
    pub surface_coverage: f64,
}

impl InstanceState {
    /// Captures the comparable parts of an event payload.
    pub fn from_args(args: &ObjectEventArgs) -> Self {
        Self {
            position: args.location.map(|loc| loc.position),
            rotation: args.location.map(|loc| loc.orientation),
            surface_coverage: args.surface_coverage,
        }
    }
}

/// Outcome of the update-suppression heuristic. The first matching reason
/// wins; `should_update` tells whether the placement is re-rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateDecision {
    /// No placement exists yet (or replacement was forced): apply the pose
    /// instantaneously so the object does not fly in from its old location.
    New,
    /// Previous or current pose is absent; nothing to compare against.
    MissingPose,
    /// Tracking confidence strictly improved.
    BetterCoverage,
    /// Position moved farther than the configured threshold (meters).
    PositionChanged(f64),
    /// Rotation moved farther than the configured threshold (degrees).
    RotationChanged(f64),
    /// Below every threshold: suppress to avoid micro-jitter.
    Unchanged,
}

impl UpdateDecision {
    pub fn should_update(&self) -> bool {
        matches!(
            self,
            UpdateDecision::New
                | UpdateDecision::BetterCoverage
                | UpdateDecision::PositionChanged(_)
                | UpdateDecision::RotationChanged(_)
        )
    }
}

impl fmt::Display for UpdateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateDecision::New => write!(f, "new"),
            UpdateDecision::MissingPose => write!(f, "did not update due to missing pose"),
            UpdateDecision::BetterCoverage => write!(f, "surface coverage improved"),
            UpdateDecision::PositionChanged(d) => write!(f, "position change: {d:.4}m"),
            UpdateDecision::RotationChanged(d) => write!(f, "rotation change: {d:.2}deg"),
            UpdateDecision::Unchanged => write!(f, "no update necessary"),
        }
    }
}

/// Decides whether `cur` differs enough from `prev` to re-render.
///
/// Priority order: missing pose suppresses, better coverage always wins,
/// then position delta, then shortest-arc rotation delta. All comparisons
/// are strict `>`: a delta exactly at a threshold does not trigger.
pub fn evaluate_update(
    prev: &InstanceState,
    cur: &InstanceState,
    config: &TrackingConfig,
) -> UpdateDecision {
    let (Some(prev_pos), Some(cur_pos), Some(prev_rot), Some(cur_rot)) =
        (prev.position, cur.position, prev.rotation, cur.rotation)
    else {
        return UpdateDecision::MissingPose;
    };

    if cur.surface_coverage > prev.surface_coverage {
        return UpdateDecision::BetterCoverage;
    }

    let position_change = (cur_pos - prev_pos).norm();
    if position_change > config.position_change_threshold {
        return UpdateDecision::PositionChanged(position_change);
    }

    let rotation_change = prev_rot.angle_to(&cur_rot).to_degrees();
    if rotation_change > config.rotation_change_threshold_deg {
        return UpdateDecision::RotationChanged(rotation_change);
    }

    UpdateDecision::Unchanged
}

/// The renderable binding between one tracked instance and its hologram.
///
/// Owns the smoothing target the render loop reads every frame, the
/// wireframe bounding box scaled by the detected scale change, and the
/// local transform aligning the model mesh to its bounding-box center.
#[derive(Debug, Clone)]
pub struct Placement {
    pub model_id: Uuid,
    pub instance_id: Uuid,
    pub display_name: String,
    pub transform: SmoothTransform,
    /// Wireframe box in model space, extents scaled by the detected
    /// per-axis scale change.
    pub wireframe: OrientedBox,
    /// Local transform from mesh origin to bounding-box center.
    pub model_origin: Isometry3<f64>,
    /// Best surface coverage seen so far for this instance.
    pub surface_coverage: f64,
}

impl Placement {
    pub fn new(
        model_id: Uuid,
        instance_id: Uuid,
        display_name: String,
        model_box: OrientedBox,
        origin_to_center: Isometry3<f64>,
        config: &TrackingConfig,
    ) -> Self {
        Self {
            model_id,
            instance_id,
            display_name,
            transform: SmoothTransform::new(config.smoothing_time, Easing::EaseInOut),
            wireframe: model_box,
            model_origin: align_model_origin(&origin_to_center),
            surface_coverage: 0.0,
        }
    }

    /// Applies a detection pose. New placements teleport; refinements of an
    /// already-visible object ease over the smoothing duration.
    pub fn apply_pose(
        &mut self,
        position: Point3<f64>,
        rotation: UnitQuaternion<f64>,
        instantaneous: bool,
    ) {
        self.transform.set_position(position, instantaneous);
        self.transform.set_rotation(rotation, instantaneous);
    }

    /// Rescales the wireframe to the detected scale change and records the
    /// best coverage seen for this instance.
    pub fn refresh_wireframe(&mut self, model_box: &OrientedBox, args: &ObjectEventArgs) {
        self.wireframe = OrientedBox {
            center: model_box.center,
            extents: model_box.extents.component_mul(&args.scale_change),
            orientation: model_box.orientation,
        };
        if args.surface_coverage > self.surface_coverage {
            self.surface_coverage = args.surface_coverage;
        }
    }
}

// Meshes are authored facing the opposite direction from the service's
// detection frame, so the origin alignment carries a 180-degree yaw flip.
fn align_model_origin(origin_to_center: &Isometry3<f64>) -> Isometry3<f64> {
    let flip = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::PI);
    Isometry3::from_parts(
        Translation3::from(origin_to_center.translation.vector),
        origin_to_center.rotation * flip,
    )
}
