//! Time-based pose interpolation for hologram placement.
//!
//! Detection refinements arrive in discrete jumps; applying them directly
//! makes holograms snap around. `SmoothTransform` eases a placement from
//! wherever it currently is toward each new target over a fixed duration.
//! Retargeting mid-flight never jumps: the interpolation restarts from the
//! current interpolated state, not from the previous start or target.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Monotone easing curve evaluated on normalized elapsed time in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Easing {
    Linear,
    /// Smoothstep: slow start, slow stop. The default.
    EaseInOut,
}

impl Easing {
    /// Evaluates the curve at `t` in [0, 1]. Endpoints map exactly:
    /// `evaluate(0) == 0` and `evaluate(1) == 1`.
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInOut => t * t * (3.0 - 2.0 * t),
        }
    }
}

impl Default for Easing {
    fn default() -> Self {
        Self::EaseInOut
    }
}

/// Interpolates position, rotation, and scale toward assigned targets.
///
/// Call the `set_*` methods instead of mutating the output directly.
/// Non-instantaneous calls snapshot the current interpolated state as the
/// new start and reset elapsed time; instantaneous calls teleport start and
/// target to the value, canceling any in-progress interpolation for that
/// channel.
#[derive(Debug, Clone)]
pub struct SmoothTransform {
    duration: f64,
    easing: Easing,
    elapsed: f64,

    start_position: Point3<f64>,
    target_position: Point3<f64>,
    current_position: Point3<f64>,

    start_rotation: UnitQuaternion<f64>,
    target_rotation: UnitQuaternion<f64>,
    current_rotation: UnitQuaternion<f64>,

    start_scale: Vector3<f64>,
    target_scale: Vector3<f64>,
    current_scale: Vector3<f64>,
}

impl SmoothTransform {
    pub fn new(duration: Duration, easing: Easing) -> Self {
        let duration = duration.as_secs_f64();
        Self {
            duration,
            easing,
            // Start settled: no interpolation until the first retarget.
            elapsed: duration,
            start_position: Point3::origin(),
            target_position: Point3::origin(),
            current_position: Point3::origin(),
            start_rotation: UnitQuaternion::identity(),
            target_rotation: UnitQuaternion::identity(),
            current_rotation: UnitQuaternion::identity(),
            start_scale: Vector3::new(1.0, 1.0, 1.0),
            target_scale: Vector3::new(1.0, 1.0, 1.0),
            current_scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Sets a new target position.
    pub fn set_position(&mut self, position: Point3<f64>, instantaneous: bool) {
        if instantaneous {
            self.start_position = position;
            self.target_position = position;
            self.current_position = position;
        } else {
            self.restart_from_current();
            self.target_position = position;
        }
    }

    /// Sets a new target rotation.
    pub fn set_rotation(&mut self, rotation: UnitQuaternion<f64>, instantaneous: bool) {
        if instantaneous {
            self.start_rotation = rotation;
            self.target_rotation = rotation;
            self.current_rotation = rotation;
        } else {
            self.restart_from_current();
            self.target_rotation = rotation;
        }
    }

    /// Sets a new target scale.
    pub fn set_scale(&mut self, scale: Vector3<f64>, instantaneous: bool) {
        if instantaneous {
            self.start_scale = scale;
            self.target_scale = scale;
            self.current_scale = scale;
        } else {
            self.restart_from_current();
            self.target_scale = scale;
        }
    }

    /// Advances the interpolation by one frame delta.
    pub fn update(&mut self, dt: Duration) {
        if self.elapsed >= self.duration {
            return;
        }

        self.elapsed = (self.elapsed + dt.as_secs_f64()).clamp(0.0, self.duration);

        // Settled: land on the target exactly, with no lerp rounding.
        if self.elapsed >= self.duration {
            self.current_position = self.target_position;
            self.current_rotation = self.target_rotation;
            self.current_scale = self.target_scale;
            return;
        }

        let t = self.easing.evaluate(self.elapsed / self.duration);
        self.current_position =
            self.start_position + (self.target_position - self.start_position) * t;
        self.current_rotation = self
            .start_rotation
            .try_slerp(&self.target_rotation, t, 1e-9)
            .unwrap_or(self.target_rotation);
        self.current_scale = self.start_scale.lerp(&self.target_scale, t);
    }

    /// Current interpolated position.
    pub fn position(&self) -> Point3<f64> {
        self.current_position
    }

    /// Current interpolated rotation.
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.current_rotation
    }

    /// Current interpolated scale.
    pub fn scale(&self) -> Vector3<f64> {
        self.current_scale
    }

    /// True while an interpolation is still in progress.
    pub fn is_settling(&self) -> bool {
        self.elapsed < self.duration
    }

    // Retargeting restarts all channels from their current interpolated
    // state so the output path stays continuous.
    fn restart_from_current(&mut self) {
        self.elapsed = 0.0;
        self.start_position = self.current_position;
        self.start_rotation = self.current_rotation;
        self.start_scale = self.current_scale;
    }
}
