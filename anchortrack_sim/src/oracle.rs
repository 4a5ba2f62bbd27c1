//! Ground-truth world state for simulation runs.

use anchortrack_env::ObjectLocation;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

/// One physical object placed in the simulated room.
#[derive(Debug, Clone)]
pub struct SimObject {
    pub model_id: Uuid,
    pub instance_id: Uuid,
    pub location: ObjectLocation,
    /// Surface coverage the service reports when it first detects this
    /// object.
    pub base_coverage: f64,
}

/// Seeded ground truth: where the physical objects actually are.
///
/// All entropy comes from the seed, so a failing run can be replayed
/// exactly by its seed number.
pub struct WorldOracle {
    rng: ChaCha8Rng,
    objects: Vec<SimObject>,
}

impl WorldOracle {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            objects: Vec::new(),
        }
    }

    /// Places one object of the given model, facing a deterministic random
    /// yaw.
    pub fn spawn_object(&mut self, model_id: Uuid, position: Point3<f64>, base_coverage: f64) {
        let yaw = self.rng.gen_range(0.0..std::f64::consts::TAU);
        let instance_id = Uuid::from_bytes(self.rng.gen::<[u8; 16]>());
        self.objects.push(SimObject {
            model_id,
            instance_id,
            location: ObjectLocation::new(
                position,
                UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw),
            ),
            base_coverage,
        });
    }

    /// Perturbs every object's position by up to `magnitude` meters per
    /// axis, simulating re-detection noise.
    pub fn jitter(&mut self, magnitude: f64) {
        for object in &mut self.objects {
            let delta = Vector3::new(
                self.rng.gen_range(-magnitude..=magnitude),
                self.rng.gen_range(-magnitude..=magnitude),
                self.rng.gen_range(-magnitude..=magnitude),
            );
            object.location.position += delta;
        }
    }

    pub fn objects(&self) -> &[SimObject] {
        &self.objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_world() {
        let model_id = Uuid::new_v4();
        let mut a = WorldOracle::new(7);
        let mut b = WorldOracle::new(7);
        a.spawn_object(model_id, Point3::new(0.0, 0.0, 2.0), 0.8);
        b.spawn_object(model_id, Point3::new(0.0, 0.0, 2.0), 0.8);

        assert_eq!(a.objects()[0].instance_id, b.objects()[0].instance_id);
        assert_eq!(
            a.objects()[0].location.orientation,
            b.objects()[0].location.orientation
        );
    }

    #[test]
    fn test_jitter_moves_objects_within_bounds() {
        let mut oracle = WorldOracle::new(3);
        oracle.spawn_object(Uuid::new_v4(), Point3::new(1.0, 0.0, 2.0), 0.8);
        let before = oracle.objects()[0].location.position;

        oracle.jitter(0.05);
        let after = oracle.objects()[0].location.position;
        assert!((after - before).norm() <= (3.0_f64).sqrt() * 0.05 + 1e-12);
    }
}
