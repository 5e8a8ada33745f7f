// Exponential-map discretization of a continuous chassis velocity.
//
// A chassis that translates and rotates simultaneously follows an arc, not a
// straight line. Commanding the continuous velocity directly for a whole
// timestep therefore drifts off the intended path. Discretization computes
// the constant per-step velocity whose straight-line integration lands on
// the pose the true curved motion would reach: the log map of the desired
// pose delta, divided by the timestep.

use super::desaturate::EPSILON;
use super::types::ChassisVelocity;

/// Convert a continuous-time chassis velocity into the constant velocity to
/// hold for one timestep of `dt` seconds so that the step reproduces the
/// true curved displacement.
pub fn discretize(velocity: &ChassisVelocity, dt: f64) -> ChassisVelocity {
    let dtheta = velocity.omega * dt;
    let half_dtheta = dtheta / 2.0;

    let cos_minus_one = dtheta.cos() - 1.0;
    let half_dtheta_by_tan = if cos_minus_one.abs() < EPSILON {
        // Small-angle expansion of (dtheta / 2) / tan(dtheta / 2)
        1.0 - 1.0 / 12.0 * dtheta * dtheta
    } else {
        -(half_dtheta * dtheta.sin()) / cos_minus_one
    };

    ChassisVelocity {
        vx: half_dtheta_by_tan * velocity.vx + half_dtheta * velocity.vy,
        vy: -half_dtheta * velocity.vx + half_dtheta_by_tan * velocity.vy,
        omega: velocity.omega,
    }
}

/// Inverse of [`discretize`]: integrate the per-step velocity through the
/// planar exponential map and recover the continuous velocity it encodes.
/// Verification helper only.
#[cfg(test)]
pub(crate) fn undiscretize(velocity: &ChassisVelocity, dt: f64) -> ChassisVelocity {
    let dtheta = velocity.omega * dt;

    let (sin_by_theta, one_minus_cos_by_theta) = if dtheta.abs() < EPSILON {
        (1.0 - 1.0 / 6.0 * dtheta * dtheta, 0.5 * dtheta)
    } else {
        (dtheta.sin() / dtheta, (1.0 - dtheta.cos()) / dtheta)
    };

    ChassisVelocity {
        vx: velocity.vx * sin_by_theta - velocity.vy * one_minus_cos_by_theta,
        vy: velocity.vx * one_minus_cos_by_theta + velocity.vy * sin_by_theta,
        omega: velocity.omega,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rotation_is_identity() {
        let v = ChassisVelocity::new(1.5, -0.25, 0.0);
        let out = discretize(&v, 0.02);
        assert_eq!(out, v);
    }

    #[test]
    fn test_pure_rotation_is_identity() {
        let v = ChassisVelocity::new(0.0, 0.0, 3.0);
        let out = discretize(&v, 0.02);
        assert!((out.vx).abs() < 1e-12);
        assert!((out.vy).abs() < 1e-12);
        assert_eq!(out.omega, 3.0);
    }

    #[test]
    fn test_round_trip() {
        let v = ChassisVelocity::new(2.0, -1.0, 4.0);
        let dt = 0.02;
        let back = undiscretize(&discretize(&v, dt), dt);
        assert!((back.vx - v.vx).abs() < 1e-9, "vx: {} vs {}", back.vx, v.vx);
        assert!((back.vy - v.vy).abs() < 1e-9, "vy: {} vs {}", back.vy, v.vy);
        assert!((back.omega - v.omega).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_large_rotation() {
        // Three radians of rotation per step still inverts cleanly
        let v = ChassisVelocity::new(1.0, 2.0, 150.0);
        let dt = 0.02;
        let back = undiscretize(&discretize(&v, dt), dt);
        assert!((back.vx - v.vx).abs() < 1e-9);
        assert!((back.vy - v.vy).abs() < 1e-9);
    }

    #[test]
    fn test_curved_motion_shifts_translation() {
        // Rotating while translating forward requires a lateral correction
        let v = ChassisVelocity::new(1.0, 0.0, 10.0);
        let out = discretize(&v, 0.02);
        assert!(out.vy.abs() > 1e-6, "expected lateral component, got {}", out.vy);
        assert_eq!(out.omega, v.omega);
    }
}
