// Curvature-aware desaturation of a chassis velocity command.
//
// Scaling a command down so that no module exceeds its top speed is not the
// simple proportional clamp it is for a straight-line model: the discretized
// translation depends on the rotation angle covered during the step, so a
// module's speed is a nonlinear function of the scale factor. Worse, it is
// not monotonic. Shrinking the command can *increase* a module's speed when
// the discretized translation swings into alignment with the module's
// rotational velocity. The solver below therefore finds, per module, the
// largest scale at which that module is back inside its limit, and the outer
// scan re-verifies every other module whenever the bound moves.

use tracing::trace;

use super::discretize::discretize;
use super::types::{ChassisVelocity, ModuleOffset};

/// Tolerance for all "is this zero" decisions and the initial secant step.
pub(crate) const EPSILON: f64 = 1e-9;

fn is_zero(x: f64) -> bool {
    x.abs() < EPSILON
}

/// Rejected degenerate inputs.
///
/// The numeric core assumes well-formed inputs; anything below would drive
/// the solver into non-finite arithmetic, so it is refused up front.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KinematicsError {
    #[error("module set is empty")]
    NoModules,

    #[error("max module speed must be positive and finite, got {0}")]
    InvalidMaxSpeed(f64),

    #[error("timestep must be positive and finite, got {0} s")]
    InvalidTimestep(f64),

    #[error("chassis velocity has a non-finite component: ({vx}, {vy}, {omega})")]
    NonFiniteCommand { vx: f64, vy: f64, omega: f64 },
}

/// Signed squared-speed excess of one module at scale `k`.
///
/// Positive means the module exceeds `v_max` when the command is scaled by
/// `k` and discretized over `dt`. Continuous in `k`, but not monotonic.
fn module_error(
    command: &ChassisVelocity,
    dt: f64,
    v_max: f64,
    px: f64,
    py: f64,
    k: f64,
) -> f64 {
    // Half the rotation angle covered during the scaled step
    let half_dtheta = command.omega * dt / 2.0 * k;
    let half_dtheta_by_tan = if !is_zero(half_dtheta) {
        half_dtheta / half_dtheta.tan()
    } else {
        let half_dtheta_sq = half_dtheta * half_dtheta;
        1.0 - 1.0 / 3.0 * half_dtheta_sq - 1.0 / 45.0 * half_dtheta_sq * half_dtheta_sq
    };

    // Average body-frame velocity over the step (the discretized command)
    let v_chassis_x = half_dtheta_by_tan * k * command.vx + half_dtheta * k * command.vy;
    let v_chassis_y = -half_dtheta * k * command.vx + half_dtheta_by_tan * k * command.vy;
    let omega_chassis = k * command.omega;

    let v_module_x = v_chassis_x - omega_chassis * py;
    let v_module_y = v_chassis_y + omega_chassis * px;

    (v_module_x * v_module_x + v_module_y * v_module_y) - v_max * v_max
}

/// Largest scale `k' <= k` at which the module is back at its speed limit.
///
/// Caller guarantees `error(k) > 0`. Phase one walks a damped secant down
/// from `k` until the error crosses zero or vanishes; phase two tightens a
/// genuine sign-change bracket with false position until the error is zero
/// within tolerance.
fn solve_max_scale(
    command: &ChassisVelocity,
    dt: f64,
    v_max: f64,
    px: f64,
    py: f64,
    k_start: f64,
    y_start: f64,
) -> f64 {
    let mut k_prev = k_start;
    let mut y_prev = y_start;
    let mut k = k_prev - EPSILON;
    let mut y = module_error(command, dt, v_max, px, py, k);

    while !is_zero(y) && y > 0.0 {
        let secant = (y - y_prev) / (k - k_prev);
        let k_new = if is_zero(secant) || secant < 0.0 {
            // Flat or reversed slope: any root with positive slope lies
            // between the current k and 0, so halve
            0.5 * k
        } else {
            let estimate = k - y / secant;
            if estimate < 0.5 * k { 0.5 * k } else { estimate }
        };
        k_prev = k;
        y_prev = y;
        k = k_new;
        y = module_error(command, dt, v_max, px, py, k);
    }

    if !is_zero(y) {
        // Sign change: (k, y) is negative, (k_prev, y_prev) positive
        let mut k_neg = k;
        let mut y_neg = y;
        let mut k_pos = k_prev;
        let mut y_pos = y_prev;

        loop {
            let k_new = (k_neg * y_pos - k_pos * y_neg) / (y_pos - y_neg);
            let y_new = module_error(command, dt, v_max, px, py, k_new);
            if is_zero(y_new) {
                k = k_new;
                break;
            }
            if y_new < 0.0 {
                k_neg = k_new;
                y_neg = y_new;
            } else {
                k_pos = k_new;
                y_pos = y_new;
            }
        }
    }

    k
}

/// Discretize a chassis velocity command while keeping every module of the
/// drivetrain within `v_max`.
///
/// Scans the modules cyclically against a shrinking scale bound. A module
/// already inside its limit at the current bound is merely verified; a
/// violating module gets the bound lowered to its largest admissible scale.
/// Because lowering the bound can push a previously verified module back
/// over its limit, the verification lap restarts after every reduction and
/// the scan only terminates once a full uninterrupted lap confirms all
/// modules. The converged scale is then applied and the result discretized.
pub fn desaturated_discretize(
    command: &ChassisVelocity,
    dt: f64,
    v_max: f64,
    modules: &[ModuleOffset],
) -> Result<ChassisVelocity, KinematicsError> {
    if modules.is_empty() {
        return Err(KinematicsError::NoModules);
    }
    if !(v_max.is_finite() && v_max > 0.0) {
        return Err(KinematicsError::InvalidMaxSpeed(v_max));
    }
    if !(dt.is_finite() && dt > 0.0) {
        return Err(KinematicsError::InvalidTimestep(dt));
    }
    if !command.is_finite() {
        return Err(KinematicsError::NonFiniteCommand {
            vx: command.vx,
            vy: command.vy,
            omega: command.omega,
        });
    }

    let mut max_k = 1.0;
    let mut lap_start: Option<usize> = None;

    let mut i = 0;
    while lap_start != Some(i) {
        let module = &modules[i];
        let y = module_error(command, dt, v_max, module.x, module.y, max_k);

        if is_zero(y) || y < 0.0 {
            // Satisfied at the current bound; a fresh lap starts here
            if lap_start.is_none() {
                lap_start = Some(i);
            }
        } else {
            let k = solve_max_scale(command, dt, v_max, module.x, module.y, max_k, y);
            trace!(module = i, k, "module over speed limit, scale lowered");
            max_k = k;
            // Everything verified under the old bound is suspect again
            lap_start = Some(i);
        }

        i = (i + 1) % modules.len();
    }

    Ok(discretize(&command.scaled(max_k), dt))
}
