// C ABI entry point for the desaturating discretization.
//
// Thin conduit for non-Rust callers: parameters arrive flattened into plain
// double arrays and the result is written back the same way. All computation
// happens in `kinematics`; this layer only reinterprets buffers, so the
// output is bit-for-bit identical to the in-process API.

use crate::kinematics::{ChassisVelocity, KinematicsError, ModuleOffset, desaturated_discretize};

pub const STATUS_OK: i32 = 0;
pub const STATUS_NULL_POINTER: i32 = 1;
pub const STATUS_NO_MODULES: i32 = 2;
pub const STATUS_INVALID_MAX_SPEED: i32 = 3;
pub const STATUS_INVALID_TIMESTEP: i32 = 4;
pub const STATUS_NON_FINITE_COMMAND: i32 = 5;

fn status_of(err: &KinematicsError) -> i32 {
    match err {
        KinematicsError::NoModules => STATUS_NO_MODULES,
        KinematicsError::InvalidMaxSpeed(_) => STATUS_INVALID_MAX_SPEED,
        KinematicsError::InvalidTimestep(_) => STATUS_INVALID_TIMESTEP,
        KinematicsError::NonFiniteCommand { .. } => STATUS_NON_FINITE_COMMAND,
    }
}

/// Discretize and desaturate a chassis velocity command.
///
/// `positions` holds `2 * module_count` doubles, packed as interleaved
/// x/y pairs. On success, `out_velocity` receives `[vx, vy, omega]` and the
/// return value is `STATUS_OK`; on failure `out_velocity` is untouched and a
/// nonzero status identifies the rejected input.
///
/// # Safety
///
/// `positions` must point to `2 * module_count` readable doubles and
/// `out_velocity` to 3 writable doubles for the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn swerve_desaturated_discretize(
    vx: f64,
    vy: f64,
    omega: f64,
    dt: f64,
    max_module_speed: f64,
    positions: *const f64,
    module_count: usize,
    out_velocity: *mut f64,
) -> i32 {
    if positions.is_null() || out_velocity.is_null() {
        return STATUS_NULL_POINTER;
    }

    // ModuleOffset is repr(C) { x: f64, y: f64 }, so the interleaved pair
    // array and the offset slice have identical layout
    let modules = unsafe {
        std::slice::from_raw_parts(positions.cast::<ModuleOffset>(), module_count)
    };

    let command = ChassisVelocity::new(vx, vy, omega);
    match desaturated_discretize(&command, dt, max_module_speed, modules) {
        Ok(result) => {
            let out = unsafe { std::slice::from_raw_parts_mut(out_velocity, 3) };
            out[0] = result.vx;
            out[1] = result.vy;
            out[2] = result.omega;
            STATUS_OK
        }
        Err(e) => status_of(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_in_process_result_exactly() {
        let positions = [1.0, 1.0, 1.0, -1.0, -1.0, 1.0, -1.0, -1.0];
        let mut out = [0.0f64; 3];

        let status = unsafe {
            swerve_desaturated_discretize(
                2.0,
                1.0,
                0.1,
                0.02,
                1.0,
                positions.as_ptr(),
                4,
                out.as_mut_ptr(),
            )
        };
        assert_eq!(status, STATUS_OK);

        let modules = [
            ModuleOffset::new(1.0, 1.0),
            ModuleOffset::new(1.0, -1.0),
            ModuleOffset::new(-1.0, 1.0),
            ModuleOffset::new(-1.0, -1.0),
        ];
        let expected = desaturated_discretize(
            &ChassisVelocity::new(2.0, 1.0, 0.1),
            0.02,
            1.0,
            &modules,
        )
        .unwrap();

        // Bit-for-bit, not just within tolerance
        assert_eq!(out[0].to_bits(), expected.vx.to_bits());
        assert_eq!(out[1].to_bits(), expected.vy.to_bits());
        assert_eq!(out[2].to_bits(), expected.omega.to_bits());
    }

    #[test]
    fn test_null_pointers_are_rejected() {
        let mut out = [0.0f64; 3];
        let status = unsafe {
            swerve_desaturated_discretize(
                1.0,
                0.0,
                0.0,
                0.02,
                1.0,
                std::ptr::null(),
                4,
                out.as_mut_ptr(),
            )
        };
        assert_eq!(status, STATUS_NULL_POINTER);

        let positions = [1.0, 1.0];
        let status = unsafe {
            swerve_desaturated_discretize(
                1.0,
                0.0,
                0.0,
                0.02,
                1.0,
                positions.as_ptr(),
                1,
                std::ptr::null_mut(),
            )
        };
        assert_eq!(status, STATUS_NULL_POINTER);
    }

    #[test]
    fn test_degenerate_inputs_map_to_statuses() {
        let positions = [1.0, 0.0];
        let mut out = [0.0f64; 3];

        let status = unsafe {
            swerve_desaturated_discretize(
                1.0,
                0.0,
                0.0,
                0.02,
                1.0,
                positions.as_ptr(),
                0,
                out.as_mut_ptr(),
            )
        };
        assert_eq!(status, STATUS_NO_MODULES);

        let status = unsafe {
            swerve_desaturated_discretize(
                1.0,
                0.0,
                0.0,
                0.02,
                -1.0,
                positions.as_ptr(),
                1,
                out.as_mut_ptr(),
            )
        };
        assert_eq!(status, STATUS_INVALID_MAX_SPEED);
    }
}
