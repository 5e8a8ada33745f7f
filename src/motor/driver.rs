// High-level driver for the swerve base
//
// Maps per-module setpoints (drive speed + steer angle) to servo register
// writes: steer servos run in position mode, drive servos in velocity mode.
// Steer targets are optimized so a module never rotates more than a quarter
// turn; when flipping the module 180 degrees is shorter, the drive direction
// is reversed instead.

use std::f64::consts::PI;

use tracing::{debug, info, warn};

use super::feetech::{FeetechBus, FeetechError, OperatingMode, Register};
use crate::config::MODULE_COUNT;
use crate::messages::ModuleSetpoint;

/// Steer/drive servo ID pair for one swerve module
#[derive(Debug, Clone, Copy)]
pub struct ModuleIds {
    pub steer: u8,
    pub drive: u8,
}

/// Servo IDs per module, same order as the offsets in `config`
pub const MODULE_IDS: [ModuleIds; MODULE_COUNT] = [
    ModuleIds { steer: 1, drive: 2 },
    ModuleIds { steer: 3, drive: 4 },
    ModuleIds { steer: 5, drive: 6 },
    ModuleIds { steer: 7, drive: 8 },
];

/// Wheel radius, meters
const WHEEL_RADIUS: f64 = 0.05;

/// Encoder resolution: 4096 counts per revolution
const COUNTS_PER_REVOLUTION: f64 = 4096.0;

/// Maximum raw drive velocity command (safety limit)
const MAX_RAW_VELOCITY: i16 = 3000;

/// Wrap an angle to (-pi, pi]
fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(2.0 * PI);
    if wrapped > PI { wrapped - 2.0 * PI } else { wrapped }
}

/// Shortest-rotation equivalent of a setpoint given the current steer angle.
///
/// Returns the steer target and a possibly negated drive speed: turning the
/// module by `delta - pi` and driving backwards reaches the same velocity
/// vector as turning by `delta` whenever |delta| exceeds a quarter turn.
fn optimize(setpoint: &ModuleSetpoint, current_angle: f64) -> (f64, f64) {
    let delta = wrap_angle(setpoint.angle - current_angle);
    if delta.abs() > PI / 2.0 {
        (wrap_angle(setpoint.angle + PI), -setpoint.speed)
    } else {
        (setpoint.angle, setpoint.speed)
    }
}

/// Convert a steer angle to encoder counts in [0, 4096)
fn angle_to_counts(angle: f64) -> u16 {
    let turns = angle.rem_euclid(2.0 * PI) / (2.0 * PI);
    let counts = (turns * COUNTS_PER_REVOLUTION).round() as u32;
    (counts % COUNTS_PER_REVOLUTION as u32) as u16
}

/// Convert a drive speed (m/s) to a raw velocity command (counts/s)
fn speed_to_raw(speed: f64) -> i16 {
    let revs_per_sec = speed / (2.0 * PI * WHEEL_RADIUS);
    let counts = (revs_per_sec * COUNTS_PER_REVOLUTION).round() as i32;
    counts.clamp(-(MAX_RAW_VELOCITY as i32), MAX_RAW_VELOCITY as i32) as i16
}

/// High-level driver owning the servo bus for all swerve modules
pub struct SwerveDriver {
    bus: FeetechBus,
    modules: [ModuleIds; MODULE_COUNT],
    // Last commanded steer angles, for shortest-rotation optimization
    steer_angles: [f64; MODULE_COUNT],
}

impl SwerveDriver {
    /// Create a new driver, connecting to the specified serial port
    pub fn new(port: &str) -> Result<Self, FeetechError> {
        Self::with_module_ids(port, MODULE_IDS)
    }

    /// Create with custom servo IDs
    pub fn with_module_ids(
        port: &str,
        modules: [ModuleIds; MODULE_COUNT],
    ) -> Result<Self, FeetechError> {
        info!("Opening motor bus on {}", port);
        let bus = FeetechBus::open(port)?;
        Ok(Self {
            bus,
            modules,
            steer_angles: [0.0; MODULE_COUNT],
        })
    }

    /// Initialize all servos for swerve control
    ///
    /// Must be called before applying setpoints: pings every servo, then
    /// sets steer servos to position mode and drive servos to velocity mode
    /// (torque has to be off while the mode changes).
    pub fn initialize(&mut self) -> Result<(), FeetechError> {
        info!("Initializing {} swerve modules: {:?}", MODULE_COUNT, self.modules);

        for ids in self.modules {
            for id in [ids.steer, ids.drive] {
                match self.bus.ping(id) {
                    Ok(true) => debug!("Servo {} responding", id),
                    Ok(false) => {
                        warn!("Servo {} not responding to ping", id);
                        return Err(FeetechError::Timeout { id });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        for ids in self.modules {
            self.bus.disable_torque(ids.steer)?;
            self.bus.disable_torque(ids.drive)?;
            self.bus.set_operating_mode(ids.steer, OperatingMode::Position)?;
            self.bus.set_operating_mode(ids.drive, OperatingMode::Velocity)?;
            self.bus.enable_torque(ids.steer)?;
            self.bus.enable_torque(ids.drive)?;
        }

        info!("Swerve modules initialized successfully");
        Ok(())
    }

    /// Apply one setpoint per module
    pub fn apply(&mut self, setpoints: &[ModuleSetpoint; MODULE_COUNT]) -> Result<(), FeetechError> {
        let mut positions = [(0u8, 0u16); MODULE_COUNT];
        let mut velocities = [(0u8, 0i16); MODULE_COUNT];

        for (i, (ids, setpoint)) in self.modules.iter().zip(setpoints).enumerate() {
            let (angle, speed) = optimize(setpoint, self.steer_angles[i]);
            self.steer_angles[i] = angle;

            positions[i] = (ids.steer, angle_to_counts(angle));
            velocities[i] = (ids.drive, speed_to_raw(speed));
        }

        debug!("Applying setpoints: pos={:?}, vel={:?}", positions, velocities);
        self.bus.sync_write_u16(Register::GoalPosition, &positions)?;
        self.bus.sync_write_i16(Register::GoalVelocity, &velocities)
    }

    /// Stop all drive motors immediately, leaving steer angles in place
    pub fn stop(&mut self) -> Result<(), FeetechError> {
        info!("Stopping all drive motors");
        let zeros = self.modules.map(|ids| (ids.drive, 0i16));
        self.bus.sync_write_i16(Register::GoalVelocity, &zeros)
    }

    /// Disable torque on every servo (allows free movement)
    pub fn disable_torque(&mut self) -> Result<(), FeetechError> {
        info!("Disabling torque on all servos");
        for ids in self.modules {
            self.bus.disable_torque(ids.steer)?;
            self.bus.disable_torque(ids.drive)?;
        }
        Ok(())
    }

    /// Read the present steer angle of one module, radians in [0, 2*pi)
    pub fn steer_angle(&mut self, module: usize) -> Result<f64, FeetechError> {
        let counts = self.bus.get_position(self.modules[module].steer)?;
        Ok(counts as f64 / COUNTS_PER_REVOLUTION * 2.0 * PI)
    }

    /// Check if a servo is reachable
    pub fn ping(&mut self, id: u8) -> Result<bool, FeetechError> {
        self.bus.ping(id)
    }

    /// Get the module servo IDs
    pub fn module_ids(&self) -> [ModuleIds; MODULE_COUNT] {
        self.modules
    }
}

impl Drop for SwerveDriver {
    fn drop(&mut self) {
        // Try to stop the drive motors when the driver goes away
        if let Err(e) = self.stop() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(0.0)).abs() < 1e-12);
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-12);
        assert!((wrap_angle(-PI / 2.0) + PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_optimize_keeps_short_rotations() {
        let sp = ModuleSetpoint { speed: 1.0, angle: PI / 4.0 };
        let (angle, speed) = optimize(&sp, 0.0);
        assert_eq!(angle, PI / 4.0);
        assert_eq!(speed, 1.0);
    }

    #[test]
    fn test_optimize_flips_long_rotations() {
        // 170 degrees away: flip the module and drive backwards
        let target = 170.0_f64.to_radians();
        let sp = ModuleSetpoint { speed: 1.0, angle: target };
        let (angle, speed) = optimize(&sp, 0.0);
        assert_eq!(speed, -1.0);
        assert!((angle - (target - PI)).abs() < 1e-12, "angle {}", angle);
    }

    #[test]
    fn test_angle_to_counts() {
        assert_eq!(angle_to_counts(0.0), 0);
        assert_eq!(angle_to_counts(PI), 2048);
        assert_eq!(angle_to_counts(-PI / 2.0), 3072);
        // Full turn wraps back to zero
        assert_eq!(angle_to_counts(2.0 * PI), 0);
    }

    #[test]
    fn test_speed_to_raw() {
        assert_eq!(speed_to_raw(0.0), 0);
        // Half a wheel revolution per second = 2048 counts/s
        let half_rev = PI * WHEEL_RADIUS;
        assert_eq!(speed_to_raw(half_rev), 2048);
        assert_eq!(speed_to_raw(-half_rev), -2048);
    }

    #[test]
    fn test_speed_to_raw_clamps() {
        assert_eq!(speed_to_raw(100.0), MAX_RAW_VELOCITY);
        assert_eq!(speed_to_raw(-100.0), -MAX_RAW_VELOCITY);
    }
}
