// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::kinematics::ChassisVelocity;

// Command from teleop/scripts -> runtime: continuous body-frame velocity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseCommand {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

impl From<&BaseCommand> for ChassisVelocity {
    fn from(cmd: &BaseCommand) -> Self {
        ChassisVelocity::new(cmd.vx, cmd.vy, cmd.omega)
    }
}

// Actuation output from runtime -> hardware: the discretized, desaturated
// chassis velocity for the current control step.
// Has default values because we don't always have an actuation to send
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BaseActuation {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

impl From<&ChassisVelocity> for BaseActuation {
    fn from(v: &ChassisVelocity) -> Self {
        Self {
            vx: v.vx,
            vy: v.vy,
            omega: v.omega,
        }
    }
}

/// Drive speed (m/s) and steer angle (rad) for one swerve module
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ModuleSetpoint {
    pub speed: f64,
    pub angle: f64,
}

impl ModuleSetpoint {
    /// Setpoint realizing the given module velocity vector.
    ///
    /// A module with no speed keeps a zero angle instead of whatever
    /// atan2(0, 0) happens to return.
    pub fn from_velocity(vx: f64, vy: f64) -> Self {
        let speed = vx.hypot(vy);
        let angle = if speed > 0.0 { vy.atan2(vx) } else { 0.0 };
        Self { speed, angle }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    CmdInvalid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setpoint_from_zero_velocity() {
        let sp = ModuleSetpoint::from_velocity(0.0, 0.0);
        assert_eq!(sp.speed, 0.0);
        assert_eq!(sp.angle, 0.0);
    }

    #[test]
    fn test_setpoint_angle() {
        let sp = ModuleSetpoint::from_velocity(0.0, 1.0);
        assert!((sp.speed - 1.0).abs() < 1e-12);
        assert!((sp.angle - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
