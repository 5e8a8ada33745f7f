// Timeouts, topics, drivetrain geometry
use std::time::Duration;

use crate::kinematics::ModuleOffset;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Control timestep handed to the discretization, in seconds
pub const CONTROL_DT: f64 = 1.0 / LOOP_HZ as f64;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_BASE: &str = "swerve/cmd/base"; // commands
pub const TOPIC_RT_BASE: &str = "swerve/rt/base"; // chassis actuation
pub const TOPIC_RT_MODULES: &str = "swerve/rt/modules"; // per-module setpoints
pub const TOPIC_HEALTH: &str = "swerve/state/health"; // health status

// Drivetrain geometry: module positions relative to body center, meters.
// Order is front-left, front-right, back-left, back-right.
pub const MODULE_COUNT: usize = 4;
pub const MODULE_OFFSETS: [ModuleOffset; MODULE_COUNT] = [
    ModuleOffset::new(0.17, 0.17),
    ModuleOffset::new(0.17, -0.17),
    ModuleOffset::new(-0.17, 0.17),
    ModuleOffset::new(-0.17, -0.17),
];

// Physical top speed of one module, m/s
pub const MAX_MODULE_SPEED: f64 = 1.0;

// Serial port for the module servo bus
pub const MOTOR_PORT: &str = "/dev/ttyACM0";
