// Motor control module for the swerve base
//
// Provides:
// - Feetech STS3215 serial protocol implementation
// - High-level swerve module driver (steer position + drive velocity)

mod driver;
pub mod feetech;

pub use driver::{MODULE_IDS, ModuleIds, SwerveDriver};
pub use feetech::{FeetechBus, FeetechError};
