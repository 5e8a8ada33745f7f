// Swerve base kinematics
//
// Provides:
// - Chassis velocity / module offset value types
// - Exponential-map discretization (continuous command -> per-step command)
// - Curvature-aware desaturation keeping every module under its top speed

mod desaturate;
mod discretize;
mod types;

pub use desaturate::{KinematicsError, desaturated_discretize};
pub use discretize::discretize;
pub use types::{ChassisVelocity, ModuleOffset};
