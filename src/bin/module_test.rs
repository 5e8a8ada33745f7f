// Module test: careful, step-by-step test for swerve module control
//
// IMPORTANT: Run module_diagnostic FIRST to verify read-only communication.
//
// Usage: cargo run --bin module_test -- [--port /dev/ttyACM0]
//
// Safety features:
// - Explicit confirmation before any writes
// - Wheels must be off the ground
// - Very slow test speeds
// - Easy abort with Ctrl+C

use std::io::{self, Write};
use std::thread::sleep;
use std::time::Duration;

use clap::Parser;

use swerve_zenoh_runtime::config::{MODULE_COUNT, MOTOR_PORT};
use swerve_zenoh_runtime::messages::ModuleSetpoint;
use swerve_zenoh_runtime::motor::SwerveDriver;

const TEST_SPEED: f64 = 0.05; // m/s, deliberately slow
const TEST_ANGLES_DEG: [f64; 4] = [0.0, 45.0, 90.0, 0.0];

#[derive(Parser, Debug)]
#[command(about = "Swerve module motion test (WRITES to servos)")]
struct Args {
    /// Serial port of the servo bus
    #[arg(long, default_value = MOTOR_PORT)]
    port: String,
}

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush().unwrap();
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();
    input.trim().eq_ignore_ascii_case("y")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    println!("Swerve module test - THIS WILL MOVE THE MODULES");
    println!("Make sure the wheels are OFF THE GROUND before proceeding!");
    println!();
    println!("Serial port: {}", args.port);
    println!();

    if !confirm("Have you run module_diagnostic first and verified all servos respond?") {
        println!("Please run: cargo run --bin module_diagnostic -- --port {}", args.port);
        return Ok(());
    }

    if !confirm("Are the robot's wheels OFF THE GROUND (robot elevated/on blocks)?") {
        println!("Please elevate the robot so the wheels can spin freely.");
        return Ok(());
    }

    println!();
    println!("Step 1: Connecting and initializing...");
    let mut driver = SwerveDriver::new(&args.port)?;
    driver.initialize()?;
    println!("  ok: servos initialized (steer=position mode, drive=velocity mode)");
    println!();

    println!("Step 2: Steering sweep (no drive power)...");
    for angle_deg in TEST_ANGLES_DEG {
        let setpoints =
            [ModuleSetpoint { speed: 0.0, angle: angle_deg.to_radians() }; MODULE_COUNT];
        println!("  steering all modules to {} degrees", angle_deg);
        driver.apply(&setpoints)?;
        sleep(Duration::from_millis(800));
    }
    println!();

    if !confirm(&format!("Step 3 spins the wheels at {} m/s. Continue?", TEST_SPEED)) {
        println!("Stopping here.");
        return Ok(());
    }

    println!("Step 3: Slow drive test, straight ahead...");
    let setpoints = [ModuleSetpoint { speed: TEST_SPEED, angle: 0.0 }; MODULE_COUNT];
    driver.apply(&setpoints)?;
    sleep(Duration::from_secs(2));

    println!("Step 4: Stopping...");
    driver.stop()?;
    println!();
    println!("Test complete.");

    Ok(())
}
