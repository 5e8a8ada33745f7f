// Module diagnostic: READ-ONLY test to verify servo connections
//
// This tool does NOT write anything to the servos - it's completely safe.
// Use it first before running module_test.
//
// Usage: cargo run --bin module_diagnostic -- [--port /dev/ttyACM0]

use clap::Parser;

use swerve_zenoh_runtime::config::MOTOR_PORT;
use swerve_zenoh_runtime::motor::MODULE_IDS;
use swerve_zenoh_runtime::motor::feetech::{DEFAULT_BAUDRATE, FeetechBus, Register};

#[derive(Parser, Debug)]
#[command(about = "Read-only swerve servo diagnostic")]
struct Args {
    /// Serial port of the servo bus
    #[arg(long, default_value = MOTOR_PORT)]
    port: String,

    /// Bus baudrate
    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    baudrate: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    println!("Swerve module diagnostic (READ-ONLY)");
    println!("This tool only reads from servos - no writes, no movement.");
    println!();
    println!("Serial port: {} @ {} baud", args.port, args.baudrate);
    println!("Expected modules: {:?}", MODULE_IDS);
    println!();

    println!("Step 1: Opening serial port...");
    let mut bus = match FeetechBus::open_with_baudrate(&args.port, args.baudrate) {
        Ok(bus) => {
            println!("  ok: serial port opened");
            bus
        }
        Err(e) => {
            println!("  FAILED to open serial port: {}", e);
            println!();
            println!("Troubleshooting:");
            println!("  - Check the port path is correct");
            println!("  - Verify the USB cable is connected");
            println!("  - Check the user has permission on the device node");
            return Err(e.into());
        }
    };
    println!();

    println!("Step 2: Pinging servos...");
    let mut all_found = true;
    for (i, ids) in MODULE_IDS.iter().enumerate() {
        for (role, id) in [("steer", ids.steer), ("drive", ids.drive)] {
            match bus.ping(id) {
                Ok(true) => println!("  ok: module {} {} servo (ID {}) responding", i, role, id),
                Ok(false) => {
                    println!("  MISSING: module {} {} servo (ID {}) not responding", i, role, id);
                    all_found = false;
                }
                Err(e) => {
                    println!("  ERROR pinging module {} {} servo (ID {}): {}", i, role, id, e);
                    all_found = false;
                }
            }
        }
    }
    println!();

    if !all_found {
        println!("Some servos did not respond; skipping register reads.");
        return Ok(());
    }

    println!("Step 3: Reading servo state...");
    for (i, ids) in MODULE_IDS.iter().enumerate() {
        let steer_pos = bus.get_position(ids.steer)?;
        let drive_vel = bus.get_velocity(ids.drive)?;
        let steer_mode = bus.read_u8(ids.steer, Register::OperatingMode)?;
        let drive_mode = bus.read_u8(ids.drive, Register::OperatingMode)?;
        println!(
            "  module {}: steer pos={} counts (mode {}), drive vel={} counts/s (mode {})",
            i, steer_pos, steer_mode, drive_vel, drive_mode
        );
    }
    println!();
    println!("All servos responding. Safe to run module_test next.");

    Ok(())
}
