// 50 Hz loop with watchdog
//
// The watchdog zeroes the actuation if teleop crashes or stops sending
// commands; a command the kinematics rejects (non-finite velocity etc.)
// is treated the same way rather than being forwarded to the hardware.

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::{
    CMD_TIMEOUT, CONTROL_DT, LOOP_HZ, MAX_MODULE_SPEED, MODULE_COUNT, MODULE_OFFSETS,
    TOPIC_CMD_BASE, TOPIC_HEALTH, TOPIC_RT_BASE, TOPIC_RT_MODULES,
};
use crate::kinematics::{ChassisVelocity, desaturated_discretize};
use crate::messages::{BaseActuation, BaseCommand, ModuleSetpoint, RuntimeHealth};

pub struct Runtime {
    latest_cmd: Option<BaseCommand>,
    cmd_received_at: Instant,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming command
    fn on_command(&mut self, cmd: BaseCommand) {
        info!("Received command: {:?}", &cmd);
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    /// Compute actuation and per-module setpoints for this control step
    fn compute_actuation(&mut self) -> (BaseActuation, [ModuleSetpoint; MODULE_COUNT]) {
        let cmd_age = self.cmd_received_at.elapsed();

        if cmd_age > CMD_TIMEOUT {
            // Watchdog triggered - stop the robot
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale ({:?} old), stopping robot", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
            return Default::default();
        }

        let Some(ref cmd) = self.latest_cmd else {
            // No command ever received
            self.health = RuntimeHealth::CmdStale;
            return Default::default();
        };

        let command = ChassisVelocity::from(cmd);
        match desaturated_discretize(&command, CONTROL_DT, MAX_MODULE_SPEED, &MODULE_OFFSETS) {
            Ok(output) => {
                self.health = RuntimeHealth::Ok;
                let setpoints = MODULE_OFFSETS.map(|m| {
                    let (vx, vy) = output.module_velocity(&m);
                    ModuleSetpoint::from_velocity(vx, vy)
                });
                (BaseActuation::from(&output), setpoints)
            }
            Err(e) => {
                if self.health != RuntimeHealth::CmdInvalid {
                    warn!("Rejecting command {:?}: {}", cmd, e);
                }
                self.health = RuntimeHealth::CmdInvalid;
                Default::default()
            }
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_BASE).await?;
    let pub_actuation = session.declare_publisher(TOPIC_RT_BASE).await?;
    let pub_modules = session.declare_publisher(TOPIC_RT_MODULES).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new();
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout, {} modules, {} m/s module limit",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis(),
        MODULE_COUNT,
        MAX_MODULE_SPEED
    );
    info!("Subscribed to: {}", TOPIC_CMD_BASE);
    info!(
        "Publishing to: {}, {}, {}",
        TOPIC_RT_BASE, TOPIC_RT_MODULES, TOPIC_HEALTH
    );

    loop {
        tick.tick().await;

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<BaseCommand>(&payload) {
                Ok(cmd) => {
                    runtime.on_command(cmd);
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Compute actuation (includes watchdog and desaturation)
        let (actuation, setpoints) = runtime.compute_actuation();

        // 3. Publish actuation and module setpoints
        let actuation_json = serde_json::to_string(&actuation)?;
        pub_actuation.put(actuation_json).await?;

        let modules_json = serde_json::to_string(&setpoints[..])?;
        pub_modules.put(modules_json).await?;

        // 4. Publish health
        let health_json = serde_json::to_string(&runtime.health)?;
        pub_health.put(health_json).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watchdog_zeroes_actuation() {
        let mut runtime = Runtime::new();
        runtime.on_command(BaseCommand {
            vx: 0.5,
            vy: 0.0,
            omega: 0.0,
        });
        // Age the command past the watchdog deadline
        runtime.cmd_received_at = Instant::now() - (CMD_TIMEOUT + Duration::from_millis(50));

        let (actuation, setpoints) = runtime.compute_actuation();
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);
        assert_eq!(actuation.vx, 0.0);
        assert_eq!(actuation.vy, 0.0);
        assert_eq!(actuation.omega, 0.0);
        assert!(setpoints.iter().all(|sp| sp.speed == 0.0));
    }

    #[test]
    fn test_fresh_command_is_desaturated() {
        let mut runtime = Runtime::new();
        // Way over the module speed limit
        runtime.on_command(BaseCommand {
            vx: 10.0,
            vy: 0.0,
            omega: 0.0,
        });

        let (actuation, setpoints) = runtime.compute_actuation();
        assert_eq!(runtime.health(), RuntimeHealth::Ok);
        assert!(actuation.vx > 0.0);
        assert!(actuation.vx < 10.0, "actuation not scaled down: {:?}", actuation);

        let max_speed = setpoints.iter().map(|sp| sp.speed).fold(0.0, f64::max);
        assert!(
            (max_speed - MAX_MODULE_SPEED).abs() < 1e-9,
            "fastest module should sit at the limit, got {}",
            max_speed
        );
    }

    #[test]
    fn test_invalid_command_is_rejected() {
        let mut runtime = Runtime::new();
        runtime.on_command(BaseCommand {
            vx: f64::NAN,
            vy: 0.0,
            omega: 0.0,
        });

        let (actuation, _) = runtime.compute_actuation();
        assert_eq!(runtime.health(), RuntimeHealth::CmdInvalid);
        assert_eq!(actuation.vx, 0.0);
    }
}
