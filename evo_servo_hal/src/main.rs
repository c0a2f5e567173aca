//! # EVO Servo HAL Binary
//!
//! Runs the servo transmission HAL host loop with a state broadcast thread.
//!
//! # Usage
//!
//! ```bash
//! # Run against the simulated bus
//! evo_servo_hal --config config/servo_arm.toml --simulate
//!
//! # Run with a specific link
//! evo_servo_hal --config /etc/evo/servo.toml --driver simulation
//!
//! # Verbose JSON logging
//! evo_servo_hal -c config/servo_arm.toml -s -v --json
//! ```

use clap::Parser;
use evo_servo_common::config::{ConfigLoader, ServoConfig};
use evo_servo_common::consts::{DEFAULT_CONFIG_PATH, SERVO_HAL_SERVICE_NAME};
use evo_servo_hal::links::simulation;
use evo_servo_hal::{LinkRegistry, ServoHal, StatePublisher, TracingSink};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// EVO Servo HAL - servo transmission hardware interface
#[derive(Parser, Debug)]
#[command(name = "evo_servo_hal")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Servo transmission HAL with joint mapping, fault handling and torque control")]
#[command(long_about = None)]
struct Args {
    /// Path to servo configuration file (servo.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Force the simulated link
    #[arg(short = 's', long)]
    simulate: bool,

    /// Link to use instead of the one in the configuration
    #[arg(short, long)]
    driver: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("Servo HAL startup failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("EVO Servo HAL ({}) v{} starting...", SERVO_HAL_SERVICE_NAME, env!("CARGO_PKG_VERSION"));

    info!("Loading configuration from {:?}", args.config);
    let mut config = ServoConfig::load(&args.config)?;
    if args.simulate {
        info!("Simulation mode enabled (exclusive)");
        config.link.driver = simulation::LINK_NAME.to_string();
    } else if let Some(driver) = &args.driver {
        info!("Link from CLI: {}", driver);
        config.link.driver = driver.clone();
    }
    let service_name = config.shared.service_name.clone();

    let registry = LinkRegistry::with_builtin_links();
    info!("Available links: {:?}", registry.list_links());
    let mut hal = ServoHal::new(config, &registry)?;

    let running = hal.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    hal.start()?;

    let publishing = Arc::new(AtomicBool::new(true));
    let publisher = StatePublisher::new(hal.services(), Box::new(TracingSink::new(&service_name)))
        .spawn(Arc::clone(&publishing))?;

    if let Err(e) = hal.run() {
        error!("Servo loop error: {}", e);
    }
    publishing.store(false, Ordering::SeqCst);
    if let Err(e) = hal.shutdown() {
        warn!("Failed to disable torque on shutdown: {}", e);
    }

    match publisher.join() {
        Ok(count) => info!("State publisher sent {} snapshots", count),
        Err(_) => warn!("State publisher thread panicked"),
    }

    let stats = hal.stats();
    info!(
        "EVO Servo HAL shutdown complete: {} cycles, avg={}us, max={}us, violations={}",
        stats.cycle_count,
        stats.avg_cycle_time_us(),
        stats.max_cycle_time_us,
        stats.timing_violations
    );
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
