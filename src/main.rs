//! CLI entry point for the HL-2000-HP-232R lamp control panel.
//!
//! Provides a command-line interface for:
//! - Discovering lamps on the host's serial ports
//! - One-shot commands (enable/disable, shutter moves, homing)
//! - A telemetry monitor loop with enable-state reconciliation
//!
//! # Usage
//!
//! Find the lamp:
//! ```bash
//! lamp-ctl discover
//! ```
//!
//! Park the shutter closed and declare home:
//! ```bash
//! lamp-ctl init /dev/ttyUSB0
//! ```
//!
//! Light up until Ctrl-C:
//! ```bash
//! lamp-ctl on /dev/ttyUSB0
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use hl2000_lamp::config::Settings;
use hl2000_lamp::discovery;
use hl2000_lamp::lamp::Hl2000Driver;
use hl2000_lamp::status::LampStatus;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "lamp-ctl")]
#[command(about = "Control panel for the HL-2000-HP-232R halogen lamp", long_about = None)]
struct Cli {
    /// Configuration name under config/ (built-in defaults when omitted)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan serial ports for connected lamps
    Discover,

    /// Print a telemetry snapshot
    Info {
        /// Serial port of the lamp
        port: String,

        /// Emit the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print decoded fault and motion-controller status
    Status {
        /// Serial port of the lamp
        port: String,
    },

    /// Enable illumination until Ctrl-C, then shut down safely
    On {
        /// Serial port of the lamp
        port: String,
    },

    /// Disable illumination
    Off {
        /// Serial port of the lamp
        port: String,
    },

    /// Move the shutter to an absolute position (relative to home)
    Shutter {
        /// Serial port of the lamp
        port: String,

        /// Target position in protocol counts
        position: i32,
    },

    /// Declare the current shutter position as home
    Home {
        /// Serial port of the lamp
        port: String,
    },

    /// Apply the safe startup state: dark, shutter closed, homed
    Init {
        /// Serial port of the lamp
        port: String,
    },

    /// Poll telemetry until Ctrl-C, reconciling the enable state each tick
    Monitor {
        /// Serial port of the lamp
        port: String,

        /// Poll interval in milliseconds (overrides the configured value)
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&settings.log_level),
    )
    .init();

    match cli.command {
        Commands::Discover => discover(&settings).await,
        Commands::Info { port, json } => info(&settings, &port, json).await,
        Commands::Status { port } => status(&settings, &port).await,
        Commands::On { port } => on(&settings, &port).await,
        Commands::Off { port } => off(&settings, &port).await,
        Commands::Shutter { port, position } => shutter(&settings, &port, position).await,
        Commands::Home { port } => home(&settings, &port).await,
        Commands::Init { port } => init(&settings, &port).await,
        Commands::Monitor { port, interval_ms } => {
            monitor(&settings, &port, interval_ms.map(Duration::from_millis)).await
        }
    }
}

/// Load the named settings, falling back to built-in defaults when no
/// config file exists and none was explicitly requested.
fn load_settings(name: Option<&str>) -> Result<Settings> {
    match Settings::new(name) {
        Ok(settings) => Ok(settings),
        Err(e) if name.is_none() => {
            eprintln!("No config file found ({e}); using built-in defaults");
            Ok(Settings::default())
        }
        Err(e) => Err(e.into()),
    }
}

async fn discover(settings: &Settings) -> Result<()> {
    println!("🔍 Scanning serial ports for lamps...");
    let lamps = discovery::list_candidates(&settings.serial).await?;

    if lamps.is_empty() {
        println!("❌ No lamp answered the identification query.");
        return Ok(());
    }

    for lamp in lamps.values() {
        match &lamp.description {
            Some(desc) => println!(
                "✅ {} ({}): {}",
                lamp.port_name, desc, lamp.firmware_version
            ),
            None => println!("✅ {}: {}", lamp.port_name, lamp.firmware_version),
        }
    }
    Ok(())
}

async fn info(settings: &Settings, port: &str, json: bool) -> Result<()> {
    let lamp = Hl2000Driver::new(settings);
    lamp.connect(port).await?;

    let status = lamp.get_info().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }

    lamp.disconnect().await?;
    Ok(())
}

async fn status(settings: &Settings, port: &str) -> Result<()> {
    let lamp = Hl2000Driver::new(settings);
    lamp.connect(port).await?;

    let faults = lamp.get_fault_status().await?;
    let motion = lamp.get_motion_status().await?;
    lamp.disconnect().await?;

    if faults.is_clear() {
        println!("Faults: none");
    } else {
        println!("Faults: {:?}", faults);
    }
    println!("Motion: {:?}", motion);
    Ok(())
}

async fn on(settings: &Settings, port: &str) -> Result<()> {
    let lamp = Hl2000Driver::new(settings);
    lamp.connect(port).await?;
    lamp.set_enabled(true).await?;

    println!("💡 Illumination ON: Ctrl-C to shut down safely");
    tokio::signal::ctrl_c().await?;

    // Disconnect disables illumination and drive before closing.
    lamp.disconnect().await?;
    println!("Lamp dark, disconnected.");
    Ok(())
}

async fn off(settings: &Settings, port: &str) -> Result<()> {
    let lamp = Hl2000Driver::new(settings);
    lamp.connect(port).await?;
    lamp.set_enabled(false).await?;
    lamp.disconnect().await?;
    println!("Lamp dark, disconnected.");
    Ok(())
}

async fn shutter(settings: &Settings, port: &str, position: i32) -> Result<()> {
    let lamp = Hl2000Driver::new(settings);
    lamp.connect(port).await?;
    lamp.set_shutter_position(position).await?;
    let reported = lamp.get_shutter_position().await?;
    lamp.disconnect().await?;
    println!("Shutter commanded to {position}, device reports {reported}");
    Ok(())
}

async fn home(settings: &Settings, port: &str) -> Result<()> {
    let lamp = Hl2000Driver::new(settings);
    lamp.connect(port).await?;
    lamp.set_home().await?;
    lamp.disconnect().await?;
    println!("Current shutter position declared home.");
    Ok(())
}

async fn init(settings: &Settings, port: &str) -> Result<()> {
    let lamp = Hl2000Driver::new(settings);
    lamp.connect(port).await?;
    lamp.apply_initial_state().await?;
    lamp.disconnect().await?;
    println!("Lamp initialized: dark, shutter closed, homed.");
    Ok(())
}

async fn monitor(settings: &Settings, port: &str, interval: Option<Duration>) -> Result<()> {
    let lamp = Hl2000Driver::new(settings);
    lamp.connect(port).await?;

    let period = interval.unwrap_or(settings.lamp.poll_interval);
    let mut ticker = tokio::time::interval(period);
    println!(
        "📡 Polling every {:?}: Ctrl-C to stop",
        period
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = lamp.get_info().await;
                if lamp.reconcile(&status).await? {
                    println!("⚠️  enable state drifted, reasserted commanded state");
                }
                print_status(&status);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    lamp.disconnect().await?;
    println!("Monitor stopped, lamp disconnected.");
    Ok(())
}

fn print_status(status: &LampStatus) {
    println!(
        "connected={} enabled={} firmware='{}' coil={:.1}°C shutter={} current={:.1}mA",
        status.is_connected,
        status.is_enabled,
        status.firmware_version,
        status.coil_temperature_c,
        status.shutter_position,
        status.driver_current_ma,
    );
}
