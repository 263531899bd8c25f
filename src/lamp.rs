//! Ocean Optics HL-2000-HP-232R halogen lamp driver.
//!
//! Reference: IPS motion-controller command set as used by the lamp's
//! shutter electronics.
//!
//! Protocol overview:
//! - Format: ASCII command/response over RS-232 (9600 baud, 8N1, no flow
//!   control, CR/LF terminators; some firmware revisions use bare CR)
//! - Commands are two/three-letter tokens; numeric arguments are embedded
//!   inline with no separator (`LA-400`, `SP1000`)
//! - Queries: `VER`, `GFS`, `TEM`, `POS`, `GST`, `GRC`, `GSP`, `GV`
//! - Writes: `SO`/`CO` (illumination), `EN`/`DI` (drive electronics),
//!   `HO` (home), `LA<n>` + `M` (move), `SP<n>` (max velocity)
//! - The device may echo "OK" before a payload line; the transport layer
//!   discards those echoes
//!
//! # Example Usage
//!
//! ```no_run
//! use hl2000_lamp::config::Settings;
//! use hl2000_lamp::lamp::Hl2000Driver;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let driver = Hl2000Driver::new(&Settings::default());
//!     driver.connect("/dev/ttyUSB0").await?;
//!
//!     driver.set_enabled(true).await?;
//!     driver.set_shutter_position(200).await?;
//!
//!     let status = driver.get_info().await;
//!     println!("coil temperature: {:.1} °C", status.coil_temperature_c);
//!
//!     driver.disconnect().await?;
//!     Ok(())
//! }
//! ```

use crate::config::{LampSettings, SerialSettings, Settings};
use crate::error::{LampError, Result};
use crate::status::{FaultStatus, LampStatus, MotionStatus};
use crate::transport::Transport;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;

/// Substring present in a valid `VER` reply; discovery keys on it.
pub const VERSION_MARKER: &str = "Version";

/// Cached identity and position state, reset on disconnect.
#[derive(Debug)]
struct Cached {
    port_name: Option<String>,
    firmware_version: Option<String>,
    shutter_position: f64,
}

impl Default for Cached {
    fn default() -> Self {
        Self {
            port_name: None,
            firmware_version: None,
            shutter_position: f64::NAN,
        }
    }
}

/// Driver for one HL-2000-HP-232R lamp.
///
/// Owns a single serial session behind one async mutex, so each
/// command/reply pair is atomic with respect to concurrent callers (a
/// telemetry poller and a user-triggered command cannot interleave bytes
/// on the wire). The enable and drive flags track the last *commanded*
/// state; the protocol has no way to read the illumination state back.
pub struct Hl2000Driver {
    serial: SerialSettings,
    lamp: LampSettings,
    /// The serial session. This mutex is the lock serializing all wire
    /// traffic.
    io: Mutex<Option<Box<dyn Transport>>>,
    connected: AtomicBool,
    enabled: AtomicBool,
    drive_enabled: AtomicBool,
    cached: StdMutex<Cached>,
}

impl Hl2000Driver {
    /// Create a disconnected driver with the given settings.
    pub fn new(settings: &Settings) -> Self {
        Self {
            serial: settings.serial.clone(),
            lamp: settings.lamp.clone(),
            io: Mutex::new(None),
            connected: AtomicBool::new(false),
            enabled: AtomicBool::new(false),
            drive_enabled: AtomicBool::new(false),
            cached: StdMutex::new(Cached::default()),
        }
    }

    /// Open a serial session on `port` using the configured line settings.
    #[cfg(feature = "tokio_serial")]
    pub async fn connect(&self, port: &str) -> Result<()> {
        use crate::transport::SerialTransport;

        let transport = SerialTransport::builder(port, self.serial.baud_rate)
            .write_terminator(self.serial.write_terminator.clone())
            .read_terminator(self.serial.read_terminator)
            .timeout(self.serial.query_timeout)
            .open()?;

        self.connect_with(port, Box::new(transport)).await
    }

    /// Open a serial session on `port` using the configured line settings.
    #[cfg(not(feature = "tokio_serial"))]
    pub async fn connect(&self, _port: &str) -> Result<()> {
        Err(LampError::SerialFeatureDisabled)
    }

    /// Attach an already-open transport (used by tests and custom hosts).
    ///
    /// A previous session, if any, is torn down first; transports are
    /// never reused across sessions.
    pub async fn connect_with(&self, port: &str, transport: Box<dyn Transport>) -> Result<()> {
        if self.is_connected() {
            self.disconnect().await?;
        }

        {
            let mut io = self.io.lock().await;
            *io = Some(transport);
        }
        self.connected.store(true, Ordering::SeqCst);
        if let Ok(mut cached) = self.cached.lock() {
            cached.port_name = Some(port.to_string());
        }

        if let Some(velocity) = self.lamp.max_velocity {
            self.set_max_velocity(velocity).await?;
        }

        info!("lamp connected on '{}'", port);
        Ok(())
    }

    /// Tear down the session.
    ///
    /// Best-effort: illumination and drive electronics are disabled before
    /// the transport is dropped, but failures there are logged and do not
    /// keep the driver connected. Safe to call when already disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        if !self.is_connected() {
            debug!("disconnect requested while already disconnected");
            return Ok(());
        }

        // Never leave the lamp illuminated when communication is torn down.
        if let Err(e) = self.set_enabled(false).await {
            warn!("failed to disable illumination during disconnect: {}", e);
        }
        if let Err(e) = self.set_drive(false).await {
            warn!("failed to disable drive electronics during disconnect: {}", e);
        }

        {
            let mut io = self.io.lock().await;
            *io = None;
        }
        self.connected.store(false, Ordering::SeqCst);
        self.enabled.store(false, Ordering::SeqCst);
        self.drive_enabled.store(false, Ordering::SeqCst);
        if let Ok(mut cached) = self.cached.lock() {
            cached.firmware_version = None;
            cached.shutter_position = f64::NAN;
        }

        info!("lamp disconnected");
        Ok(())
    }

    /// Whether a serial session is open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Last commanded illumination state.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Last commanded drive-electronics state.
    pub fn is_drive_enabled(&self) -> bool {
        self.drive_enabled.load(Ordering::SeqCst)
    }

    /// Port the driver is (or was last) connected on.
    pub fn port_name(&self) -> Option<String> {
        self.cached
            .lock()
            .ok()
            .and_then(|cached| cached.port_name.clone())
    }

    /// Firmware identity from the most recent `VER` query, cleared on
    /// disconnect.
    pub fn firmware_version(&self) -> Option<String> {
        self.cached
            .lock()
            .ok()
            .and_then(|cached| cached.firmware_version.clone())
    }

    /// Shutter position from the most recent `POS` query, `NaN` before
    /// the first query of a session.
    pub fn last_shutter_position(&self) -> f64 {
        self.cached
            .lock()
            .map(|cached| cached.shutter_position)
            .unwrap_or(f64::NAN)
    }

    // -------------------------------------------------------------------
    // Setters
    // -------------------------------------------------------------------

    /// Switch the illumination on (`SO`) or off (`CO`).
    pub async fn set_enabled(&self, enable: bool) -> Result<()> {
        let command = if enable { "SO" } else { "CO" };
        self.send_command(command).await?;
        self.enabled.store(enable, Ordering::SeqCst);
        info!(
            "illumination {}",
            if enable { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Enable (`EN`) or disable (`DI`) the shutter drive electronics.
    ///
    /// Motion commands are no-ops on the device while the drive is
    /// disabled.
    pub async fn set_drive(&self, enable: bool) -> Result<()> {
        let command = if enable { "EN" } else { "DI" };
        self.send_command(command).await?;
        self.drive_enabled.store(enable, Ordering::SeqCst);
        debug!(
            "drive electronics {}",
            if enable { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Declare the current shutter position as home (`HO`), the zero
    /// reference for absolute moves.
    pub async fn set_home(&self) -> Result<()> {
        self.send_command("HO").await?;
        debug!("current shutter position set as home");
        Ok(())
    }

    /// Move the shutter to an absolute position relative to home.
    ///
    /// Ensures the drive electronics are enabled, loads the target
    /// (`LA<n>`) and triggers the move (`M`), pausing the configured
    /// settle delay after each command. The protocol has no
    /// motion-complete acknowledgement, so arrival is not confirmed.
    pub async fn set_shutter_position(&self, position: i32) -> Result<()> {
        self.set_drive(true).await?;
        self.send_command(&format!("LA{}", position)).await?;
        tokio::time::sleep(self.lamp.settle_delay).await;
        self.send_command("M").await?;
        tokio::time::sleep(self.lamp.settle_delay).await;
        debug!("shutter move to {} issued", position);
        Ok(())
    }

    /// Set the shutter's maximum velocity (`SP<n>`).
    pub async fn set_max_velocity(&self, velocity: u32) -> Result<()> {
        self.send_command(&format!("SP{}", velocity)).await?;
        debug!("max velocity set to {}", velocity);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Getters
    // -------------------------------------------------------------------

    /// Query the firmware identification string (`VER`).
    ///
    /// A valid reply contains [`VERSION_MARKER`].
    pub async fn get_firmware_version(&self) -> Result<String> {
        let version = self.query("VER").await?;
        if let Ok(mut cached) = self.cached.lock() {
            cached.firmware_version = Some(version.clone());
        }
        Ok(version)
    }

    /// Query and decode the fault flags (`GFS`).
    pub async fn get_fault_status(&self) -> Result<FaultStatus> {
        let reply = self.query("GFS").await?;
        let faults = FaultStatus::parse(&reply)?;
        if faults.is_clear() {
            debug!("no fault detected");
        } else {
            warn!("lamp fault(s) active: {:?}", faults);
        }
        Ok(faults)
    }

    /// Query the lightbulb coil temperature in °C (`TEM`).
    pub async fn get_coil_temperature(&self) -> Result<f64> {
        let reply = self.query("TEM").await?;
        parse_f64(&reply, "coil temperature in °C")
    }

    /// Query the current shutter position (`POS`).
    ///
    /// The transport discards "OK" echoes, so the payload here is the
    /// actual position line.
    pub async fn get_shutter_position(&self) -> Result<f64> {
        let reply = self.query("POS").await?;
        let position = parse_f64(&reply, "shutter position")?;
        if let Ok(mut cached) = self.cached.lock() {
            cached.shutter_position = position;
        }
        Ok(position)
    }

    /// Query and decode the motion-controller status word (`GST`).
    pub async fn get_motion_status(&self) -> Result<MotionStatus> {
        let reply = self.query("GST").await?;
        MotionStatus::parse(&reply)
    }

    /// Query the motion driver current in mA (`GRC`).
    pub async fn get_driver_current(&self) -> Result<f64> {
        let reply = self.query("GRC").await?;
        parse_f64(&reply, "driver current in mA")
    }

    /// Query the commanded shutter velocity (`GV`).
    pub async fn get_velocity(&self) -> Result<i32> {
        let reply = self.query("GV").await?;
        parse_i32(&reply, "commanded velocity")
    }

    /// Query the configured maximum shutter velocity (`GSP`).
    pub async fn get_max_velocity(&self) -> Result<i32> {
        let reply = self.query("GSP").await?;
        parse_i32(&reply, "maximum velocity")
    }

    // -------------------------------------------------------------------
    // Compound operations
    // -------------------------------------------------------------------

    /// Produce a telemetry snapshot.
    ///
    /// Disconnected drivers report the all-unknown snapshot. Connected
    /// drivers query firmware version, coil temperature, shutter position
    /// and driver current in sequence; if ANY query fails the partial
    /// results are discarded and the all-unknown snapshot is returned.
    /// Partial telemetry is worse than none for a safety-relevant
    /// enable status, so this method never mixes real and stale fields.
    pub async fn get_info(&self) -> LampStatus {
        if !self.is_connected() {
            return LampStatus::default();
        }

        match self.read_info().await {
            Ok(status) => status,
            Err(e) => {
                warn!("telemetry read failed, reporting unknown status: {}", e);
                LampStatus::default()
            }
        }
    }

    async fn read_info(&self) -> Result<LampStatus> {
        let firmware_version = self.get_firmware_version().await?;
        let coil_temperature_c = if self.lamp.supports_coil_temperature {
            self.get_coil_temperature().await?
        } else {
            f64::NAN
        };
        let shutter_position = self.get_shutter_position().await?;
        let driver_current_ma = if self.lamp.supports_driver_current {
            self.get_driver_current().await?
        } else {
            f64::NAN
        };

        Ok(LampStatus {
            firmware_version,
            is_connected: true,
            is_enabled: self.is_enabled(),
            coil_temperature_c,
            shutter_position,
            driver_current_ma,
        })
    }

    /// Reassert the last commanded illumination state if an observed
    /// snapshot disagrees with it.
    ///
    /// Intended to be called by the external telemetry poller each tick.
    /// Returns `true` when a correction was sent.
    pub async fn reconcile(&self, status: &LampStatus) -> Result<bool> {
        if !status.is_connected || !self.is_connected() {
            return Ok(false);
        }

        let commanded = self.is_enabled();
        if status.is_enabled != commanded {
            warn!(
                "lamp safety trip: observed enable state {} differs from commanded {}, reasserting",
                status.is_enabled, commanded
            );
            self.set_enabled(commanded).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Put the lamp into its safe startup configuration: illumination
    /// off, shutter parked at the configured closed position, and that
    /// position declared home.
    pub async fn apply_initial_state(&self) -> Result<()> {
        info!("applying initial lamp configuration");
        self.set_enabled(false).await?;
        self.set_shutter_position(self.lamp.closed_position).await?;
        self.set_home().await?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Wire helpers
    // -------------------------------------------------------------------

    async fn send_command(&self, command: &str) -> Result<()> {
        let mut io = self.io.lock().await;
        let transport = io.as_mut().ok_or(LampError::NotConnected)?;
        transport.command(command).await
    }

    async fn query(&self, command: &str) -> Result<String> {
        let mut io = self.io.lock().await;
        let transport = io.as_mut().ok_or(LampError::NotConnected)?;
        transport.query(command).await
    }
}

fn parse_f64(reply: &str, expected: &'static str) -> Result<f64> {
    reply.trim().parse::<f64>().map_err(|_| LampError::Parse {
        reply: reply.to_string(),
        expected,
    })
}

fn parse_i32(reply: &str, expected: &'static str) -> Result<i32> {
    reply.trim().parse::<i32>().map_err(|_| LampError::Parse {
        reply: reply.to_string(),
        expected,
    })
}
