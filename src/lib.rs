//! # HL-2000-HP-232R Lamp Driver
//!
//! Driver library for the Ocean Optics HL-2000-HP-232R halogen lamp with
//! motorized shutter, speaking its line-oriented ASCII protocol over a
//! serial/USB link. The `lamp-ctl` binary provides a command-line control
//! panel on top of this library.
//!
//! ## Crate Structure
//!
//! - **`config`**: typed settings loaded from TOML (serial line
//!   parameters, settle delay, telemetry support flags). See
//!   `config::Settings`.
//! - **`discovery`**: scans the host's serial ports for lamps by probing
//!   with the firmware-version query; filters out wireless ports.
//! - **`error`**: the central `LampError` taxonomy (connection, timeout,
//!   parse, protocol); every fallible operation returns a typed result.
//! - **`lamp`**: the `Hl2000Driver` itself: session lifecycle, typed
//!   command surface, fail-atomic telemetry snapshots, and the
//!   enable-state reconciliation step for pollers.
//! - **`status`**: immutable `LampStatus` snapshot plus the parsed
//!   `GFS`/`GST` bit-field types.
//! - **`transport`**: the line-level `Transport` trait with the real
//!   serial implementation and a scripted mock for tests.

pub mod config;
#[cfg(feature = "instrument_serial")]
pub mod discovery;
pub mod error;
pub mod lamp;
pub mod status;
pub mod transport;

pub use error::{LampError, Result};
pub use lamp::Hl2000Driver;
pub use status::LampStatus;
