//! Custom error types for the lamp driver.
//!
//! This module defines the primary error type, [`LampError`], for the whole
//! crate. Using the `thiserror` crate, it provides a centralized and
//! consistent way to classify the failures a serial instrument session can
//! produce:
//!
//! - **`Connection`**: the serial port could not be opened or claimed.
//! - **`Enumeration`**: the host's serial port list could not be read.
//! - **`Timeout`**: the device produced no reply within the per-query budget.
//! - **`Parse`**: a reply arrived but does not have the expected numeric or
//!   bit-field shape.
//! - **`Protocol`**: the device sent an unexpected token (e.g. a malformed
//!   fault bit string or an early EOF).
//! - **`NotConnected`**: a command was issued before `connect()`.
//! - **`Io`**: wraps `std::io::Error` from the underlying transport.
//! - **`Config`**: wraps errors from the `config` crate when loading the
//!   settings file.
//! - **`SerialFeatureDisabled`**: the crate was built without the serial
//!   feature and a real-hardware code path was reached.
//!
//! Every driver operation returns [`Result`]; nothing is swallowed at the
//! transport boundary. The two documented exceptions live in the driver:
//! `get_info()` collapses any telemetry failure into an all-unknown
//! snapshot, and `disconnect()` proceeds best-effort.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, LampError>;

/// Error taxonomy for lamp communication and configuration.
#[derive(Error, Debug)]
pub enum LampError {
    /// The serial port could not be opened or claimed.
    #[error("failed to open serial port '{port}': {reason}")]
    Connection {
        /// Port identifier that was being opened.
        port: String,
        /// Underlying failure reported by the serial stack.
        reason: String,
    },

    /// The host's serial port list could not be enumerated.
    #[error("failed to enumerate serial ports: {0}")]
    Enumeration(String),

    /// No reply arrived within the per-query timeout budget.
    #[error("no reply from lamp within {0:?}")]
    Timeout(Duration),

    /// A reply arrived but could not be parsed into the expected shape.
    #[error("cannot parse reply '{reply}' as {expected}")]
    Parse {
        /// The raw reply line, terminators stripped.
        reply: String,
        /// Human-readable description of the expected shape.
        expected: &'static str,
    },

    /// The device sent an unexpected token.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A command was issued while no serial session is open.
    #[error("lamp is not connected")]
    NotConnected,

    /// I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file error.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Serial support was not compiled in.
    #[error("serial support not enabled. Rebuild with --features tokio_serial")]
    SerialFeatureDisabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_names_the_port() {
        let err = LampError::Connection {
            port: "/dev/ttyUSB3".to_string(),
            reason: "device busy".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/dev/ttyUSB3"));
        assert!(msg.contains("device busy"));
    }

    #[test]
    fn parse_error_keeps_the_raw_reply() {
        let err = LampError::Parse {
            reply: "OK".to_string(),
            expected: "floating point temperature",
        };
        assert!(err.to_string().contains("'OK'"));
        assert!(err.to_string().contains("floating point temperature"));
    }

    #[test]
    fn timeout_reports_budget() {
        let err = LampError::Timeout(Duration::from_millis(500));
        assert!(err.to_string().contains("500ms"));
    }
}
