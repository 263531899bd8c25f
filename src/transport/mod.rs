//! Line-oriented transport abstraction for the lamp's serial link.
//!
//! The driver talks to the instrument through the [`Transport`] trait so
//! the same command logic runs against real hardware
//! ([`SerialTransport`], behind the `tokio_serial` feature) and against the
//! scripted [`MockTransport`] used in tests.
//!
//! ## Acknowledgement quirk
//!
//! After certain commands the device echoes a bare "OK" line before the
//! actual answer. Every `Transport::query` implementation must discard
//! consecutive acknowledgement-only lines and return the first substantive
//! payload line, bounded by the per-query timeout, so callers never see
//! the echo instead of the data.

mod mock;
#[cfg(feature = "tokio_serial")]
mod serial;

pub use mock::MockTransport;
#[cfg(feature = "tokio_serial")]
pub use serial::{SerialTransport, SerialTransportBuilder};

use crate::error::Result;
use async_trait::async_trait;

/// Acknowledgement token the device may echo before a payload line.
pub const ACK: &str = "OK";

/// True when a reply line is an acknowledgement echo rather than payload.
pub fn is_ack(line: &str) -> bool {
    line.trim() == ACK
}

/// A line-oriented command/reply channel to the instrument.
///
/// Implementations append the write terminator to outgoing commands and
/// strip terminators from replies. Dropping a transport releases the
/// underlying handle.
#[async_trait]
pub trait Transport: Send {
    /// Send a command line without expecting a reply.
    async fn command(&mut self, command: &str) -> Result<()>;

    /// Send a command line and return the first substantive reply line,
    /// with acknowledgement echoes discarded (see module docs).
    async fn query(&mut self, command: &str) -> Result<String>;
}
