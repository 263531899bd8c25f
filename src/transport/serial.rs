//! Real serial transport over `tokio-serial`.
//!
//! Line settings follow the instrument: 8 data bits, no parity, 1 stop
//! bit, no flow control. Baud rate, terminators and the per-query timeout
//! come from the builder so the same transport covers the CR/LF and
//! bare-CR firmware variants.

use super::{is_ack, Transport};
use crate::error::{LampError, Result};
use async_trait::async_trait;
use log::{debug, trace};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::Instant;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Serial channel to the lamp with line-level framing.
pub struct SerialTransport {
    reader: BufReader<SerialStream>,
    port_name: String,
    write_terminator: String,
    read_delimiter: u8,
    timeout: Duration,
}

/// Builder for [`SerialTransport`].
pub struct SerialTransportBuilder {
    port_name: String,
    baud_rate: u32,
    write_terminator: String,
    read_delimiter: u8,
    timeout: Duration,
}

impl SerialTransportBuilder {
    /// Start a builder for the given port and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            write_terminator: "\r\n".to_string(),
            read_delimiter: b'\n',
            timeout: Duration::from_millis(500),
        }
    }

    /// Terminator appended to outgoing command lines.
    pub fn write_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.write_terminator = terminator.into();
        self
    }

    /// Character that ends an incoming reply line.
    pub fn read_terminator(mut self, terminator: char) -> Self {
        self.read_delimiter = terminator as u8;
        self
    }

    /// Overall per-query reply budget.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Open the port and build the transport.
    ///
    /// Fails with [`LampError::Connection`] when the port cannot be
    /// claimed.
    pub fn open(self) -> Result<SerialTransport> {
        let stream = tokio_serial::new(&self.port_name, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| LampError::Connection {
                port: self.port_name.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            "serial port '{}' opened at {} baud",
            self.port_name, self.baud_rate
        );

        Ok(SerialTransport {
            reader: BufReader::new(stream),
            port_name: self.port_name,
            write_terminator: self.write_terminator,
            read_delimiter: self.read_delimiter,
            timeout: self.timeout,
        })
    }
}

impl SerialTransport {
    /// Builder with the instrument's 8N1 line settings.
    pub fn builder(port_name: impl Into<String>, baud_rate: u32) -> SerialTransportBuilder {
        SerialTransportBuilder::new(port_name, baud_rate)
    }

    /// Name of the underlying port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    async fn write_line(&mut self, command: &str) -> Result<()> {
        let line = format!("{}{}", command, self.write_terminator);
        let stream = self.reader.get_mut();
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await?;
        trace!("[{}] sent: {}", self.port_name, command);
        Ok(())
    }

    /// Read one reply line before `deadline`, terminators stripped.
    async fn read_line(&mut self, deadline: Instant) -> Result<String> {
        let mut buf = Vec::new();
        let read = tokio::time::timeout_at(
            deadline,
            self.reader.read_until(self.read_delimiter, &mut buf),
        )
        .await;

        match read {
            Err(_) => Err(LampError::Timeout(self.timeout)),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(0)) => Err(LampError::Protocol(
                "unexpected EOF from serial port".to_string(),
            )),
            Ok(Ok(_)) => {
                let line = String::from_utf8_lossy(&buf).trim().to_string();
                trace!("[{}] received: {}", self.port_name, line);
                Ok(line)
            }
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn command(&mut self, command: &str) -> Result<()> {
        self.write_line(command).await?;
        // Give the controller time to consume the line before the next
        // command lands on the wire.
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(())
    }

    async fn query(&mut self, command: &str) -> Result<String> {
        self.write_line(command).await?;

        // One deadline covers the whole exchange, including any
        // acknowledgement echoes that precede the payload.
        let deadline = Instant::now() + self.timeout;
        loop {
            let line = self.read_line(deadline).await?;
            if is_ack(&line) {
                debug!(
                    "[{}] discarding acknowledgement echo before '{}' payload",
                    self.port_name, command
                );
                continue;
            }
            return Ok(line);
        }
    }
}
