//! Mock transport for testing the driver without hardware.
//!
//! Replies are scripted per command as a queue of lines. `query` applies
//! the same acknowledgement-discard rule as the real transport, so tests
//! can reproduce the device echoing "OK" before a payload. The last
//! scripted line is sticky: repeated queries keep returning it, which
//! keeps polling tests short.
//!
//! # Example
//!
//! ```
//! use hl2000_lamp::transport::{MockTransport, Transport};
//!
//! # tokio_test::block_on(async {
//! let mut mock = MockTransport::new().with_reply("VER", "Version 1.2");
//! let reply = mock.query("VER").await.unwrap();
//! assert_eq!(reply, "Version 1.2");
//! assert_eq!(mock.sent_commands(), vec!["VER".to_string()]);
//! # })
//! ```

use super::{is_ack, Transport};
use crate::error::{LampError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Timeout value reported when a scripted reply is missing.
const MOCK_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Default)]
struct MockInner {
    replies: Mutex<HashMap<String, VecDeque<String>>>,
    sent: Mutex<Vec<String>>,
    fail_next: AtomicBool,
}

/// Scripted test double for [`Transport`].
///
/// Clones share state, so a test can keep a handle for inspection after
/// moving a boxed clone into the driver.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

impl MockTransport {
    /// Create a mock with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a single reply line for a command.
    pub fn with_reply(self, command: &str, reply: &str) -> Self {
        self.push_reply(command, reply);
        self
    }

    /// Script a sequence of reply lines for a command, returned one per
    /// read (acknowledgement lines are skipped by `query`).
    pub fn with_reply_lines(self, command: &str, lines: &[&str]) -> Self {
        for line in lines {
            self.push_reply(command, line);
        }
        self
    }

    /// Append one reply line for a command after construction.
    pub fn push_reply(&self, command: &str, reply: &str) {
        let mut replies = lock_unpoisoned(&self.inner.replies);
        replies
            .entry(command.to_string())
            .or_default()
            .push_back(reply.to_string());
    }

    /// Make the next operation fail with a broken-pipe I/O error.
    pub fn trigger_failure(&self) {
        self.inner.fail_next.store(true, Ordering::SeqCst);
    }

    /// All command lines sent so far, in order.
    pub fn sent_commands(&self) -> Vec<String> {
        lock_unpoisoned(&self.inner.sent).clone()
    }

    /// Forget recorded commands.
    pub fn clear_sent_commands(&self) {
        lock_unpoisoned(&self.inner.sent).clear();
    }

    fn record(&self, command: &str) -> Result<()> {
        lock_unpoisoned(&self.inner.sent).push(command.to_string());
        if self.inner.fail_next.swap(false, Ordering::SeqCst) {
            return Err(LampError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock transport failure",
            )));
        }
        Ok(())
    }

    /// Pop reply lines for `command` until a non-acknowledgement line.
    ///
    /// The final line stays in the queue so repeated queries keep
    /// answering; a queue that never yields a payload reports a timeout,
    /// like a device that only ever acknowledges.
    fn next_payload(&self, command: &str) -> Result<String> {
        let mut replies = lock_unpoisoned(&self.inner.replies);
        let queue = replies
            .get_mut(command)
            .ok_or(LampError::Timeout(MOCK_TIMEOUT))?;

        loop {
            let line = if queue.len() > 1 {
                match queue.pop_front() {
                    Some(line) => line,
                    None => return Err(LampError::Timeout(MOCK_TIMEOUT)),
                }
            } else {
                match queue.front() {
                    Some(line) => line.clone(),
                    None => return Err(LampError::Timeout(MOCK_TIMEOUT)),
                }
            };

            if !is_ack(&line) {
                return Ok(line);
            }
            if queue.len() <= 1 {
                // Only an acknowledgement left; the device never sends a
                // real payload.
                return Err(LampError::Timeout(MOCK_TIMEOUT));
            }
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn command(&mut self, command: &str) -> Result<()> {
        self.record(command)
    }

    async fn query(&mut self, command: &str) -> Result<String> {
        self.record(command)?;
        self.next_payload(command)
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_reply_round_trip() {
        let mut mock = MockTransport::new().with_reply("VER", "Version 1.2");
        assert_eq!(mock.query("VER").await.unwrap(), "Version 1.2");
        assert_eq!(mock.sent_commands(), vec!["VER".to_string()]);
    }

    #[tokio::test]
    async fn query_discards_acknowledgement_lines() {
        let mut mock = MockTransport::new().with_reply_lines("POS", &["OK", "OK", "-400"]);
        assert_eq!(mock.query("POS").await.unwrap(), "-400");
        // Sticky last line keeps answering.
        assert_eq!(mock.query("POS").await.unwrap(), "-400");
    }

    #[tokio::test]
    async fn query_times_out_when_device_only_acknowledges() {
        let mut mock = MockTransport::new().with_reply("POS", "OK");
        assert!(matches!(
            mock.query("POS").await,
            Err(LampError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn unscripted_query_times_out() {
        let mut mock = MockTransport::new();
        assert!(matches!(
            mock.query("TEM").await,
            Err(LampError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn triggered_failure_is_one_shot() {
        let mut mock = MockTransport::new();
        mock.trigger_failure();
        assert!(mock.command("SO").await.is_err());
        assert!(mock.command("CO").await.is_ok());
        assert_eq!(
            mock.sent_commands(),
            vec!["SO".to_string(), "CO".to_string()]
        );
    }

    #[tokio::test]
    async fn clones_share_state() {
        let mock = MockTransport::new().with_reply("GRC", "125.5");
        let mut boxed: Box<dyn Transport> = Box::new(mock.clone());
        assert_eq!(boxed.query("GRC").await.unwrap(), "125.5");
        assert_eq!(mock.sent_commands(), vec!["GRC".to_string()]);
    }
}
