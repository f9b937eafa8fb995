use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use super::clock::ManualClock;
use crate::protocol::transport::{Transport, TransportError};

/// In-memory transport replaying inbound lines on a [`ManualClock`] timeline.
///
/// Reads advance the shared clock: a read returns the next line once its
/// release time is reached, otherwise it moves time forward by the timeout.
/// Used to drive the poll loop deterministically in tests and dry runs.
#[derive(Debug)]
pub struct ScriptedTransport {
    clock: ManualClock,
    inbound: VecDeque<(u64, String)>,
    written: Vec<(u64, Vec<u8>)>,
    interrupt: Option<(u64, Arc<AtomicBool>)>,
}

impl ScriptedTransport {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            inbound: VecDeque::new(),
            written: Vec::new(),
            interrupt: None,
        }
    }

    /// Queue `line` to become readable at `at_ms`. Lines must be queued in
    /// time order.
    pub fn line_at(mut self, at_ms: u64, line: impl Into<String>) -> Self {
        self.inbound.push_back((at_ms, line.into()));
        self
    }

    /// Raise `flag` on the first read or write at or after `at_ms`.
    pub fn interrupt_at(mut self, at_ms: u64, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some((at_ms, flag));
        self
    }

    /// Every write with the clock time it happened at.
    pub fn written(&self) -> &[(u64, Vec<u8>)] {
        &self.written
    }

    pub fn written_text(&self) -> Vec<String> {
        self.written
            .iter()
            .map(|(_, bytes)| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }

    fn fire_interrupt(&self) {
        if let Some((at, flag)) = &self.interrupt {
            if self.clock.now_ms() >= *at {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.written.push((self.clock.now_ms(), bytes.to_vec()));
        self.fire_interrupt();
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, TransportError> {
        let now = self.clock.now_ms();
        let mut wake = now + timeout.as_millis() as u64;
        if let Some((ready, _)) = self.inbound.front() {
            wake = wake.min((*ready).max(now));
        }
        if let Some((at, _)) = &self.interrupt {
            if *at > now {
                wake = wake.min(*at);
            }
        }
        self.clock.advance_to(wake);
        self.fire_interrupt();

        match self.inbound.front() {
            Some((ready, _)) if *ready <= self.clock.now_ms() => {
                Ok(self.inbound.pop_front().map(|(_, line)| line))
            }
            _ => Ok(None),
        }
    }
}
