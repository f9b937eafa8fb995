//! Seams of the poll loop: where rows go and where time comes from.
//!
//! Both are traits so the driver can run against an in-memory transport and a
//! manual clock in tests, the same way it runs against a real port.
use anyhow::Result;
use std::time::Duration;

use super::CycleRow;
use crate::protocol::cell::echo::Echo;

/// Passive consumer of the driver's output.
pub trait CycleSink {
    /// Called once per completed cycle, never for a discarded one.
    fn on_cycle(&mut self, row: &CycleRow) -> Result<()>;

    /// Called for every raw line mirrored by the echo policy.
    fn on_echo(&mut self, _echo: &Echo) -> Result<()> {
        Ok(())
    }

    /// Called exactly once when the driver stops, whatever the reason.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Time since the driver's epoch, plus a way to wait.
pub trait Clock {
    fn elapsed(&self) -> Duration;

    fn sleep(&self, duration: Duration);

    fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }
}
