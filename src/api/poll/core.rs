//! The poll loop.
//!
//! One driver owns one transport, the clock that defines "program start", the
//! request plan, and every sink. It runs a single sequential loop:
//!
//! - Idle: echo raw lines for the warm-up window
//! - Sending: write each request frame, pausing `request_gap` between frames
//! - Collecting: read and parse lines until the next cycle is due
//!
//! A stop flag is checked before every write, wait and read. Stopping drops
//! the cycle in progress and closes every sink.
use anyhow::{Context, Result};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use super::{
    cycle::{CycleRow, PollCycle},
    traits::{Clock, CycleSink},
};
use crate::protocol::{
    cell::{
        echo::{Echo, EchoPolicy, EchoReason},
        request::RequestPlan,
        response::parse_line,
        CellSpec,
    },
    transport::Transport,
};

const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Timing and diagnostics knobs of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub request_gap: Duration,
    pub read_timeout: Duration,
    pub warmup: Duration,
    pub debug: bool,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            request_gap: Duration::from_millis(20),
            read_timeout: Duration::from_millis(50),
            warmup: crate::protocol::cell::echo::DEFAULT_WARMUP,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Sending,
    Collecting,
    Stopped,
}

/// Totals reported when the driver stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub lines: u64,
    pub unparsed_lines: u64,
}

pub struct PollDriver<T: Transport, C: Clock> {
    transport: T,
    clock: C,
    plan: RequestPlan,
    cells: Vec<CellSpec>,
    settings: PollSettings,
    echo: EchoPolicy,
    sinks: Vec<Box<dyn CycleSink>>,
    stop: Arc<AtomicBool>,
    state: DriverState,
    summary: RunSummary,
}

impl<T: Transport, C: Clock> PollDriver<T, C> {
    pub fn new(
        transport: T,
        clock: C,
        plan: RequestPlan,
        cells: Vec<CellSpec>,
        settings: PollSettings,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            clock,
            plan,
            cells,
            echo: EchoPolicy::new(settings.debug, settings.warmup),
            settings,
            sinks: Vec::new(),
            stop,
            state: DriverState::Idle,
            summary: RunSummary::default(),
        }
    }

    pub fn add_sink(mut self, sink: impl CycleSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_sinks(mut self, sinks: Vec<Box<dyn CycleSink>>) -> Self {
        self.sinks.extend(sinks);
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Run until the stop flag is raised or the transport fails.
    ///
    /// Sinks are closed on both paths; a transport error takes precedence over
    /// a close error.
    pub fn run(&mut self) -> Result<RunSummary> {
        let outcome = self.run_cycles();
        self.state = DriverState::Stopped;
        let closed = self.close_sinks();
        outcome?;
        closed?;
        log::info!(
            "Polling stopped after {} cycles ({} lines, {} unparsed)",
            self.summary.cycles,
            self.summary.lines,
            self.summary.unparsed_lines
        );
        Ok(self.summary)
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn run_cycles(&mut self) -> Result<()> {
        let started = self.clock.elapsed();
        if !self.warm_up()? {
            return Ok(());
        }

        // Cycle k is due k intervals after the end of warm-up.
        let mut next_start = started.max(self.settings.warmup);
        loop {
            if self.stopped() {
                return Ok(());
            }

            let cycle_start = next_start;
            next_start = cycle_start + self.settings.interval;
            let mut cycle = if self.plan.is_custom() {
                PollCycle::for_custom(cycle_start.as_millis() as u64)
            } else {
                PollCycle::for_cells(cycle_start.as_millis() as u64, &self.cells)
            };

            self.state = DriverState::Sending;
            if !self.send_requests()? {
                log::debug!("Stop requested while sending, dropping cycle at {} ms", cycle.started_ms());
                return Ok(());
            }

            self.state = DriverState::Collecting;
            if !self.collect_until(next_start, &mut cycle)? {
                log::debug!("Stop requested while collecting, dropping cycle at {} ms", cycle.started_ms());
                return Ok(());
            }

            let row = cycle.finish();
            self.emit_row(&row)?;
            next_start = self.skip_missed_slots(next_start);
        }
    }

    /// Moves `due` forward by whole intervals so that it is never a full
    /// interval behind the clock. Skipped slots produce no row.
    fn skip_missed_slots(&self, due: Duration) -> Duration {
        let now = self.clock.elapsed();
        let interval = self.settings.interval.as_nanos();
        if interval == 0 || now < due {
            return due;
        }
        let missed = (now - due).as_nanos() / interval;
        if missed == 0 {
            return due;
        }
        log::warn!(
            "Cycle overran by {} ms, skipping {missed} slot(s)",
            (now - due).as_millis()
        );
        due + self.settings.interval * missed as u32
    }

    /// Idle phase. Returns `false` if stopped.
    fn warm_up(&mut self) -> Result<bool> {
        self.state = DriverState::Idle;
        if self.settings.warmup.is_zero() {
            return Ok(!self.stopped());
        }

        log::info!(
            "Initial wait {} ms, echoing raw incoming data",
            self.settings.warmup.as_millis()
        );
        loop {
            if self.stopped() {
                return Ok(false);
            }
            let now = self.clock.elapsed();
            if now >= self.settings.warmup {
                break;
            }
            let timeout = (self.settings.warmup - now).min(self.settings.read_timeout);
            if let Some(line) = self.read_line(timeout)? {
                self.handle_line(&line, None)?;
            }
        }
        log::info!("Warm-up finished, polling starts");
        Ok(true)
    }

    /// Returns `false` if stopped before every frame went out.
    fn send_requests(&mut self) -> Result<bool> {
        let frames = self.plan.frames();
        let count = frames.len();
        for (index, frame) in frames.into_iter().enumerate() {
            if self.stopped() {
                return Ok(false);
            }
            self.transport
                .write(&frame)
                .context("Failed to write request")?;
            if index + 1 < count && !self.settings.request_gap.is_zero() {
                self.clock.sleep(self.settings.request_gap);
            }
        }
        Ok(true)
    }

    /// Returns `false` if stopped before `deadline`.
    fn collect_until(&mut self, deadline: Duration, cycle: &mut PollCycle) -> Result<bool> {
        loop {
            if self.stopped() {
                return Ok(false);
            }
            let now = self.clock.elapsed();
            if now >= deadline {
                return Ok(true);
            }
            let timeout = (deadline - now).min(self.settings.read_timeout);
            if let Some(line) = self.read_line(timeout)? {
                self.handle_line(&line, Some(&mut *cycle))?;
            }
        }
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        self.transport
            .read_line(timeout.max(MIN_READ_TIMEOUT))
            .context("Failed to read from transport")
    }

    /// Echo, then parse. `cycle` is `None` while idle.
    fn handle_line(&mut self, line: &str, cycle: Option<&mut PollCycle>) -> Result<()> {
        let elapsed = self.clock.elapsed();
        if line.trim().is_empty() {
            // Blank lines are mirrored during warm-up but never parsed.
            if self.echo.echo_raw(elapsed) {
                self.emit_echo(elapsed, EchoReason::Warmup, line)?;
            }
            return Ok(());
        }
        self.summary.lines += 1;

        let responses = parse_line(line);
        if responses.is_empty() {
            self.summary.unparsed_lines += 1;
        }

        for reason in self.echo.reasons(elapsed, !responses.is_empty()) {
            self.emit_echo(elapsed, reason, line)?;
        }

        if let Some(cycle) = cycle {
            for response in responses {
                let cell = response.cell;
                if !cycle.record(response) {
                    log::debug!("Ignoring response for unrequested cell {cell}");
                }
            }
        }
        Ok(())
    }

    fn emit_echo(&mut self, elapsed: Duration, reason: EchoReason, line: &str) -> Result<()> {
        let echo = Echo {
            elapsed_ms: elapsed.as_millis() as u64,
            reason,
            line: line.to_string(),
        };
        for sink in self.sinks.iter_mut() {
            sink.on_echo(&echo)?;
        }
        Ok(())
    }

    fn emit_row(&mut self, row: &CycleRow) -> Result<()> {
        for sink in self.sinks.iter_mut() {
            sink.on_cycle(row)?;
        }
        self.summary.cycles += 1;
        Ok(())
    }

    fn close_sinks(&mut self) -> Result<()> {
        let mut first_error = None;
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.close() {
                log::warn!("Failed to close sink: {e:#}");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
