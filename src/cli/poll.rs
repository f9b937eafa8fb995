use anyhow::{Context, Result};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use super::config::PollConfig;
use crate::{
    api::poll::{ConsoleSink, CycleSink, LogFileSink, MonotonicClock, PollDriver, RunSummary},
    protocol::transport::SerialTransport,
    utils::ports::enumerate_ports,
};

/// Print the available serial ports, one per line.
pub fn handle_list_ports() -> Result<()> {
    let ports = enumerate_ports();
    if ports.is_empty() {
        log::info!("No serial ports found");
    }
    for (name, kind) in ports {
        println!("{name}\t{kind}");
    }
    Ok(())
}

/// Raise `stop` on Ctrl-C. A second Ctrl-C is ignored; the loop notices the
/// flag within one read timeout.
pub fn install_interrupt_handler(stop: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        if !stop.swap(true, Ordering::SeqCst) {
            log::info!("Interrupt received, stopping");
        }
    })
    .context("Failed to install Ctrl-C handler")
}

/// Open the port and the sinks described by `config`, then poll until
/// interrupted.
pub fn handle_poll(config: &PollConfig) -> Result<RunSummary> {
    let clock = MonotonicClock::new();
    let stop = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(stop.clone())?;

    let port = config.port.as_deref().unwrap_or_default();
    let settings = config.settings();

    let transport = SerialTransport::open(port, config.baud_rate, settings.read_timeout)?;

    let mut sinks: Vec<Box<dyn CycleSink>> = vec![Box::new(ConsoleSink::stdout())];
    if let Some(path) = &config.log_file {
        sinks.push(Box::new(LogFileSink::open(path, &config.layout())?));
    }

    log::info!(
        "Polling {} every {} ms ({})",
        transport.port_name(),
        config.interval_ms,
        match &config.request {
            Some(request) => format!("custom request {request:?}"),
            None => format!(
                "cells {}",
                config
                    .cells
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
        }
    );

    let mut driver = PollDriver::new(
        transport,
        clock,
        config.plan(),
        config.cells.clone(),
        settings,
        stop,
    )
    .with_sinks(sinks);
    driver.run()
}
