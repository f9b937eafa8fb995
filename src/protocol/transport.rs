//! Line-oriented serial transport.
//!
//! The driver only ever talks to the [`Transport`] trait: a raw write and a
//! `read_line` bounded by a caller-supplied timeout. [`SerialTransport`] is the
//! real implementation on top of `serialport`.

use std::{
    io::{ErrorKind, Read, Write},
    time::{Duration, Instant},
};

use thiserror::Error;

/// A pending chunk without newline longer than this is released as a line.
pub const MAX_LINE_LEN: usize = 4096;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to open port {port}: {source}")]
    Connection {
        port: String,
        source: serialport::Error,
    },
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Transport {
    /// Send raw bytes. No retries.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Next newline-terminated chunk without its line ending, or `None` once
    /// `timeout` has passed without a complete line.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, TransportError>;
}

/// Accumulates raw bytes and hands out complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn take_line(&mut self) -> Option<String> {
        let end = match self.pending.iter().position(|b| *b == b'\n') {
            Some(pos) => pos + 1,
            None if self.pending.len() > MAX_LINE_LEN => self.pending.len(),
            None => return None,
        };
        let raw: Vec<u8> = self.pending.drain(..end).collect();
        let text = String::from_utf8_lossy(&raw);
        Some(text.trim_end_matches(['\r', '\n']).to_string())
    }
}

pub struct SerialTransport {
    port_name: String,
    port: Box<dyn serialport::SerialPort>,
    buffer: LineBuffer,
}

impl SerialTransport {
    /// Open `port` at `baud`; fails with [`TransportError::Connection`].
    pub fn open(port: &str, baud: u32, read_timeout: Duration) -> Result<Self, TransportError> {
        let handle = crate::api::utils::open_serial_port(port, baud, read_timeout)?;
        log::info!("Opened serial port {port} at {baud} baud");
        Ok(Self {
            port_name: port.to_string(),
            port: handle,
            buffer: LineBuffer::new(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        log::trace!("{} <- {:?}", self.port_name, String::from_utf8_lossy(bytes));
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, TransportError> {
        if let Some(line) = self.buffer.take_line() {
            return Ok(Some(line));
        }

        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 256];
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            self.port.set_timeout(deadline - now)?;
            match self.port.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    self.buffer.extend(&chunk[..n]);
                    if let Some(line) = self.buffer.take_line() {
                        log::trace!("{} -> {:?}", self.port_name, line);
                        return Ok(Some(line));
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(None)
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
