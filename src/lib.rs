//! Cellpoll: serial poller for numbered sensor cells
//!
//! A device on the other end of a serial link answers `?<addr>` queries with
//! lines like `$<addr>:<value>,<crc8>`. This crate sends those queries on a
//! fixed cadence, parses whatever comes back, and hands one row per cycle to
//! the console and an optional CSV log.
//!
//! - [`protocol`]: cell addressing, request/response text codecs, transport
//! - [`api::poll`]: the poll loop, cycle aggregation and sinks
//! - [`cli`]: argument parsing, configuration layering and the binary's entry points

pub mod api;
#[doc(hidden)]
pub mod cli;
pub mod protocol;
#[doc(hidden)]
pub mod utils;

pub use api::poll::{
    ConsoleSink, CycleRow, CycleSink, LogFileSink, PollDriver, PollSettings, RowLayout,
};
pub use protocol::{
    cell::{request::RequestPlan, response::parse_line, CellId, CellSpec},
    transport::{SerialTransport, Transport, TransportError},
};
