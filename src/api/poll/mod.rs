pub mod clock;
pub mod core;
pub mod cycle;
pub mod scripted;
pub mod sinks;
pub mod traits;

pub use clock::{ManualClock, MonotonicClock};
pub use core::{DriverState, PollDriver, PollSettings, RunSummary};
pub use cycle::{CellReading, CycleRow, PollCycle, RowLayout, RowValues, DEFAULT_VALUE};
pub use scripted::ScriptedTransport;
pub use sinks::{ConsoleSink, LogFileSink};
pub use traits::{Clock, CycleSink};
