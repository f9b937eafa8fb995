use std::time::Duration;

/// Window after start-up during which every raw line is mirrored.
pub const DEFAULT_WARMUP: Duration = Duration::from_millis(2000);

/// Why a raw line was mirrored to the diagnostic channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoReason {
    /// Arrived inside the warm-up window.
    Warmup,
    /// Matched no segment while debug mode is on.
    Unparsed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Echo {
    pub elapsed_ms: u64,
    pub reason: EchoReason,
    pub line: String,
}

/// The two independent per-line echo predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoPolicy {
    pub debug: bool,
    pub warmup: Duration,
}

impl EchoPolicy {
    pub fn new(debug: bool, warmup: Duration) -> Self {
        Self { debug, warmup }
    }

    /// Raw echo, independent of mode and of whether the line parsed.
    pub fn echo_raw(&self, elapsed: Duration) -> bool {
        elapsed < self.warmup
    }

    /// Diagnostic echo of a line that produced no segments.
    pub fn echo_unmatched(&self, matched: bool) -> bool {
        self.debug && !matched
    }

    /// Echo reasons for one line, in emission order.
    pub fn reasons(&self, elapsed: Duration, matched: bool) -> Vec<EchoReason> {
        let mut out = Vec::with_capacity(2);
        if self.echo_raw(elapsed) {
            out.push(EchoReason::Warmup);
        }
        if self.echo_unmatched(matched) {
            out.push(EchoReason::Unparsed);
        }
        out
    }
}

impl Default for EchoPolicy {
    fn default() -> Self {
        Self::new(false, DEFAULT_WARMUP)
    }
}
