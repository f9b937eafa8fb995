//! Console and log-file sinks.

use anyhow::{anyhow, bail, Context, Result};
use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use super::{
    cycle::{CycleRow, RowLayout},
    traits::CycleSink,
};
use crate::protocol::cell::echo::{Echo, EchoReason};

/// Human-readable output: one line per cycle plus echoed raw lines.
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> CycleSink for ConsoleSink<W> {
    fn on_cycle(&mut self, row: &CycleRow) -> Result<()> {
        writeln!(self.out, "[{} ms] {}", row.timestamp_ms, row.summary())?;
        self.out.flush()?;
        Ok(())
    }

    fn on_echo(&mut self, echo: &Echo) -> Result<()> {
        match echo.reason {
            EchoReason::Warmup => writeln!(self.out, "[RAW] {}", echo.line)?,
            EchoReason::Unparsed => writeln!(self.out, "[DEBUG] Unparsed raw: {:?}", echo.line)?,
        }
        self.out.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Append-only comma-separated log.
///
/// The header is written only when the file is new or empty, so restarting a
/// run keeps appending to the same table. An existing file whose header does
/// not match this run's columns is refused.
pub struct LogFileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl LogFileSink {
    pub fn open(path: impl AsRef<Path>, layout: &RowLayout) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let header = layout.header();

        let existing_header = match fs::metadata(&path) {
            Ok(meta) if meta.len() > 0 => Some(read_first_line(&path)?),
            _ => None,
        };
        if let Some(found) = &existing_header {
            if *found != header {
                bail!(
                    "Log file '{}' has header '{found}', this run writes '{header}'",
                    path.display()
                );
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot open log file '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);

        if existing_header.is_none() {
            writeln!(writer, "{header}")?;
            writer.flush()?;
            log::info!("Created log file {}", path.display());
        } else {
            log::info!("Appending to log file {}", path.display());
        }

        Ok(Self {
            path,
            writer: Some(writer),
        })
    }
}

fn read_first_line(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("Cannot read log file '{}'", path.display()))?;
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

impl CycleSink for LogFileSink {
    fn on_cycle(&mut self, row: &CycleRow) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow!("Log file {} already closed", self.path.display()))?;
        writeln!(writer, "{}", row.csv_line())?;
        writer.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            log::debug!("Closed log file {}", self.path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::poll::cycle::PollCycle,
        protocol::cell::{response::ParsedResponse, CellId, CellSpec},
    };

    fn cells() -> Vec<CellSpec> {
        vec![
            CellSpec::named("temp", CellId::new(1).unwrap()),
            CellSpec::new(CellId::new(2).unwrap()),
        ]
    }

    fn row(ts: u64, temp: Option<&str>) -> CycleRow {
        let mut cycle = PollCycle::for_cells(ts, &cells());
        if let Some(v) = temp {
            cycle.record(ParsedResponse::new(CellId::new(1).unwrap(), v));
        }
        cycle.finish()
    }

    #[test]
    fn console_formats_rows_and_echoes() -> Result<()> {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.on_cycle(&row(1500, Some("21.5")))?;
        sink.on_echo(&Echo {
            elapsed_ms: 10,
            reason: EchoReason::Warmup,
            line: "hello".into(),
        })?;
        sink.on_echo(&Echo {
            elapsed_ms: 3000,
            reason: EchoReason::Unparsed,
            line: "garbage".into(),
        })?;
        let text = String::from_utf8(sink.into_inner())?;
        assert_eq!(
            text,
            "[1500 ms] temp=21.5 2=0\n[RAW] hello\n[DEBUG] Unparsed raw: \"garbage\"\n"
        );
        Ok(())
    }

    #[test]
    fn file_gets_header_once() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("cells.csv");
        let layout = RowLayout::new(&cells(), false);

        let mut sink = LogFileSink::open(&path, &layout)?;
        sink.on_cycle(&row(0, Some("1")))?;
        sink.close()?;

        let mut sink = LogFileSink::open(&path, &layout)?;
        sink.on_cycle(&row(1000, None))?;
        sink.close()?;

        assert_eq!(
            fs::read_to_string(&path)?,
            "Time_ms,temp,2\n0,1,0\n1000,0,0\n"
        );
        Ok(())
    }

    #[test]
    fn mismatched_header_is_refused() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("cells.csv");

        let mut sink = LogFileSink::open(&path, &RowLayout::new(&cells(), false))?;
        sink.on_cycle(&row(0, None))?;
        sink.close()?;

        let mut wider = cells();
        wider.push(CellSpec::new(CellId::new(3).unwrap()));
        let err = LogFileSink::open(&path, &RowLayout::new(&wider, false))
            .err()
            .expect("a wider layout must not reuse the file");
        assert!(err.to_string().contains("Time_ms,temp,2"));

        assert_eq!(fs::read_to_string(&path)?, "Time_ms,temp,2\n0,0,0\n");
        Ok(())
    }

    #[test]
    fn custom_layout_header() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("values.csv");
        let mut sink = LogFileSink::open(&path, &RowLayout::Values)?;
        let mut cycle = PollCycle::for_custom(250);
        cycle.record(ParsedResponse::new(CellId::new(42).unwrap(), "7"));
        sink.on_cycle(&cycle.finish())?;
        sink.close()?;
        assert_eq!(fs::read_to_string(&path)?, "Time_ms,Values\n250,7\n");
        Ok(())
    }

    #[test]
    fn writing_after_close_fails() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut sink = LogFileSink::open(dir.path().join("x.csv"), &RowLayout::Values)?;
        sink.close()?;
        sink.close()?;
        assert!(sink.on_cycle(&row(0, None)).is_err());
        Ok(())
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("log.csv");
        assert!(LogFileSink::open(path, &RowLayout::Values).is_err());
    }
}
