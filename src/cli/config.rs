use anyhow::{anyhow, Context, Result};
use clap::{parser::ValueSource, ArgMatches};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    api::poll::{PollSettings, RowLayout},
    protocol::cell::{request::RequestPlan, CellSpec},
};

/// Settings of one polling run.
///
/// Built from built-in defaults, then an optional config file, then the
/// command line, each layer overriding the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    /// Serial port name
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Cycle length in milliseconds
    pub interval_ms: u64,
    /// Pause between two cell requests in milliseconds
    pub request_gap_ms: u64,
    /// Upper bound of a single blocking read in milliseconds
    pub read_timeout_ms: u64,
    /// Raw echo window after start-up in milliseconds
    pub warmup_ms: u64,
    pub log_file: Option<PathBuf>,
    /// Literal sent instead of per-cell requests
    pub request: Option<String>,
    pub debug: bool,
    pub cells: Vec<CellSpec>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            interval_ms: 1000,
            request_gap_ms: 20,
            read_timeout_ms: 50,
            warmup_ms: 2000,
            log_file: None,
            request: None,
            debug: false,
            cells: Vec::new(),
        }
    }
}

impl PollConfig {
    /// Parse configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).context("Invalid JSON configuration")
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("Invalid TOML configuration")
    }

    /// Read configuration from a file; `.json` is JSON, anything else TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file '{}'", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        };
        parsed.with_context(|| format!("In config file '{}'", path.display()))
    }

    /// Overlay values given explicitly on the command line.
    pub fn merge_matches(mut self, matches: &ArgMatches) -> Result<Self> {
        let explicit = |id: &str| matches.value_source(id) == Some(ValueSource::CommandLine);

        if let Some(port) = matches.get_one::<String>("port") {
            self.port = Some(port.clone());
        }
        if explicit("speed") {
            self.baud_rate = *matches.get_one::<u32>("speed").unwrap_or(&self.baud_rate);
        }
        if explicit("interval") {
            self.interval_ms = *matches.get_one::<u64>("interval").unwrap_or(&self.interval_ms);
        }
        if explicit("wait") {
            self.request_gap_ms = *matches.get_one::<u64>("wait").unwrap_or(&self.request_gap_ms);
        }
        if explicit("read-timeout-ms") {
            self.read_timeout_ms = *matches
                .get_one::<u64>("read-timeout-ms")
                .unwrap_or(&self.read_timeout_ms);
        }
        if explicit("warmup-ms") {
            self.warmup_ms = *matches.get_one::<u64>("warmup-ms").unwrap_or(&self.warmup_ms);
        }
        if let Some(path) = matches.get_one::<PathBuf>("file") {
            self.log_file = Some(path.clone());
        }
        if let Some(request) = matches.get_one::<String>("request") {
            self.request = Some(request.clone());
        }
        if matches.get_flag("debug") {
            self.debug = true;
        }
        if let Some(tokens) = matches.get_many::<String>("cells") {
            let cells = tokens
                .map(|t| t.parse::<CellSpec>())
                .collect::<Result<Vec<_>>>()?;
            if !cells.is_empty() {
                self.cells = cells;
            }
        }
        Ok(self)
    }

    /// Check the settings form a runnable configuration.
    pub fn validate(&self) -> Result<()> {
        match self.port.as_deref() {
            None | Some("") => return Err(anyhow!("A serial port is required (--port)")),
            _ => {}
        }
        if self.cells.is_empty() && self.request.is_none() {
            return Err(anyhow!(
                "Nothing to poll: give at least one cell or a custom request (--request)"
            ));
        }
        if matches!(self.request.as_deref(), Some("")) {
            return Err(anyhow!("The custom request must not be empty"));
        }
        if self.interval_ms == 0 {
            return Err(anyhow!("The poll interval must be at least 1 ms"));
        }
        if self.read_timeout_ms == 0 {
            return Err(anyhow!("The read timeout must be at least 1 ms"));
        }
        Ok(())
    }

    pub fn settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.interval_ms),
            request_gap: Duration::from_millis(self.request_gap_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            warmup: Duration::from_millis(self.warmup_ms),
            debug: self.debug,
        }
    }

    pub fn plan(&self) -> RequestPlan {
        RequestPlan::new(&self.cells, self.request.as_deref())
    }

    pub fn layout(&self) -> RowLayout {
        RowLayout::new(&self.cells, self.request.is_some())
    }
}

/// Defaults, then `--config`, then the command line.
pub fn load(matches: &ArgMatches) -> Result<PollConfig> {
    let base = match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            log::info!("Loading configuration from {}", path.display());
            PollConfig::from_file(path)?
        }
        None => PollConfig::default(),
    };
    let config = base.merge_matches(matches)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cli::build_command, protocol::cell::CellId};
    use std::io::Write;

    fn matches(args: &[&str]) -> ArgMatches {
        build_command()
            .try_get_matches_from(std::iter::once("cellpoll").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn cli_defaults_match_config_defaults() -> Result<()> {
        let config = PollConfig::default().merge_matches(&matches(&["-p", "COM3", "1"]))?;
        let expected = PollConfig {
            port: Some("COM3".to_string()),
            cells: vec!["1".parse()?],
            ..PollConfig::default()
        };
        assert_eq!(config, expected);

        let settings = config.settings();
        assert_eq!(settings.interval, Duration::from_millis(1000));
        assert_eq!(settings.request_gap, Duration::from_millis(20));
        assert_eq!(settings.warmup, Duration::from_millis(2000));
        Ok(())
    }

    #[test]
    fn command_line_values_apply() -> Result<()> {
        let config = PollConfig::default().merge_matches(&matches(&[
            "-p",
            "/dev/ttyUSB0",
            "-s",
            "9600",
            "-t",
            "250",
            "-w",
            "5",
            "-f",
            "out.csv",
            "-d",
            "temp:10",
            "11",
        ]))?;
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.interval_ms, 250);
        assert_eq!(config.request_gap_ms, 5);
        assert_eq!(config.log_file, Some(PathBuf::from("out.csv")));
        assert!(config.debug);
        assert_eq!(
            config.cells,
            vec![
                CellSpec::named("temp", CellId::new(10).unwrap()),
                CellSpec::new(CellId::new(11).unwrap())
            ]
        );
        config.validate()
    }

    #[test]
    fn file_values_survive_unless_overridden() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(
            file,
            "port = \"/dev/ttyACM0\"\nbaud_rate = 57600\ninterval_ms = 500\ncells = [\"1\", \"flow:2\"]"
        )?;

        let path = file.path().to_str().unwrap().to_string();
        let config = load(&matches(&["-c", path.as_str(), "-t", "750"]))?;
        assert_eq!(config.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.baud_rate, 57600);
        assert_eq!(config.interval_ms, 750);
        assert_eq!(config.cells.len(), 2);
        assert_eq!(config.layout().header(), "Time_ms,1,flow");
        Ok(())
    }

    #[test]
    fn json_config_is_recognised() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile()?;
        write!(file, r#"{{"port": "COM4", "request": "?42"}}"#)?;
        let config = PollConfig::from_file(file.path())?;
        assert_eq!(config.port.as_deref(), Some("COM4"));
        assert!(config.plan().is_custom());
        assert_eq!(config.layout(), RowLayout::Values);
        config.validate()
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PollConfig::from_toml("prot = \"COM1\"").is_err());
    }

    #[test]
    fn validation_errors() {
        let no_port = PollConfig {
            cells: vec!["1".parse().unwrap()],
            ..PollConfig::default()
        };
        assert!(no_port.validate().is_err());

        let nothing_to_poll = PollConfig {
            port: Some("COM1".into()),
            ..PollConfig::default()
        };
        assert!(nothing_to_poll.validate().is_err());

        let custom_only = PollConfig {
            port: Some("COM1".into()),
            request: Some("?42".into()),
            ..PollConfig::default()
        };
        assert!(custom_only.validate().is_ok());
    }

    #[test]
    fn bad_cell_token_is_an_error() {
        assert!(PollConfig::default()
            .merge_matches(&matches(&["-p", "COM1", "0"]))
            .is_err());
    }
}
