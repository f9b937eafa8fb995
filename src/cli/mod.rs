pub mod config;
pub mod poll;

use clap::{Arg, ArgAction, ArgMatches, Command};

/// Build the command line definition.
pub fn build_command() -> Command {
    Command::new("cellpoll")
        .about("Poll numbered sensor cells over a serial link and log the answers")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .help("Serial port (e.g. COM3 or /dev/ttyUSB0)")
                .value_name("PORT"),
        )
        .arg(
            Arg::new("speed")
                .long("speed")
                .short('s')
                .visible_alias("baud-rate")
                .help("Serial port baud rate")
                .value_name("BAUD")
                .default_value("115200")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .short('t')
                .alias("timeout")
                .help("Poll interval in milliseconds")
                .value_name("MS")
                .default_value("1000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("wait")
                .long("wait")
                .short('w')
                .help("Delay between cell requests in milliseconds")
                .value_name("MS")
                .default_value("20")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("file")
                .long("file")
                .short('f')
                .help("Append cycle rows to this CSV log file")
                .value_name("PATH")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            Arg::new("request")
                .long("request")
                .short('r')
                .help("Custom request string sent once per cycle (overrides the cell list)")
                .value_name("STRING"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .short('d')
                .help("Print raw responses that could not be parsed")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("warmup-ms")
                .long("warmup-ms")
                .help("Echo raw incoming data for this long before polling starts")
                .value_name("MS")
                .default_value("2000")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("read-timeout-ms")
                .long("read-timeout-ms")
                .help("Upper bound for a single read from the port")
                .value_name("MS")
                .default_value("50")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("TOML or JSON file with default settings; command line values win")
                .value_name("PATH")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            Arg::new("list-ports")
                .long("list-ports")
                .short('l')
                .help("List all available serial ports and exit")
                .action(ArgAction::SetTrue)
                .exclusive(true),
        )
        .arg(
            Arg::new("cells")
                .help("Cells to poll: <Addr> or <Name>:<Addr>, address 1-255")
                .value_name("CELLS")
                .num_args(0..)
                .action(ArgAction::Append),
        )
}

/// Parse command line arguments and return ArgMatches.
pub fn parse_args() -> ArgMatches {
    build_command().get_matches()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        build_command().debug_assert();
    }

    #[test]
    fn trailing_cells_are_collected() {
        let matches = build_command()
            .try_get_matches_from(["cellpoll", "-p", "/dev/ttyUSB0", "1", "temp:2", "3"])
            .unwrap();
        let cells: Vec<&String> = matches.get_many::<String>("cells").unwrap().collect();
        assert_eq!(cells, vec!["1", "temp:2", "3"]);
    }

    #[test]
    fn list_ports_stands_alone() {
        assert!(build_command()
            .try_get_matches_from(["cellpoll", "--list-ports"])
            .is_ok());
        assert!(build_command()
            .try_get_matches_from(["cellpoll", "--list-ports", "-p", "COM3"])
            .is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(build_command()
            .try_get_matches_from(["cellpoll", "-p", "COM3", "-t", "0", "1"])
            .is_err());
    }
}
