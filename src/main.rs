use std::process::ExitCode;

use cellpoll::cli;

fn main() -> ExitCode {
    env_logger::init();
    let matches = cli::parse_args();

    if matches.get_flag("list-ports") {
        return match cli::poll::handle_list_ports() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {e:#}");
                ExitCode::FAILURE
            }
        };
    }

    let config = match cli::config::load(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(2);
        }
    };

    match cli::poll::handle_poll(&config) {
        Ok(summary) => {
            log::debug!("Run summary: {summary:?}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Fatal error: {e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
