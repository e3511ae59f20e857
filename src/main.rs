//! sailjail entry point.

use std::process::ExitCode;

use clap::Parser;

use sailjail::cli::Cli;
use sailjail::error::EXIT_CMDLINE;
use sailjail::launcher;
use sailjail::utils::init_logging;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are not errors
            let code = if e.use_stderr() { EXIT_CMDLINE } else { 0 };
            e.print().ok();
            return ExitCode::from(code);
        }
    };

    let log = cli.log_config();
    init_logging(&log);

    match launcher::run(&cli, log) {
        Ok(never) => match never {},
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
