use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use log::{error, warn, LevelFilter};

use dvbscan::ScanEnd;

use crate::context::{Cli, Commands};

mod commands;
mod context;

fn level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logger(verbosity: u8) {
    let env = env_logger::Env::default().default_filter_or(level(verbosity).as_str());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let arg = Cli::parse();
    init_logger(arg.verbosity());

    match arg.command {
        Commands::Scan(args) => {
            let interrupted = Arc::new(AtomicBool::new(false));
            let flag = interrupted.clone();
            if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
                warn!("Cannot install the interrupt handler: {}", e);
            }

            match commands::scan::run(args, arg.config, interrupted) {
                Ok(ScanEnd::Completed) => ExitCode::SUCCESS,
                Ok(ScanEnd::Interrupted) => {
                    eprintln!("{}", "Interrupted, the channel list is incomplete.".yellow());
                    ExitCode::from(2)
                }
                Err(e) => {
                    error!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Discover => {
            commands::info::discover();
            ExitCode::SUCCESS
        }
        Commands::Lnbs => {
            commands::info::lnbs();
            ExitCode::SUCCESS
        }
        Commands::Plans => {
            commands::info::plans();
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level(0), LevelFilter::Error);
        assert_eq!(level(2), LevelFilter::Info);
        assert_eq!(level(3), LevelFilter::Debug);
        assert_eq!(level(9), LevelFilter::Trace);
    }
}
