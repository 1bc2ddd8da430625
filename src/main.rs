use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use paintcore::cli::{self, CliArgs};
use paintcore::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    if let Some(path) = logger::init(args.log.as_deref(), level) {
        log::info!("PaintCore {} starting, log at {}", env!("CARGO_PKG_VERSION"), path.display());
    }

    cli::run(args)
}
