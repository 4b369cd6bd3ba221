mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod signals;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use declarative::RunMode;
use log::LevelFilter;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub log_level: LevelFilter,
}

fn main() -> Result<()> {
    // Type shims call `cdist emulator <type> <args..>`; the arguments belong
    // to the type and must not be seen by the top-level parser.
    let argv: Vec<String> = std::env::args().collect();
    if argv.get(1).map(String::as_str) == Some("emulator") {
        init_logger(emulator_log_level());
        let Some(type_name) = argv.get(2) else {
            anyhow::bail!("usage: cdist emulator <type> [args..]");
        };
        return commands::emulator::run(type_name, &argv[3..]);
    }

    let cli = Cli::parse();

    let log_level = if cli.quiet {
        LevelFilter::Error
    } else {
        match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    init_logger(log_level);

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        log_level,
    };

    match cli.command {
        Command::Config(args) => {
            signals::install();
            commands::config::run(&ctx, &args, RunMode::Config)
        }
        Command::Install(args) => {
            signals::install();
            commands::config::run(&ctx, &args, RunMode::Install)
        }
        Command::Emulator { type_name, args } => commands::emulator::run(&type_name, &args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "cdist", &mut io::stdout());
            Ok(())
        }
    }
}

fn init_logger(level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

/// The emulator runs inside manifests and logs at the level of the run.
fn emulator_log_level() -> LevelFilter {
    std::env::var(declarative::env::LOG_LEVEL)
        .ok()
        .and_then(|value| declarative::env::parse_log_level(&value))
        .unwrap_or(LevelFilter::Warn)
}
