// ABOUTME: Command-line entry point for delinting an SSH known_hosts file
// ABOUTME: Merges duplicate keys, sorts hosts and records, then emits, diffs or applies the result

mod config;
mod delint;
mod output;
mod ssh;

use anyhow::Result;
use clap::Parser;
use config::{Config, Mode};
use delint::DelintOptions;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "known-hosts-delint")]
#[command(version, about = "Delint an SSH known_hosts file", long_about = None)]
#[command(after_help = "EXIT CODES:
    0  Success, or no differences in diff mode
    1  Differences found in diff mode, usage error, or I/O failure")]
struct Cli {
    /// Path to the known_hosts file [default: ~/.ssh/known_hosts]
    known_hosts_file: Option<PathBuf>,

    /// Mode of operation [default: emit]
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Union host sets across keys that share any host
    #[arg(long)]
    transitive: bool,

    /// Path to configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a default configuration file and exit
    #[arg(long)]
    print_default_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

struct Invocation {
    mode: Mode,
    path: PathBuf,
    options: DelintOptions,
}

fn resolve(cli: Cli, mut config: Config) -> Result<Invocation> {
    config.expand_path()?;
    config.validate()?;

    let mut options = DelintOptions::from(&config.delint);
    options.transitive |= cli.transitive;

    Ok(Invocation {
        mode: cli.mode.unwrap_or(config.delint.mode),
        path: cli
            .known_hosts_file
            .unwrap_or_else(|| PathBuf::from(&config.known_hosts.path)),
        options,
    })
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are reported on stdout and are not errors.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if cli.print_default_config {
        print!("{}", Config::default_config_content());
        return Ok(());
    }

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let invocation = resolve(cli, config)?;

    let code = output::run(invocation.mode, &invocation.path, &invocation.options)?;
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
