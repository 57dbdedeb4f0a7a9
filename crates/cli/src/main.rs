mod commands;
mod config;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::CliConfig;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Tessera program runner.
#[derive(Parser)]
#[command(name = "tessera", version, about = "Tessera program runner")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a tessera.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON results (overrides [output] pretty)
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a program bundle and run its main sequence
    Run {
        /// Path to the program JSON bundle
        program: PathBuf,
    },

    /// Validate a program bundle without running it
    Check {
        /// Path to the program JSON bundle
        program: PathBuf,
    },

    /// List every registered predicate after loading a program bundle
    Describe {
        /// Path to the program JSON bundle
        program: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut config = match CliConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, cli.output, cli.quiet);
            process::exit(1);
        }
    };
    if cli.pretty {
        config.output.pretty = true;
    }
    init_logging(&config.log.filter);

    match cli.command {
        Commands::Run { program } => {
            commands::run::cmd_run(&program, &config, cli.output, cli.quiet);
        }
        Commands::Check { program } => {
            commands::check::cmd_check(&program, &config, cli.output, cli.quiet);
        }
        Commands::Describe { program } => {
            commands::describe::cmd_describe(&program, &config, cli.output, cli.quiet);
        }
    }
}

/// Initialize logging on stderr. `RUST_LOG` overrides the configured filter.
fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Read and parse a program bundle, exiting on failure.
pub(crate) fn load_program(
    path: &Path,
    output: OutputFormat,
    quiet: bool,
) -> tessera_eval::Program {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match tessera_eval::Program::parse(&text) {
        Ok(p) => p,
        Err(e) => {
            let msg = format!("error loading '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
