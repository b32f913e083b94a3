mod compare;
mod config;
mod generate;
mod show;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Exit code when the comparison found breaking changes.
pub(crate) const EXIT_BREAKING: i32 = 1;
/// Exit code for any error (unreadable input, bad configuration, ...).
pub(crate) const EXIT_ERROR: i32 = 2;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// API compatibility checker for compiled .NET libraries.
#[derive(Parser)]
#[command(
    name = "apicheck",
    version,
    about = "API compatibility checker for compiled .NET libraries"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log debug information to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Configuration file (default: ./apicheck.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Exclusion flags shared by every subcommand that reads a listing.
#[derive(clap::Args, Debug, Clone, Default)]
pub(crate) struct FilterArgs {
    /// Leave out a namespace and everything below it (repeatable)
    #[arg(long = "exclude-namespace", value_name = "NAMESPACE")]
    pub exclude_namespaces: Vec<String>,

    /// Leave out types whose name starts with the prefix (repeatable)
    #[arg(long = "exclude-type", value_name = "PREFIX")]
    pub exclude_types: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the API listing of a library and write it as a baseline
    Generate {
        /// Compiled library (or an existing baseline to re-filter)
        input: PathBuf,
        /// Where to write the baseline JSON (default: stdout)
        #[arg(long, short)]
        out: Option<PathBuf>,
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Report breaking changes between an old and a new version
    Compare {
        /// Baseline or compiled library for the accepted version
        old: PathBuf,
        /// Baseline or compiled library for the candidate version
        new: PathBuf,
        /// Comma-separated change kinds to check (e.g. removed,visibility). Default: all.
        #[arg(long)]
        kinds: Option<String>,
        /// JSON file listing accepted breaking changes
        #[arg(long)]
        exceptions: Option<PathBuf>,
        /// Pair a renamed element: OLD=NEW (repeatable)
        #[arg(long = "rename", value_name = "OLD=NEW")]
        renames: Vec<String>,
        /// Write an exception list accepting every reported change
        #[arg(long, value_name = "PATH")]
        write_exceptions: Option<PathBuf>,
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Print the identity strings of every type and member
    Show {
        /// Compiled library or baseline
        input: PathBuf,
        #[command(flatten)]
        filters: FilterArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            report_error(&e.to_string(), cli.output, cli.quiet);
            process::exit(EXIT_ERROR);
        }
    };

    match cli.command {
        Commands::Generate {
            input,
            out,
            filters,
        } => {
            generate::cmd_generate(
                &input,
                out.as_deref(),
                &config,
                &filters,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Compare {
            old,
            new,
            kinds,
            exceptions,
            renames,
            write_exceptions,
            filters,
        } => {
            let exit_code = compare::cmd_compare(compare::CompareOptions {
                old: &old,
                new: &new,
                kinds: kinds.as_deref(),
                exceptions: exceptions.as_deref(),
                renames: &renames,
                write_exceptions: write_exceptions.as_deref(),
                filters: &filters,
                config: &config,
                output: cli.output,
                quiet: cli.quiet,
            });
            process::exit(exit_code);
        }
        Commands::Show { input, filters } => {
            show::cmd_show(&input, &config, &filters, cli.output, cli.quiet);
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` wins over
/// `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}
