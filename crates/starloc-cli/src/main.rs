use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod ui;

use commands::OutputFormat;

#[derive(Parser)]
#[command(
    name = "starloc",
    version,
    about = "Extract, export and merge translatable labels of a game asset tree"
)]
struct Cli {
    /// Only log warnings and errors to the console
    #[arg(long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild the label database from the asset tree
    Extract {
        #[arg(long)]
        assets: Option<PathBuf>,
        #[arg(long)]
        translations: Option<PathBuf>,
        /// Delete stale storage files without asking
        #[arg(long, default_value_t = false)]
        yes: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Write per-document patch files from the database
    Export {
        #[arg(long)]
        translations: Option<PathBuf>,
        #[arg(long)]
        out_mod: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Merge translated patch files back into the database
    Merge {
        #[arg(long)]
        mod_dir: Option<PathBuf>,
        #[arg(long)]
        translations: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Dump JSON schemas of the persisted and reported types
    Schema {
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

trait Runnable {
    fn run(self, use_color: bool) -> Result<()>;
}

impl Runnable for Commands {
    fn run(self, use_color: bool) -> Result<()> {
        info!(event = "command_start", command = ?self);

        match self {
            Commands::Extract {
                assets,
                translations,
                yes,
                format,
            } => {
                debug!(?assets, ?translations, yes, "extract args");
                commands::extract::run_extract_cmd(assets, translations, yes, format, use_color)
            }
            Commands::Export {
                translations,
                out_mod,
                format,
            } => {
                debug!(?translations, ?out_mod, "export args");
                commands::export::run_export_cmd(translations, out_mod, format, use_color)
            }
            Commands::Merge {
                mod_dir,
                translations,
                format,
            } => {
                debug!(?mod_dir, ?translations, "merge args");
                commands::merge::run_merge_cmd(mod_dir, translations, format, use_color)
            }
            Commands::Schema { out_dir } => commands::schema::run_schema(out_dir),
        }
    }
}

fn init_tracing(quiet: bool) -> WorkerGuard {
    let file_appender = rolling::daily("logs", "starloc.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if quiet { "warn" } else { "info" };
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        );

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
    guard
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _guard = init_tracing(cli.quiet);

    let use_color = !cli.no_color
        && std::io::stdout().is_terminal()
        && std::env::var_os("NO_COLOR").is_none();

    cli.cmd.run(use_color)
}
