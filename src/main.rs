use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use light_rebuild::config::Config;
use light_rebuild::errors::RebuildError;
use light_rebuild::ui;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "light-rebuild")]
#[command(
    version,
    about = "Replay the light branch commits onto the custom branch, with resume and abort"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Repository root (defaults to the current directory)
    #[arg(long, global = true)]
    pub repo: Option<PathBuf>,

    /// Revision the light commits start after. Detected from branch and tag names when omitted.
    pub base: Option<String>,

    /// Show the commits that would be replayed without touching the repository
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Restore the light branch from its backup and forget the rebuild in progress
    Abort,
    /// Show the rebuild in progress, if any
    Status,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration file
    Validate,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("light_rebuild=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let repo_dir = match cli.repo.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = Config::new(repo_dir)?;

    match cli.command {
        None => {
            let cancel = cmd::install_interrupt_handler();
            cmd::cmd_run(&config, cli.base.as_deref(), cli.dry_run, cancel)
        }
        Some(Commands::Abort) => cmd::cmd_abort(&config).map(|_| 0),
        Some(Commands::Status) => cmd::cmd_status(&config).map(|_| 0),
        Some(Commands::Config { command }) => cmd::cmd_config(&config, command).map(|_| 0),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => match e.downcast_ref::<RebuildError>() {
            Some(rebuild_err) => {
                ui::print_error(rebuild_err);
                rebuild_err.exit_code()
            }
            None => {
                ui::print_error(format!("{:#}", e));
                1
            }
        },
    };

    std::process::exit(code);
}
