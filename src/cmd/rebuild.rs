//! Rebuild commands: the default run, `abort` and `status`.

use anyhow::{Context, Result};
use console::style;
use light_rebuild::config::Config;
use light_rebuild::errors::RebuildError;
use light_rebuild::rebuild::{RebuildController, RebuildOutcome};
use light_rebuild::rules::DecorationRules;
use light_rebuild::ui::{self, RebuildUI};
use light_rebuild::vcs::GitBackend;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn open_backend(config: &Config) -> Result<GitBackend> {
    GitBackend::open(&config.repo_dir).map_err(|e| {
        tracing::debug!(error = %e, "failed to open repository");
        RebuildError::NotARepository(config.repo_dir.clone()).into()
    })
}

fn decoration_rules(config: &Config) -> Result<DecorationRules> {
    DecorationRules::from_config(config).context("Invalid branch naming configuration")
}

/// Flag raised by the first Ctrl-C; a second one exits immediately.
pub fn install_interrupt_handler() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("failed to install Ctrl-C handler");
            return;
        }
        handler_flag.store(true, Ordering::SeqCst);
        eprintln!(
            "\n{}",
            style("Interrupted, stopping after the current commit (Ctrl-C again to force)")
                .yellow()
        );

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(RebuildError::Interrupted.exit_code());
        }
    });

    flag
}

/// Start or resume a rebuild. Returns the process exit status.
pub fn cmd_run(
    config: &Config,
    base: Option<&str>,
    dry_run: bool,
    cancel: Arc<AtomicBool>,
) -> Result<i32> {
    let backend = open_backend(config)?;
    let rules = decoration_rules(config)?;
    let reporter = RebuildUI;
    let controller =
        RebuildController::new(&backend, config, &rules, &reporter).with_cancel_flag(cancel);

    let outcome = controller.run(base, dry_run)?;
    match &outcome {
        RebuildOutcome::Completed {
            replayed,
            already_applied,
        } => ui::print_success(*replayed, *already_applied),
        RebuildOutcome::DryRun { planned } => ui::print_dry_run(planned.len()),
        RebuildOutcome::Conflicted { paths, .. } => ui::print_conflict(paths),
        RebuildOutcome::ReplayFailed { reason, .. } => ui::print_replay_failed(reason),
    }

    Ok(outcome.exit_code())
}

/// Restore the light branch from its backup and drop the checkpoint.
pub fn cmd_abort(config: &Config) -> Result<()> {
    let backend = open_backend(config)?;
    let rules = decoration_rules(config)?;
    let reporter = RebuildUI;
    let controller = RebuildController::new(&backend, config, &rules, &reporter);

    let backup = controller.abort()?;
    ui::print_aborted(backup.as_str());
    Ok(())
}

/// Show the in-progress rebuild, if any.
pub fn cmd_status(config: &Config) -> Result<()> {
    let backend = open_backend(config)?;
    let rules = decoration_rules(config)?;
    let reporter = RebuildUI;
    let controller = RebuildController::new(&backend, config, &rules, &reporter);

    let Some(status) = controller.status()? else {
        println!("No rebuild in progress.");
        return Ok(());
    };

    let checkpoint = &status.checkpoint;
    println!();
    println!("{}", style("Rebuild in progress").bold().cyan());
    println!("───────────────────");
    println!("Backup branch: {}", style(&checkpoint.backup_branch).yellow());
    println!(
        "Updated: {}",
        checkpoint.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if checkpoint.conflicted {
        println!(
            "State: {}",
            style("waiting for a conflict resolution").yellow()
        );
    } else {
        println!("State: interrupted");
    }
    println!();
    println!("Commits left to pick ({}):", status.remaining.len());
    for summary in &status.remaining {
        println!("  {}", summary);
    }
    println!();
    println!("Run again to resume, or 'light-rebuild abort' to restore the backup.");

    Ok(())
}
