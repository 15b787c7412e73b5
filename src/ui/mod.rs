//! Terminal output for the rebuild.
//!
//! Progress lines go to stdout prefixed with `#`, like the git output they
//! sit between. Failures and conflict guidance go to stderr.

pub mod icons;

use crate::backup::BackupOutcome;
use crate::rebuild::RebuildReporter;
use console::style;
use icons::{BACKUP, CHECK, CHERRY, CROSS, WARN};

/// Console implementation of [`RebuildReporter`].
pub struct RebuildUI;

impl RebuildUI {
    fn line(&self, text: impl std::fmt::Display) {
        println!("{}", text);
    }

    fn list(&self, summaries: &[String]) {
        for summary in summaries {
            self.line(format!("  {}", summary));
        }
    }
}

impl RebuildReporter for RebuildUI {
    fn planned(&self, summaries: &[String]) {
        self.line("# Starting rebuilding using light commits:");
        self.list(summaries);
    }

    fn resuming(&self, summaries: &[String]) {
        if summaries.is_empty() {
            self.line("# Resuming rebuilding");
        } else {
            self.line("# Resuming rebuilding, commits left to pick:");
            self.list(summaries);
        }
    }

    fn committing(&self) {
        self.line("# Committing changes");
    }

    fn backup(&self, outcome: &BackupOutcome) {
        match outcome {
            BackupOutcome::Created(name) => self.line(format!(
                "{}# Branch backed up with name {}",
                BACKUP,
                style(name).yellow()
            )),
            BackupOutcome::Reused(name) => self.line(format!(
                "{}# Branch already backed up as {}",
                BACKUP,
                style(name).yellow()
            )),
        }
    }

    fn picking(&self, summary: &str) {
        self.line(format!("{}# Cherry picking rev {}", CHERRY, summary));
    }

    fn already_applied(&self, summary: &str) {
        self.line(format!(
            "  {}",
            style(format!("already applied, skipped: {}", summary)).dim()
        ));
    }
}

pub fn print_success(replayed: usize, already_applied: usize) {
    println!();
    println!("{}{}", CHECK, style("Rebuild success").bold().green());
    if already_applied > 0 {
        println!(
            "  {} replayed, {} already applied",
            replayed, already_applied
        );
    }
}

pub fn print_dry_run(planned: usize) {
    println!();
    println!(
        "{}",
        style(format!("Dry run: {} commit(s) would be replayed", planned)).dim()
    );
}

pub fn print_conflict(paths: &[String]) {
    eprintln!();
    eprintln!(
        "{}{}",
        WARN,
        style("Cherry-picking failed, please fix the conflict(s) and run again")
            .bold()
            .yellow()
    );
    for path in paths {
        eprintln!("  {} {}", style("conflict:").yellow(), path);
    }
}

/// The backend refused to replay a commit; the operator replays it by hand.
pub fn print_replay_failed(reason: &str) {
    eprintln!();
    eprintln!(
        "{}{}",
        WARN,
        style("Cherry-picking failed, please fix the conflict(s) and run again")
            .bold()
            .yellow()
    );
    eprintln!("  {}", reason);
    eprintln!("  Commit the replayed change yourself, then run again.");
}

pub fn print_aborted(backup: &str) {
    println!(
        "{}",
        style(format!("Rebuild aborted, branch restored from {}", backup)).yellow()
    );
}

pub fn print_error(message: impl std::fmt::Display) {
    eprintln!("{}{} {}", CROSS, style("Error:").red().bold(), message);
}
