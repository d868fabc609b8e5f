//! Progress reporting for the two long phases: walking a library root and
//! resolving the entry list.
//!
//! Interactive runs get an indicatif spinner or bar. With `--log-only` both
//! are hidden and progress goes through `tracing` at a fixed interval so the
//! run log stays readable under `tail -f`.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::models::TargetEntry;

/// Global flag for log-only mode (set from args in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

/// Log a resolve line every this many entries in log-only mode.
pub const RESOLVE_LOG_INTERVAL: u64 = 25;

/// Log a walk line every this many album folders in log-only mode.
pub const WALK_LOG_INTERVAL: u64 = 500;

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// `2.5s`, `1.5m` or `1h 05m`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        let mins = d.as_secs() / 60;
        format!("{}h {:02}m", mins / 60, mins % 60)
    }
}

fn due(count: u64, interval: u64) -> bool {
    interval != 0 && count != 0 && count % interval == 0
}

// ============================================================================
// Library walk
// ============================================================================

/// Spinner for one root walk, counting album folders as they are found.
pub struct WalkProgress {
    spinner: ProgressBar,
    root: String,
    folders: u64,
}

impl WalkProgress {
    pub fn new(root: &Path) -> Self {
        let spinner = ProgressBar::new_spinner();
        if is_log_only() {
            spinner.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner} Indexing {msg} [{elapsed_precise}]")
                    .unwrap(),
            );
            spinner.enable_steady_tick(Duration::from_millis(100));
        }
        let root = root.display().to_string();
        spinner.set_message(root.clone());
        Self {
            spinner,
            root,
            folders: 0,
        }
    }

    /// Report the current number of album folders.
    pub fn set_folders(&mut self, folders: usize) {
        let folders = folders as u64;
        if folders == self.folders {
            return;
        }
        self.folders = folders;
        self.spinner.set_message(format!("{} ({} folders)", self.root, folders));
        if is_log_only() && due(folders, WALK_LOG_INTERVAL) {
            tracing::info!("[Indexing] {}: {} album folders so far", self.root, folders);
        }
    }

    pub fn finish(self) {
        self.spinner.finish_and_clear();
        tracing::debug!("Walked {}: {} album folders", self.root, self.folders);
    }
}

// ============================================================================
// Entry resolution
// ============================================================================

/// Bar over the entry list, showing the entry being resolved and the
/// running match count.
pub struct ResolveProgress {
    bar: ProgressBar,
    total: u64,
    done: u64,
    matched: u64,
}

impl ResolveProgress {
    pub fn new(total: usize) -> Self {
        let total = total as u64;
        let bar = ProgressBar::new(total);
        if is_log_only() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("Resolving [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("=> "),
            );
        }
        Self {
            bar,
            total,
            done: 0,
            matched: 0,
        }
    }

    /// Record one finished entry.
    pub fn record(&mut self, entry: &TargetEntry, matched: bool) {
        self.done += 1;
        if matched {
            self.matched += 1;
        }
        self.bar.inc(1);
        self.bar.set_message(format!("({} matched) {}", self.matched, entry));

        if is_log_only() && (due(self.done, RESOLVE_LOG_INTERVAL) || self.done == self.total) {
            let pct = 100.0 * self.done as f64 / self.total as f64;
            tracing::info!(
                "[Resolving] {}/{} ({:.1}%), {} matched",
                self.done,
                self.total,
                pct,
                self.matched
            );
        }
    }

    pub fn matched(&self) -> u64 {
        self.matched
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}
