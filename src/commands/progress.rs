//! Progress bar for item-by-item runs.

use std::io::{self, IsTerminal};
use std::time::Duration;

use harvester_core::DownloadOutcome;
use indicatif::{ProgressBar, ProgressStyle};

/// Returns a bar over `total` items, hidden when quiet or stderr is not a terminal.
pub(crate) fn item_bar(total: u64, quiet: bool, label: &str) -> ProgressBar {
    if quiet || !io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{prefix} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_prefix(label.to_string());
    bar
}

/// Returns a ticking spinner, hidden when quiet or stderr is not a terminal.
pub(crate) fn spinner(quiet: bool, message: &str) -> ProgressBar {
    if quiet || !io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Advances `bar` by one item and shows the running saved count.
pub(crate) fn tick(bar: &ProgressBar, saved: &mut u64, outcome: &DownloadOutcome) {
    if outcome.is_saved() {
        *saved += 1;
    }
    bar.set_message(format!("saved {saved}"));
    bar.inc(1);
}
