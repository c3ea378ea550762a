//! Progress feedback utilities for CLI commands
//!
//! Spinners and percentage bars for long-running operations.
//! All progress output is suppressed when --quiet flag is set.

use indicatif::{ProgressBar, ProgressStyle};
use pll_core::{FutureStatus, ProgressingFuture};
use std::time::Duration;

/// How often a running operation is polled for progress
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Create a spinner with a message
pub fn spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(POLL_INTERVAL);
    Some(pb)
}

/// Create a bar tracking a completion percentage
pub fn percent_bar(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}% ({elapsed})")
            .expect("Invalid progress bar template")
            .progress_chars("█▓░"),
    );
    pb.set_message(message.to_string());
    Some(pb)
}

/// Block until `future` completes, mirroring its progress on `pb`.
pub fn track<T>(future: &ProgressingFuture<T>, pb: Option<&ProgressBar>) -> FutureStatus {
    loop {
        let status = future.wait_timeout(POLL_INTERVAL);
        if let Some(pb) = pb {
            pb.set_position(u64::from(future.progress()));
        }
        if status != FutureStatus::Running {
            return status;
        }
    }
}

/// Finish a spinner with a success message
pub fn finish_spinner(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{prefix:.green} {msg}")
                .expect("Invalid finish template"),
        );
        pb.set_prefix("✓");
        pb.finish_with_message(message.to_string());
    }
}

/// Finish a spinner with an error message
pub fn finish_spinner_error(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{prefix:.red} {msg}")
                .expect("Invalid error template"),
        );
        pb.set_prefix("✗");
        pb.finish_with_message(message.to_string());
    }
}

/// Finish a progress bar
pub fn finish_progress(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_quiet_returns_none() {
        assert!(spinner("test", true).is_none());
    }

    #[test]
    fn test_percent_bar_quiet_returns_none() {
        assert!(percent_bar("test", true).is_none());
    }

    #[test]
    fn test_percent_bar_not_quiet_returns_some() {
        let pb = percent_bar("test", false);
        assert!(pb.is_some());
        finish_progress(pb);
    }

    #[test]
    fn test_track_completed_future() {
        let future = ProgressingFuture::immediate(());
        let pb = percent_bar("test", false);
        assert_eq!(track(&future, pb.as_ref()), FutureStatus::Succeeded);
        assert_eq!(pb.as_ref().map(|pb| pb.position()), Some(100));
        finish_progress(pb);
    }

    #[test]
    fn test_finish_handles_none() {
        // Should not panic
        finish_spinner(None, "done");
        finish_spinner_error(None, "error");
        finish_progress(None);
    }
}
