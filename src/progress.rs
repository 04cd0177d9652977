//! Byte progress bars for document downloads.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Hands out one progress bar per download.
///
/// Bars from concurrent pipelines share a [`MultiProgress`] so they stack
/// instead of overwriting each other. When hidden, every bar is a no-op.
#[derive(Debug, Clone, Default)]
pub struct DownloadProgress {
    multi: Option<MultiProgress>,
}

impl DownloadProgress {
    /// Progress reporting disabled.
    #[must_use]
    pub fn hidden() -> Self {
        Self { multi: None }
    }

    /// Progress bars drawn on stderr.
    #[must_use]
    pub fn visible() -> Self {
        Self {
            multi: Some(MultiProgress::new()),
        }
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.multi.is_some()
    }

    /// Starts a bar for `label`, sized when the total is known.
    #[must_use]
    pub fn start(&self, label: &str, total: Option<u64>) -> ProgressBar {
        let Some(multi) = &self.multi else {
            return ProgressBar::hidden();
        };
        let bar = match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::with_template(
                        "{msg:30!} [{bar:30}] {binary_bytes}/{binary_total_bytes} {binary_bytes_per_sec}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template("{spinner} {msg:30!} {binary_bytes}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar
            }
        };
        let bar = multi.add(bar);
        bar.set_message(format!("Saving {label}"));
        bar
    }
}

/// Whether bars should be drawn at all.
#[must_use]
pub fn should_show_progress(stderr_is_terminal: bool, quiet: bool, dumb_terminal: bool) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}
