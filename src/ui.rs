//! Stage progress on stderr. Stdout is reserved for JSON records.

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum UiMode {
    /// Spinner on a terminal, plain lines otherwise.
    Auto,
    Plain,
    Pretty,
    /// No progress output.
    Quiet,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    stderr_is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, stderr_is_tty: bool) -> Self {
        Self {
            mode,
            stderr_is_tty,
        }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        let spinner = match self.mode {
            UiMode::Quiet => return StageGuard::silent(),
            UiMode::Pretty | UiMode::Auto if self.stderr_is_tty => Some(spinner(name)),
            _ => {
                eprintln!("==> {}", name);
                None
            }
        };
        StageGuard {
            name: name.to_string(),
            start: Instant::now(),
            spinner,
            failure: None,
            silent: false,
        }
    }
}

fn spinner(name: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr());
    spinner.enable_steady_tick(Duration::from_millis(120));
    let style = ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(format!("{name}…"));
    spinner
}

/// Reports the stage outcome and duration when dropped.
pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    failure: Option<String>,
    silent: bool,
}

impl StageGuard {
    fn silent() -> Self {
        Self {
            name: String::new(),
            start: Instant::now(),
            spinner: None,
            failure: None,
            silent: true,
        }
    }

    /// Mark the stage as failed; the reason is shown instead of a check mark.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        if self.silent {
            return;
        }
        let elapsed = format_duration(self.start.elapsed());
        let message = match &self.failure {
            None => format!("✔ {} ({})", self.name, elapsed),
            Some(reason) => format!("✘ {} ({}): {}", self.name, elapsed, reason),
        };
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
