//! Terminal helpers: the banner and the scan progress bar.

use std::io::{self, IsTerminal, Write};
use std::time::{Duration, Instant};

pub fn print_header() {
    let version = env!("CARGO_PKG_VERSION");
    // Avoid panics when the version exceeds the expected width
    let spaces = " ".repeat(24usize.saturating_sub(version.len()));
    eprintln!(
        r#"
    ╭──────────────────────────────────────╮
    │                                      │
    │            J S R E C O N             │
    │                                      │
    │     JavaScript bundle recon          │
    │     Version: {version}{spaces}│
    │                                      │
    ╰──────────────────────────────────────╯
"#
    );
}

/// The bar renders only when stderr is attached to a terminal.
pub struct ProgressBar {
    total_files: usize,
    files_completed: usize,
    width: usize,
    last_line_len: usize,
    min_interval: Duration,
    last_draw: Instant,
    start: Instant,
}

impl ProgressBar {
    /// `None` when there is nothing to track or stderr is not a terminal.
    pub fn new(total_files: usize) -> Option<Self> {
        if total_files == 0 || !io::stderr().is_terminal() {
            return None;
        }
        let min_interval = Duration::from_millis(75);
        let start = Instant::now();
        let mut bar = Self {
            total_files,
            files_completed: 0,
            width: 28,
            last_line_len: 0,
            min_interval,
            last_draw: start,
            start,
        };
        bar.draw(true);
        Some(bar)
    }

    /// Marks `count` files as processed. Redraws are throttled.
    pub fn increment_files(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.files_completed = (self.files_completed + count).min(self.total_files);
        self.draw(false);
    }

    pub fn finish(&mut self) {
        self.files_completed = self.total_files;
        self.draw(true);
        let mut stderr = io::stderr();
        let _ = writeln!(stderr);
        self.last_line_len = 0;
    }

    fn draw(&mut self, force: bool) {
        let now = Instant::now();
        if !force
            && self.last_line_len != 0
            && now.duration_since(self.last_draw) < self.min_interval
        {
            return;
        }
        self.last_draw = now;

        let percent = (self.files_completed as f64 / self.total_files as f64).clamp(0.0, 1.0);
        let filled = ((self.width as f64) * percent).round() as usize;
        let filled = filled.min(self.width);
        let bar = format!(
            "{}{}",
            "█".repeat(filled),
            "░".repeat(self.width.saturating_sub(filled))
        );
        let eta = estimate_eta(self.start.elapsed(), self.files_completed, self.total_files)
            .unwrap_or_else(|| "--:--".to_string());
        let message = format!(
            "▸ Scan progress |{bar}| {:6.2}% | files {}/{} | ETA {eta}",
            percent * 100.0,
            self.files_completed,
            self.total_files,
        );

        let mut stderr = io::stderr();
        let padding = " ".repeat(self.last_line_len.saturating_sub(message.len()));
        let _ = write!(stderr, "\r{message}{padding}");
        let _ = stderr.flush();
        self.last_line_len = message.len();
    }
}

fn estimate_eta(elapsed: Duration, done: usize, total: usize) -> Option<String> {
    if done == 0 {
        return None;
    }
    if done >= total {
        return Some("00:00".to_string());
    }
    let secs = elapsed.as_secs_f64();
    if secs < f64::EPSILON {
        return None;
    }
    let rate = done as f64 / secs;
    let remaining = Duration::from_secs_f64((total - done) as f64 / rate);
    Some(format_duration(remaining))
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
