//! Progress and ETA reporting
//!
//! Progress is measured as distance travelled by the run pointer, not as a
//! count of stored records, so resumed runs start again from 0%.

use std::time::Duration;

/// Width of the rendered progress bar in cells
pub const BAR_WIDTH: usize = 20;

/// Completion snapshot for one batch boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Completed share of the range, in `[0, 1]`
    pub fraction: f64,

    /// Estimated time remaining; None until at least one identifier is done
    pub eta: Option<Duration>,
}

/// Tracks progress of the run pointer towards its target
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    last: Option<Progress>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes completion fraction and ETA
    ///
    /// # Arguments
    ///
    /// * `current` - Current pointer position
    /// * `initial` - Pointer position when the run started
    /// * `target` - Pointer position once the range is done
    /// * `elapsed` - Wall-clock time since the run started
    pub fn update(&mut self, current: i64, initial: i64, target: i64, elapsed: Duration) -> Progress {
        let progress = compute_progress(current, initial, target, elapsed);
        self.last = Some(progress);
        progress
    }

    /// The most recent snapshot, if any
    pub fn last(&self) -> Option<Progress> {
        self.last
    }
}

/// Stateless form of [`ProgressReporter::update`]
pub fn compute_progress(current: i64, initial: i64, target: i64, elapsed: Duration) -> Progress {
    let total = initial.abs_diff(target);
    let done = current.abs_diff(initial);
    let remaining = target.abs_diff(current);

    let fraction = if total == 0 {
        0.0
    } else {
        (done as f64 / total as f64).clamp(0.0, 1.0)
    };

    // Ratios too large for a Duration leave the ETA unknown
    let eta = if done == 0 {
        None
    } else {
        Duration::try_from_secs_f64(elapsed.as_secs_f64() * (remaining as f64 / done as f64)).ok()
    };

    Progress { fraction, eta }
}

/// Renders a fixed-width bar such as `|██████--------------|`
pub fn render_bar(fraction: f64) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
    format!("|{}{}|", "█".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// Formats a duration as `1d 2h 3m 4s`
///
/// Leading zero units are omitted; seconds are always shown.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if days > 0 || hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if days > 0 || hours > 0 || minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    parts.push(format!("{}s", seconds));

    parts.join(" ")
}

/// One-line progress summary logged after each batch
pub fn render_line(progress: &Progress, streak: u32, current: i64, target: i64) -> String {
    let eta = progress
        .eta
        .map(format_duration)
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "{} {:5.1}% | ETA: {} | Fail: {} | {}/{}",
        render_bar(progress.fraction),
        progress.fraction * 100.0,
        eta,
        streak,
        current,
        target
    )
}
