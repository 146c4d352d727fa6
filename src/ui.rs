//! Terminal progress for a running job.
//!
//! Uses `indicatif` for the progress bar and `console` for colours. The bar
//! is redrawn from [`StatusReport`]s polled off the engine, so it shows
//! exactly what `GET /status` would.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state_machine::Phase;
use crate::status::StatusReport;

/// Progress bar plus the final summary line.
pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    pub fn start(label: &str, total: u64) -> Self {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);
        pb.set_prefix(label.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(250));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    pub fn update(&self, report: &StatusReport) {
        self.pb.set_length(report.total);
        self.pb.set_position(report.done);
        self.pb.set_message(status_line(report));
    }

    /// Clears the bar and prints the outcome with the counters.
    pub fn complete(&self, report: &StatusReport) {
        self.pb.finish_and_clear();
        let counts = format!(
            "{}/{} done, {} ok, {} ng",
            report.done, report.total, report.ok, report.ng
        );
        match report.phase {
            Phase::Finished => println!("  {} Finished: {counts}", self.green.apply_to("✓")),
            Phase::Canceled => println!("  {} Canceled: {counts}", self.yellow.apply_to("■")),
            _ => println!(
                "  {} Stopped ({}): {counts} {}",
                self.red.apply_to("✗"),
                report.phase,
                report.message
            ),
        }
        if let Some(log) = &report.log_filename {
            println!("  log: {log}");
        }
    }
}

/// One-line summary shown next to the bar.
pub fn status_line(report: &StatusReport) -> String {
    let mut line = format!("{} | ok {} ng {}", report.phase, report.ok, report.ng);
    match report.phase {
        Phase::Waiting if report.wait_remaining >= 0 => {
            line.push_str(&format!(" | next in {}s", report.wait_remaining));
        }
        Phase::Processing => {
            if let Some(id) = &report.current_id {
                line.push_str(&format!(" | {id}"));
            }
        }
        _ => {}
    }
    if report.running {
        line.push_str(&format!(" | eta {}", report.eta_hms));
    }
    line
}
