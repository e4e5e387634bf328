//! Terminal output: batch progress bar and final summary.
//!
//! Uses `indicatif` for the progress bar and `console` for colours.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::dispatcher::BatchReport;
use crate::error::PressError;
use crate::workflow::CompletedJob;

/// Progress of a running batch. Cheap to clone; every worker gets a copy.
#[derive(Clone)]
pub struct BatchProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
}

impl BatchProgress {
    /// Visible bar sized for `total` jobs.
    pub fn start(total: u64) -> Self {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .expect("invalid template")
                .progress_chars("=> "),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self::with_bar(pb)
    }

    /// Progress that draws nothing, for tests and non-interactive use.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(pb: ProgressBar) -> Self {
        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    pub fn job_started(&self, filename: &str) {
        self.pb.set_message(format!("compressing {filename}"));
    }

    pub fn job_completed(&self, done: &CompletedJob) {
        self.pb.println(format!(
            "  {} {} → {}",
            self.green.apply_to("✓"),
            done.filename,
            done.output.display()
        ));
        self.pb.inc(1);
    }

    pub fn job_failed(&self, err: &PressError) {
        self.pb.println(format!("  {} {err}", self.red.apply_to("✗")));
        self.pb.inc(1);
    }

    /// Counts manifest entries the producer dropped as done.
    pub fn jobs_skipped(&self, count: usize) {
        if count > 0 {
            self.pb.inc(count as u64);
        }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

/// Prints the outcome of a batch.
pub fn print_summary(report: &BatchReport) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let dim = Style::new().dim();

    if report.is_success() {
        println!(
            "{} All {} file(s) compressed",
            green.apply_to("✓"),
            report.completed.len()
        );
    } else {
        println!(
            "{} {} compressed, {} failed",
            red.apply_to("✗"),
            report.completed.len(),
            report.errors.len()
        );
        for err in &report.errors {
            println!("    {err}");
        }
    }

    if report.skipped > 0 {
        println!(
            "{}",
            dim.apply_to(format!("  {} vanished file(s) skipped", report.skipped))
        );
    }
    println!(
        "{}",
        dim.apply_to(format!(
            "  {} token refresh(es), {} ms",
            report.refreshes,
            report.duration_ms()
        ))
    );
}
