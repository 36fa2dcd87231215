//! Install progress bar and summary reporting for the CLI.

use std::time::{Duration, Instant};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use url::Url;

use crate::format::{format_bytes, format_elapsed, format_ratio};
use crate::stats::StatsSnapshot;
use crate::worker::{ActivateReport, InstallProgress, InstallReport};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Renders manifest pre-caching as a single progress bar.
pub struct BarProgress {
    bar: ProgressBar,
    started: Instant,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("progress template is valid")
                .progress_chars("━━╌"),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self {
            bar,
            started: Instant::now(),
        }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallProgress for BarProgress {
    fn on_start(&self, cache_name: &str, entries: usize) {
        self.bar.set_length(entries as u64);
        self.bar.set_message(format!("caching into {cache_name}"));
    }

    fn on_entry(&self, url: &Url, bytes: u64) {
        self.bar.inc(1);
        self.bar.set_message(format!("{url} ({})", format_bytes(bytes)));
    }

    fn on_error(&self, url: &Url, error: &str) {
        self.bar
            .println(format!("{} {url}: {error}", style("✗").red().bold()));
    }

    fn on_complete(&self, report: &InstallReport) {
        self.bar.finish_and_clear();
        print_install_summary(report, self.started.elapsed());
    }
}

impl Drop for BarProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}

/// Prints the outcome of a successful install.
pub fn print_install_summary(report: &InstallReport, elapsed: Duration) {
    println!("\n{SEPARATOR}");
    println!("{} {}", style("Installed").green().bold(), report.cache_name);
    println!("{SEPARATOR}");
    println!("  Entries cached:    {}", report.entries);
    println!("  Total size:        {}", format_bytes(report.bytes));
    println!("  Time:              {}", format_elapsed(elapsed));
    println!("{SEPARATOR}");
}

/// Prints which store became active and which were purged.
pub fn print_activation(report: &ActivateReport) {
    println!("{} {}", style("Activated").green().bold(), report.cache_name);
    for name in &report.deleted {
        println!("  {} {name}", style("deleted").dim());
    }
}

/// Prints resolve counters.
pub fn print_stats(stats: &StatsSnapshot) {
    if stats.total() == 0 {
        return;
    }
    println!("  Requests:          {}", stats.total());
    println!("  Cache hits:        {}", stats.cache_hits);
    println!("  Stored from net:   {}", stats.network_stored);
    println!("  Passed through:    {}", stats.network_uncached);
    println!("  Offline fallbacks: {}", stats.shell_fallbacks + stats.unavailable);
    println!("  Hit ratio:         {}", format_ratio(stats.hit_ratio()));
    if stats.store_errors > 0 {
        println!(
            "  {}      {}",
            style("Store errors:").yellow(),
            stats.store_errors
        );
    }
}
