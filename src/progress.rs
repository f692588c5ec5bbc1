//! Progress reporting and display
//!
//! Sync and reconciliation report through the [`ProgressReporter`] trait so the
//! core logic stays decoupled from how notifications are shown.

use std::sync::Arc;

/// Outcome of a single note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    /// Currently being written
    Processing,
    /// New file created
    Created,
    /// Existing file modified through the regular path
    Modified,
    /// Hidden/config file overwritten directly
    Overwritten,
    /// Failed with error
    Failed(String),
}

/// Phase of the overall sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    /// Fetching pages from the remote table
    FetchingRecords,
    /// Writing notes into the vault
    Reconciling,
    /// Every note has been handled
    Completed,
    /// Failed with error
    Failed(String),
}

/// Counters for one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncProgress {
    pub total_fetched: usize,
    pub total_to_process: usize,
    pub processed_so_far: usize,
}

impl SyncProgress {
    pub fn remaining(&self) -> usize {
        self.total_to_process.saturating_sub(self.processed_so_far)
    }
}

/// Progress reporter trait - implement this for different display backends.
pub trait ProgressReporter: Send + Sync {
    /// Set the overall phase.
    fn set_phase(&self, phase: SyncPhase);

    /// Cumulative number of records fetched so far, after each page.
    fn records_fetched(&self, total: usize);

    /// Number of notes about to be created or updated.
    fn register_notes(&self, total: usize);

    /// Update the status of a specific note.
    fn update_entry(&self, path: &str, status: EntryStatus);

    /// A chunk finished and notes are still queued.
    fn chunk_finished(&self, progress: SyncProgress);

    /// Log an informational message.
    fn log_info(&self, message: &str);

    /// Log a warning message.
    fn log_warn(&self, message: &str);

    /// Log an error message.
    fn log_error(&self, message: &str);

    /// Finish and clean up the display.
    fn finish(&self);
}

/// A no-op reporter for when progress display is disabled.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn set_phase(&self, _phase: SyncPhase) {}
    fn records_fetched(&self, _total: usize) {}
    fn register_notes(&self, _total: usize) {}
    fn update_entry(&self, _path: &str, _status: EntryStatus) {}
    fn chunk_finished(&self, _progress: SyncProgress) {}
    fn log_info(&self, _message: &str) {}
    fn log_warn(&self, _message: &str) {}
    fn log_error(&self, _message: &str) {}
    fn finish(&self) {}
}

/// Statistics collected during a run.
#[derive(Debug, Default)]
struct Stats {
    fetched: usize,
    total_notes: usize,
    created: usize,
    modified: usize,
    overwritten: usize,
    failed: usize,
    start_time: Option<std::time::Instant>,
}

impl Stats {
    fn started() -> Self {
        Self {
            start_time: Some(std::time::Instant::now()),
            ..Default::default()
        }
    }

    fn record(&mut self, status: &EntryStatus) {
        match status {
            EntryStatus::Created => self.created += 1,
            EntryStatus::Modified => self.modified += 1,
            EntryStatus::Overwritten => self.overwritten += 1,
            EntryStatus::Failed(_) => self.failed += 1,
            EntryStatus::Processing => {}
        }
    }

    fn print_summary(&self) {
        let duration = self.start_time.map(|t| t.elapsed()).unwrap_or_default();

        eprintln!();
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("📊 Summary");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("   ⬇️  Fetched:     {} records", self.fetched);
        eprintln!("   📄 Notes:       {} total", self.total_notes);
        eprintln!("   🆕 Created:     {}", self.created);
        eprintln!("   ✏️  Modified:    {}", self.modified);
        if self.overwritten > 0 {
            eprintln!("   ⚙️  Overwritten: {}", self.overwritten);
        }
        if self.failed > 0 {
            eprintln!("   ❌ Failed:      {}", self.failed);
        }
        eprintln!("   ⏱️  Duration:    {:.2}s", duration.as_secs_f64());
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

/// A simple reporter that just prints to stderr (for non-TTY).
pub struct SimpleReporter {
    stats: std::sync::RwLock<Stats>,
}

impl SimpleReporter {
    pub fn new() -> Self {
        Self {
            stats: std::sync::RwLock::new(Stats::started()),
        }
    }
}

impl Default for SimpleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for SimpleReporter {
    fn set_phase(&self, phase: SyncPhase) {
        let (emoji, msg) = match phase {
            SyncPhase::FetchingRecords => ("⬇️ ", "Getting Data ……"),
            SyncPhase::Reconciling => ("📄", "Writing notes..."),
            SyncPhase::Completed => ("✅", "All Finished."),
            SyncPhase::Failed(ref e) => {
                eprintln!("❌ Failed: {e}");
                return;
            }
        };
        eprintln!("{emoji} {msg}");
    }

    fn records_fetched(&self, total: usize) {
        self.stats.write().unwrap().fetched = total;
        eprintln!("   Got {total} records");
    }

    fn register_notes(&self, total: usize) {
        self.stats.write().unwrap().total_notes = total;
        eprintln!("   There are {total} files needed to be updated or created.");
    }

    fn update_entry(&self, path: &str, status: EntryStatus) {
        self.stats.write().unwrap().record(&status);
        match status {
            EntryStatus::Created => eprintln!("   + {path}"),
            EntryStatus::Modified | EntryStatus::Overwritten => eprintln!("   ~ {path}"),
            EntryStatus::Failed(ref e) => eprintln!("   ✗ {path}: {e}"),
            EntryStatus::Processing => {}
        }
    }

    fn chunk_finished(&self, progress: SyncProgress) {
        eprintln!(
            "   There are {} files needed to be processed.",
            progress.remaining()
        );
    }

    fn log_info(&self, message: &str) {
        eprintln!("ℹ️  {message}");
    }

    fn log_warn(&self, message: &str) {
        eprintln!("⚠️  {message}");
    }

    fn log_error(&self, message: &str) {
        eprintln!("❌ {message}");
    }

    fn finish(&self) {
        self.stats.read().unwrap().print_summary();
    }
}

/// Fancy interactive reporter with progress bars (for TTY).
pub struct FancyReporter {
    multi: indicatif::MultiProgress,
    phase_bar: indicatif::ProgressBar,
    main_progress: std::sync::RwLock<Option<indicatif::ProgressBar>>,
    stats: std::sync::RwLock<Stats>,
}

impl FancyReporter {
    pub fn new() -> Self {
        let multi = indicatif::MultiProgress::new();
        let phase_bar = multi.add(indicatif::ProgressBar::new_spinner());
        phase_bar.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        phase_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            phase_bar,
            main_progress: std::sync::RwLock::new(None),
            stats: std::sync::RwLock::new(Stats::started()),
        }
    }
}

impl Default for FancyReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for FancyReporter {
    fn set_phase(&self, phase: SyncPhase) {
        let msg = match phase {
            SyncPhase::FetchingRecords => "⬇️  Getting Data ……",
            SyncPhase::Reconciling => "📄 Writing notes...",
            SyncPhase::Completed => "✅ All Finished.",
            SyncPhase::Failed(ref e) => {
                self.phase_bar
                    .finish_with_message(format!("❌ Failed: {e}"));
                return;
            }
        };
        self.phase_bar.set_message(msg.to_string());

        if matches!(phase, SyncPhase::Completed) {
            self.phase_bar.finish_with_message(msg.to_string());
        }
    }

    fn records_fetched(&self, total: usize) {
        self.stats.write().unwrap().fetched = total;
        self.phase_bar
            .set_message(format!("⬇️  Getting Data …… got {total} records"));
    }

    fn register_notes(&self, total: usize) {
        self.stats.write().unwrap().total_notes = total;

        let main_pb = self.multi.add(indicatif::ProgressBar::new(total as u64));
        main_pb.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("   {bar:40.cyan/blue} {pos}/{len} notes {msg}")
                .unwrap()
                .progress_chars("█▓▒░  "),
        );
        *self.main_progress.write().unwrap() = Some(main_pb);
    }

    fn update_entry(&self, path: &str, status: EntryStatus) {
        if let EntryStatus::Failed(ref e) = status {
            self.multi.println(format!("❌ {path}: {e}")).ok();
        }
        if !matches!(status, EntryStatus::Processing) {
            if let Some(ref main_pb) = *self.main_progress.read().unwrap() {
                main_pb.inc(1);
            }
        }
        self.stats.write().unwrap().record(&status);
    }

    fn chunk_finished(&self, progress: SyncProgress) {
        if let Some(ref main_pb) = *self.main_progress.read().unwrap() {
            main_pb.set_message(format!("{} remaining", progress.remaining()));
        }
    }

    fn log_info(&self, message: &str) {
        self.multi.println(format!("ℹ️  {message}")).ok();
    }

    fn log_warn(&self, message: &str) {
        self.multi.println(format!("⚠️  {message}")).ok();
    }

    fn log_error(&self, message: &str) {
        self.multi.println(format!("❌ {message}")).ok();
    }

    fn finish(&self) {
        if let Some(ref main_pb) = *self.main_progress.read().unwrap() {
            main_pb.finish_and_clear();
        }

        self.phase_bar.finish_and_clear();

        self.stats.read().unwrap().print_summary();
    }
}

/// Create an appropriate reporter based on terminal capabilities.
pub fn create_reporter() -> Arc<dyn ProgressReporter> {
    if console::Term::stderr().is_term() {
        Arc::new(FancyReporter::new())
    } else {
        Arc::new(SimpleReporter::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining() {
        let progress = SyncProgress {
            total_fetched: 25,
            total_to_process: 25,
            processed_so_far: 20,
        };
        assert_eq!(progress.remaining(), 5);
    }

    #[test]
    fn test_stats_record() {
        let mut stats = Stats::default();
        stats.record(&EntryStatus::Created);
        stats.record(&EntryStatus::Created);
        stats.record(&EntryStatus::Modified);
        stats.record(&EntryStatus::Failed("disk full".into()));
        stats.record(&EntryStatus::Processing);
        assert_eq!((stats.created, stats.modified, stats.failed), (2, 1, 1));
    }
}
