//! Progress reporting and display
//!
//! The sync pipeline reports phases and per-unit status through the
//! `ProgressReporter` trait, so the same run can drive a terminal display or a
//! streamed event feed.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use tokio::sync::mpsc;

/// Status of a single page or collection being synced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    /// Fetching content from the API
    Fetching,
    /// Resolving references
    Resolving { current: usize, total: usize },
    /// Rendering markdown
    Rendering,
    /// Writing to the document store
    Writing,
    /// Successfully completed
    Done,
    /// Completed with nothing to write
    Skipped(String),
    /// Failed with error
    Failed(String),
}

/// Phase of the overall sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    LoadingSettings,
    LoadingAssets,
    SyncingPages,
    SyncingCollections,
    Completed,
    Failed(String),
}

impl SyncPhase {
    fn message(&self) -> String {
        match self {
            SyncPhase::LoadingSettings => "Loading exposure settings...".to_owned(),
            SyncPhase::LoadingAssets => "Loading assets...".to_owned(),
            SyncPhase::SyncingPages => "Syncing pages...".to_owned(),
            SyncPhase::SyncingCollections => "Syncing collections...".to_owned(),
            SyncPhase::Completed => "Completed!".to_owned(),
            SyncPhase::Failed(e) => format!("Failed: {e}"),
        }
    }

    fn emoji(&self) -> &'static str {
        match self {
            SyncPhase::LoadingSettings => "📋",
            SyncPhase::LoadingAssets => "🖼️ ",
            SyncPhase::SyncingPages => "📄",
            SyncPhase::SyncingCollections => "🗂️ ",
            SyncPhase::Completed => "✅",
            SyncPhase::Failed(_) => "❌",
        }
    }
}

impl EntryStatus {
    fn detail(&self) -> String {
        match self {
            EntryStatus::Fetching => "fetching".to_owned(),
            EntryStatus::Resolving { current, total } => format!("references ({current}/{total})"),
            EntryStatus::Rendering => "rendering".to_owned(),
            EntryStatus::Writing => "writing".to_owned(),
            EntryStatus::Done => "done".to_owned(),
            EntryStatus::Skipped(reason) => format!("skipped: {reason}"),
            EntryStatus::Failed(e) => e.clone(),
        }
    }

    fn is_final(&self) -> bool {
        matches!(
            self,
            EntryStatus::Done | EntryStatus::Skipped(_) | EntryStatus::Failed(_)
        )
    }
}

pub trait ProgressReporter: Send + Sync {
    fn set_phase(&self, phase: SyncPhase);

    /// Register entries to track (call before processing starts).
    fn register_entries(&self, entries: Vec<String>);

    fn update_entry(&self, entry: &str, status: EntryStatus);

    fn log_info(&self, message: &str);

    fn log_warn(&self, message: &str);

    fn log_error(&self, message: &str);

    /// Finish and clean up the display.
    fn finish(&self);
}

pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn set_phase(&self, _phase: SyncPhase) {}
    fn register_entries(&self, _entries: Vec<String>) {}
    fn update_entry(&self, _entry: &str, _status: EntryStatus) {}
    fn log_info(&self, _message: &str) {}
    fn log_warn(&self, _message: &str) {}
    fn log_error(&self, _message: &str) {}
    fn finish(&self) {}
}

#[derive(Debug)]
struct Stats {
    total_entries: usize,
    successful_entries: usize,
    skipped_entries: usize,
    failed_entries: usize,
    start_time: Instant,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            total_entries: 0,
            successful_entries: 0,
            skipped_entries: 0,
            failed_entries: 0,
            start_time: Instant::now(),
        }
    }
}

impl Stats {
    fn record(&mut self, status: &EntryStatus) {
        match status {
            EntryStatus::Done => self.successful_entries += 1,
            EntryStatus::Skipped(_) => self.skipped_entries += 1,
            EntryStatus::Failed(_) => self.failed_entries += 1,
            _ => {}
        }
    }

    fn print_summary(&self) {
        eprintln!();
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("📊 Summary");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("   📄 Units:      {} total", self.total_entries);
        eprintln!("   ✅ Successful: {}", self.successful_entries);
        if self.skipped_entries > 0 {
            eprintln!("   ⏭️  Skipped:    {}", self.skipped_entries);
        }
        if self.failed_entries > 0 {
            eprintln!("   ❌ Failed:     {}", self.failed_entries);
        }
        eprintln!(
            "   ⏱️  Duration:   {:.2}s",
            self.start_time.elapsed().as_secs_f64()
        );
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

/// Plain stderr output for non-TTY use.
#[derive(Default)]
pub struct SimpleReporter {
    stats: RwLock<Stats>,
}

impl SimpleReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for SimpleReporter {
    fn set_phase(&self, phase: SyncPhase) {
        eprintln!("{} {}", phase.emoji(), phase.message());
    }

    fn register_entries(&self, entries: Vec<String>) {
        if let Ok(mut stats) = self.stats.write() {
            stats.total_entries += entries.len();
        }
        eprintln!("   Found {} units", entries.len());
    }

    fn update_entry(&self, entry: &str, status: EntryStatus) {
        if let Ok(mut stats) = self.stats.write() {
            stats.record(&status);
        }
        match status {
            EntryStatus::Done => eprintln!("   ✓ {entry}"),
            EntryStatus::Skipped(ref reason) => eprintln!("   - {entry}: {reason}"),
            EntryStatus::Failed(ref e) => eprintln!("   ✗ {entry}: {e}"),
            _ => {}
        }
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
        if let Ok(stats) = self.stats.read() {
            stats.print_summary();
        }
    }
}

/// Interactive progress bars for TTY output.
pub struct FancyReporter {
    multi: indicatif::MultiProgress,
    phase_bar: indicatif::ProgressBar,
    entries: RwLock<HashMap<String, Option<indicatif::ProgressBar>>>,
    main_progress: RwLock<Option<indicatif::ProgressBar>>,
    stats: RwLock<Stats>,
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
        phase_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            phase_bar,
            entries: RwLock::new(HashMap::new()),
            main_progress: RwLock::new(None),
            stats: RwLock::new(Stats::default()),
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
        let msg = format!("{} {}", phase.emoji(), phase.message());
        match phase {
            SyncPhase::Completed | SyncPhase::Failed(_) => self.phase_bar.finish_with_message(msg),
            _ => self.phase_bar.set_message(msg),
        }
    }

    fn register_entries(&self, entries: Vec<String>) {
        if let Ok(mut stats) = self.stats.write() {
            stats.total_entries += entries.len();
        }
        let Ok(mut main_progress) = self.main_progress.write() else {
            return;
        };
        match main_progress.as_ref() {
            Some(main_pb) => main_pb.inc_length(entries.len() as u64),
            None => {
                let main_pb = self
                    .multi
                    .add(indicatif::ProgressBar::new(entries.len() as u64));
                main_pb.set_style(
                    indicatif::ProgressStyle::default_bar()
                        .template("   {bar:40.cyan/blue} {pos}/{len} units")
                        .unwrap()
                        .progress_chars("█▓▒░  "),
                );
                *main_progress = Some(main_pb);
            }
        }
        if let Ok(mut map) = self.entries.write() {
            // Bars are created lazily once an entry starts.
            map.extend(entries.into_iter().map(|entry| (entry, None)));
        }
    }

    fn update_entry(&self, entry: &str, status: EntryStatus) {
        let Ok(mut map) = self.entries.write() else {
            return;
        };

        if status.is_final() {
            if let Some(Some(pb)) = map.remove(entry) {
                pb.finish_and_clear();
            }
            if let Some(main_pb) = self.main_progress.read().ok().and_then(|pb| pb.clone()) {
                main_pb.inc(1);
            }
            if let Ok(mut stats) = self.stats.write() {
                stats.record(&status);
            }
            if let EntryStatus::Failed(e) = &status {
                self.multi.println(format!("❌ {entry}: {e}")).ok();
            }
            return;
        }

        if let Some(entry_slot) = map.get_mut(entry) {
            let message = format!("⚙️  {entry}: {}", status.detail());
            match entry_slot {
                Some(pb) => pb.set_message(message),
                None => {
                    let pb = self.multi.add(indicatif::ProgressBar::new_spinner());
                    pb.set_style(
                        indicatif::ProgressStyle::default_spinner()
                            .template("   {msg}")
                            .unwrap(),
                    );
                    pb.set_message(message);
                    pb.enable_steady_tick(Duration::from_millis(100));
                    *entry_slot = Some(pb);
                }
            }
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
        if let Ok(map) = self.entries.read() {
            for pb in map.values().flatten() {
                pb.finish_and_clear();
            }
        }
        if let Some(main_pb) = self.main_progress.read().ok().and_then(|pb| pb.clone()) {
            main_pb.finish_and_clear();
        }
        self.phase_bar.finish_and_clear();
        if let Ok(stats) = self.stats.read() {
            stats.print_summary();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Phase(SyncPhase),
    Entry { name: String, status: EntryStatus },
    Info(String),
    Warn(String),
    Error(String),
    Finished,
}

impl ProgressEvent {
    pub fn message(&self) -> String {
        match self {
            ProgressEvent::Phase(phase) => phase.message(),
            ProgressEvent::Entry { name, status } => format!("{name}: {}", status.detail()),
            ProgressEvent::Info(message) => message.clone(),
            ProgressEvent::Warn(message) => format!("Warning: {message}"),
            ProgressEvent::Error(message) => format!("Error: {message}"),
            ProgressEvent::Finished => "Finished".to_owned(),
        }
    }

    /// Server-sent event line carrying `{"message": ...}`.
    pub fn to_event_line(&self) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "message": self.message() })
        )
    }
}

/// Forwards every report as a `ProgressEvent` over a channel.
///
/// Events sent after the receiver is dropped are discarded.
pub struct ChannelReporter {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}

impl ProgressReporter for ChannelReporter {
    fn set_phase(&self, phase: SyncPhase) {
        self.send(ProgressEvent::Phase(phase));
    }

    fn register_entries(&self, entries: Vec<String>) {
        self.send(ProgressEvent::Info(format!("Found {} units", entries.len())));
    }

    fn update_entry(&self, entry: &str, status: EntryStatus) {
        self.send(ProgressEvent::Entry {
            name: entry.to_owned(),
            status,
        });
    }

    fn log_info(&self, message: &str) {
        self.send(ProgressEvent::Info(message.to_owned()));
    }

    fn log_warn(&self, message: &str) {
        self.send(ProgressEvent::Warn(message.to_owned()));
    }

    fn log_error(&self, message: &str) {
        self.send(ProgressEvent::Error(message.to_owned()));
    }

    fn finish(&self) {
        self.send(ProgressEvent::Finished);
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
    fn test_channel_reporter_events() {
        let (reporter, mut receiver) = ChannelReporter::new();
        reporter.set_phase(SyncPhase::SyncingPages);
        reporter.update_entry("page:about", EntryStatus::Done);
        reporter.log_warn("asset a1 missing");
        reporter.finish();
        drop(reporter);

        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                ProgressEvent::Phase(SyncPhase::SyncingPages),
                ProgressEvent::Entry {
                    name: "page:about".into(),
                    status: EntryStatus::Done
                },
                ProgressEvent::Warn("asset a1 missing".into()),
                ProgressEvent::Finished,
            ]
        );
        assert_eq!(
            events[1].to_event_line(),
            "data: {\"message\":\"page:about: done\"}\n\n"
        );
    }
}
