use std::sync::atomic::{AtomicU64, Ordering};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Operation kinds tracked by [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// A full file pipeline run.
    FileProcessed,
    /// A summarization completion.
    Summary,
    /// A translation completion.
    Translation,
    /// A language detection completion.
    Detection,
    /// A speech synthesis call.
    Synthesis,
    /// A speech recognition call.
    Transcription,
}

/// Thread-safe counters describing request activity since startup.
pub struct PipelineMetrics {
    started_at: OffsetDateTime,
    files_processed: AtomicU64,
    summaries: AtomicU64,
    translations: AtomicU64,
    detections: AtomicU64,
    syntheses: AtomicU64,
    transcriptions: AtomicU64,
    failures: AtomicU64,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            started_at: OffsetDateTime::now_utc(),
            files_processed: AtomicU64::new(0),
            summaries: AtomicU64::new(0),
            translations: AtomicU64::new(0),
            detections: AtomicU64::new(0),
            syntheses: AtomicU64::new(0),
            transcriptions: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator stamped with the current time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful operation.
    pub fn record(&self, operation: Operation) {
        let counter = match operation {
            Operation::FileProcessed => &self.files_processed,
            Operation::Summary => &self.summaries,
            Operation::Translation => &self.translations,
            Operation::Detection => &self.detections,
            Operation::Synthesis => &self.syntheses,
            Operation::Transcription => &self.transcriptions,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that ended in an error.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            started_at: self.started_at.format(&Rfc3339).unwrap_or_default(),
            files_processed: self.files_processed.load(Ordering::Relaxed),
            summaries: self.summaries.load(Ordering::Relaxed),
            translations: self.translations.load(Ordering::Relaxed),
            detections: self.detections.load(Ordering::Relaxed),
            syntheses: self.syntheses.load(Ordering::Relaxed),
            transcriptions: self.transcriptions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of request counters used for reporting.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Process start time formatted as RFC3339.
    pub started_at: String,
    /// Completed file pipeline runs.
    pub files_processed: u64,
    /// Completed summarizations.
    pub summaries: u64,
    /// Completed translations.
    pub translations: u64,
    /// Completed language detections.
    pub detections: u64,
    /// Completed speech syntheses.
    pub syntheses: u64,
    /// Completed speech recognitions.
    pub transcriptions: u64,
    /// Requests that ended in an error.
    pub failures: u64,
}
