use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
pub use chatsink_classifier::{ClassifierConfig, Disposition, IngestClassifier};
use chatsink_model::{Event, LogId};
use chatsink_store::{EventStore, FileEventStore, RollingLimits};
use tracing::{debug, info, instrument};

pub use chatsink_classifier::{AmendReason, Amendment, Suppression};

#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    root: PathBuf,
    limits: RollingLimits,
    classifier: ClassifierConfig,
}

impl PipelineBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            limits: RollingLimits::default(),
            classifier: ClassifierConfig::default(),
        }
    }

    pub fn limits(mut self, limits: RollingLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn classifier_config(mut self, config: ClassifierConfig) -> Self {
        self.classifier = config;
        self
    }

    pub fn build(self) -> Result<IngestPipeline> {
        let store = Arc::new(FileEventStore::new(self.root, self.limits));
        let classifier =
            IngestClassifier::new(self.classifier).context("failed building classifier")?;
        Ok(IngestPipeline::new(store, classifier))
    }
}

/// Result of one ingest cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub disposition: Disposition,
    /// Filtered-log entries removed because the event superseded them.
    pub removed: usize,
}

/// Classifies incoming events against persisted history and writes them out.
///
/// Every cycle re-reads the filtered log, so decisions always reflect what
/// was last durably written. Cycles are serialized: two events never observe
/// the same pre-write history.
#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<dyn EventStore>,
    classifier: Arc<IngestClassifier>,
    cycle: Arc<tokio::sync::Mutex<()>>,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn EventStore>, classifier: IngestClassifier) -> Self {
        Self {
            store,
            classifier: Arc::new(classifier),
            cycle: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    #[instrument(skip(self, event), fields(platform = %event.platform, role = %event.role))]
    pub async fn ingest(&self, event: Event) -> Result<IngestOutcome> {
        let _guard = self.cycle.lock().await;

        let history = self.history().await?;
        let disposition = self.classifier.classify(&event, &history);

        self.store.append(LogId::Verbose, &event).await?;
        self.store.append(LogId::Recent, &event).await?;

        let mut removed = 0;
        match &disposition {
            Disposition::KeepFiltered => {
                self.store.append(LogId::Filtered, &event).await?;
                info!(
                    chars = event.char_len(),
                    content = %event.preview(),
                    tools = ?event.metadata.tools,
                    "event saved to filtered log"
                );
            }
            Disposition::KeepFilteredAndAmend(amendment) => {
                let superseded = &amendment.superseded;
                let taken = AtomicBool::new(false);
                let predicate = |entry: &Event| {
                    entry.is_same_capture(superseded) && !taken.swap(true, Ordering::Relaxed)
                };
                removed = self
                    .store
                    .remove_matching(LogId::Filtered, &predicate)
                    .await?;
                self.store.append(LogId::Filtered, &event).await?;
                info!(
                    reason = %amendment.reason,
                    removed,
                    superseded = %superseded.preview(),
                    content = %event.preview(),
                    "event saved to filtered log, superseded entry removed"
                );
            }
            Disposition::VerboseOnly(suppression) => {
                info!(
                    reason = %suppression,
                    content = %event.preview(),
                    "event kept out of filtered log"
                );
            }
        }

        Ok(IngestOutcome {
            disposition,
            removed,
        })
    }

    /// Classifies `event` against current history without writing anything.
    pub async fn preview(&self, event: &Event) -> Result<Disposition> {
        let _guard = self.cycle.lock().await;
        let history = self.history().await?;
        Ok(self.classifier.classify(event, &history))
    }

    /// Appends a diagnostic or analytics record to its own rolling log.
    pub async fn record(&self, log: LogId, record: &serde_json::Value) -> Result<()> {
        self.store.append_record(log, record).await
    }

    pub async fn read_recent(&self, log: LogId, limit: usize) -> Result<Vec<Event>> {
        self.store.read_recent(log, limit).await
    }

    async fn history(&self) -> Result<Vec<Event>> {
        let depth = self.classifier.config().history_depth;
        let history = self.store.read_recent(LogId::Filtered, depth).await?;
        debug!(entries = history.len(), "filtered history loaded");
        Ok(history)
    }
}
