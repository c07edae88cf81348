use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chatsink_model::{Event, LogId};
use parking_lot::Mutex;
use tokio::fs;
use tracing::{debug, instrument, warn};

/// Predicate used to pick entries out of a log.
pub type EventPredicate<'a> = &'a (dyn Fn(&Event) -> bool + Send + Sync);

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends one event and evicts the oldest lines beyond the log's cap.
    async fn append(&self, log: LogId, event: &Event) -> Result<()>;
    /// Appends an arbitrary JSON record to an auxiliary log.
    async fn append_record(&self, log: LogId, record: &serde_json::Value) -> Result<()>;
    /// Returns up to the last `n` well-formed events, oldest first.
    async fn read_recent(&self, log: LogId, n: usize) -> Result<Vec<Event>>;
    /// Rewrites the log without the events matching `predicate`.
    async fn remove_matching(&self, log: LogId, predicate: EventPredicate<'_>) -> Result<usize>;
}

/// Per-log maximum line counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingLimits {
    pub verbose: usize,
    pub filtered: usize,
    pub recent: usize,
    pub diagnostic: usize,
    pub analytics: usize,
}

impl RollingLimits {
    pub fn limit_for(&self, log: LogId) -> usize {
        match log {
            LogId::Verbose => self.verbose,
            LogId::Filtered => self.filtered,
            LogId::Recent => self.recent,
            LogId::Diagnostic => self.diagnostic,
            LogId::Analytics => self.analytics,
        }
    }

    /// Same cap for the verbose and filtered logs.
    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.verbose = max_lines;
        self.filtered = max_lines;
        self
    }

    pub fn with_recent_lines(mut self, recent_lines: usize) -> Self {
        self.recent = recent_lines;
        self
    }
}

impl Default for RollingLimits {
    fn default() -> Self {
        Self {
            verbose: 100,
            filtered: 100,
            recent: 2,
            diagnostic: 1000,
            analytics: 2000,
        }
    }
}

/// Rolling logs stored as newline-delimited JSON files under one directory.
///
/// Every write is a read-modify-write of the whole file, replaced through a
/// temporary file and a rename. Writers to the same log are serialized by a
/// per-log lock; separate processes writing the same directory are not.
#[derive(Debug)]
pub struct FileEventStore {
    root: PathBuf,
    limits: RollingLimits,
    write_locks: Mutex<HashMap<LogId, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileEventStore {
    pub fn new(root: impl Into<PathBuf>, limits: RollingLimits) -> Self {
        Self {
            root: root.into(),
            limits,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn limits(&self) -> RollingLimits {
        self.limits
    }

    pub fn file_path(&self, log: LogId) -> PathBuf {
        self.root.join(log.file_name())
    }

    fn lock_for(&self, log: LogId) -> Arc<tokio::sync::Mutex<()>> {
        let mut guard = self.write_locks.lock();
        guard
            .entry(log)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn read_lines(path: &Path) -> Result<Vec<String>> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed reading log {path:?}"))?;
        Ok(raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_owned)
            .collect())
    }

    async fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create log dir {parent:?}"))?;
        }

        let mut body = lines.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, body)
            .await
            .with_context(|| format!("failed writing log {tmp:?}"))?;
        fs::rename(&tmp, path)
            .await
            .with_context(|| format!("failed replacing log {path:?}"))?;
        Ok(())
    }

    async fn append_line(&self, log: LogId, line: String) -> Result<()> {
        let path = self.file_path(log);
        let max_lines = self.limits.limit_for(log);

        let lock = self.lock_for(log);
        let _guard = lock.lock().await;

        let mut lines = Self::read_lines(&path).await?;
        lines.push(line);
        if lines.len() > max_lines {
            let evicted = lines.len() - max_lines;
            lines.drain(..evicted);
            debug!(evicted, max_lines, "oldest lines evicted");
        }
        Self::write_lines(&path, &lines).await
    }
}

#[async_trait]
impl EventStore for FileEventStore {
    #[instrument(skip(self, event), fields(log = %log, role = %event.role, platform = %event.platform))]
    async fn append(&self, log: LogId, event: &Event) -> Result<()> {
        let line = event.to_line().context("failed serializing event")?;
        self.append_line(log, line).await?;
        debug!("event appended to log");
        Ok(())
    }

    #[instrument(skip(self, record), fields(log = %log))]
    async fn append_record(&self, log: LogId, record: &serde_json::Value) -> Result<()> {
        let line = serde_json::to_string(record).context("failed serializing record")?;
        self.append_line(log, line).await
    }

    #[instrument(skip(self), fields(log = %log))]
    async fn read_recent(&self, log: LogId, n: usize) -> Result<Vec<Event>> {
        let path = self.file_path(log);
        let lines = Self::read_lines(&path).await?;

        let mut out = Vec::with_capacity(n.min(lines.len()));
        for line in lines.iter().rev() {
            if out.len() >= n {
                break;
            }
            match Event::from_line(line) {
                Ok(event) => out.push(event),
                Err(error) => warn!(%error, path = ?path, "skipping malformed log line"),
            }
        }
        out.reverse();
        debug!(count = out.len(), "events loaded from log");
        Ok(out)
    }

    #[instrument(skip(self, predicate), fields(log = %log))]
    async fn remove_matching(&self, log: LogId, predicate: EventPredicate<'_>) -> Result<usize> {
        let path = self.file_path(log);

        let lock = self.lock_for(log);
        let _guard = lock.lock().await;

        let lines = Self::read_lines(&path).await?;
        let before = lines.len();
        let kept: Vec<String> = lines
            .into_iter()
            .filter(|line| match Event::from_line(line) {
                Ok(event) => !predicate(&event),
                Err(_) => true,
            })
            .collect();

        let removed = before - kept.len();
        if removed > 0 {
            Self::write_lines(&path, &kept).await?;
            debug!(removed, "entries removed from log");
        }
        Ok(removed)
    }
}
