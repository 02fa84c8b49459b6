//! Append-only delivery log for relayed events.
//!
//! Writes one JSON line per relay stage to `{data_dir}/events.log`,
//! rotating to `events.log.1` at 50 MB. Each relayed event produces a
//! `received` record, a `sent` record, a `success` or `error` record for
//! the Meta response, and a closing `complete` record with the total
//! duration. The dashboard reads these back through the logs endpoints
//! (filter, stats, download, clear).
//!
//! Signal bodies are deliberately NOT logged — identity fields are PII —
//! and access tokens are masked before they reach disk.

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};

/// Maximum log file size before rotation (50 MB).
const ROTATE_BYTES: u64 = 50 * 1024 * 1024;

/// How many entries `stats()` keeps in `recent_activity`.
const RECENT_ACTIVITY_LIMIT: usize = 10;

// ─── Records ──────────────────────────────────────────────────────────────────

/// One structured JSON line in the delivery log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// RFC-3339 timestamp of when the stage was recorded.
    pub timestamp: String,
    /// `"INFO"` | `"ERROR"`.
    pub level: String,
    /// `"received"` | `"sent"` | `"success"` | `"error"` | `"complete"`.
    pub stage: String,
    /// Meta event name, e.g. `"Purchase"`.
    pub event: String,
    /// GTM container the event was relayed for.
    pub container: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_id: Option<String>,
    /// Masked access token (`first10…last10`), present on `sent` records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Meta response body, present on `success` records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Outcome of the whole cycle, present on `complete` records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

impl DeliveryRecord {
    fn new(level: &str, stage: &str, event: &str, container: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            level: level.to_string(),
            stage: stage.to_string(),
            event: event.to_string(),
            container: container.to_string(),
            pixel_id: None,
            access_token: None,
            response: None,
            error: None,
            duration_ms: None,
            success: None,
        }
    }
}

/// Mask an access token down to `first10…last10` for log output.
pub fn mask_access_token(token: &str) -> String {
    let count = token.chars().count();
    if count > 20 {
        let head: String = token.chars().take(10).collect();
        let tail: String = token.chars().skip(count - 10).collect();
        format!("{head}…{tail}")
    } else {
        "***".to_string()
    }
}

// ─── Query & stats ────────────────────────────────────────────────────────────

/// Filters for reading the log back. All matching is case-insensitive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
    pub level: Option<String>,
    pub event: Option<String>,
    pub container: Option<String>,
}

const DEFAULT_QUERY_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct LogStats {
    pub total_events: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub info_count: u64,
    pub events_by_type: HashMap<String, u64>,
    pub recent_activity: Vec<DeliveryRecord>,
}

// ─── Log ──────────────────────────────────────────────────────────────────────

/// Append-only structured delivery log.
///
/// The file handle is cached for the process lifetime to avoid an
/// `open()` syscall on every relayed event.
pub struct DeliveryLog {
    path: PathBuf,
    /// Cached, open file handle; `None` until the first write.
    file: Mutex<Option<tokio::fs::File>>,
}

impl DeliveryLog {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("events.log"),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ─── Stage-specific append methods ───────────────────────────────────────

    pub async fn received(&self, event: &str, container: &str) {
        self.append(DeliveryRecord::new("INFO", "received", event, container))
            .await;
    }

    pub async fn sent(&self, event: &str, container: &str, pixel_id: &str, access_token: &str) {
        let mut record = DeliveryRecord::new("INFO", "sent", event, container);
        record.pixel_id = Some(pixel_id.to_string());
        record.access_token = Some(mask_access_token(access_token));
        self.append(record).await;
    }

    pub async fn success(&self, event: &str, container: &str, response: Value) {
        let mut record = DeliveryRecord::new("INFO", "success", event, container);
        record.response = Some(response);
        self.append(record).await;
    }

    pub async fn error(&self, event: &str, container: &str, error: &str) {
        let mut record = DeliveryRecord::new("ERROR", "error", event, container);
        record.error = Some(error.to_string());
        self.append(record).await;
    }

    pub async fn complete(&self, event: &str, container: &str, duration_ms: u64, success: bool) {
        let level = if success { "INFO" } else { "ERROR" };
        let mut record = DeliveryRecord::new(level, "complete", event, container);
        record.duration_ms = Some(duration_ms);
        record.success = Some(success);
        self.append(record).await;
    }

    /// Append one record. Errors are logged at WARN level and never
    /// propagated — a broken delivery log must not break the relay.
    pub async fn append(&self, record: DeliveryRecord) {
        if let Err(e) = self.try_append(&record).await {
            tracing::warn!(err = %e, "delivery log write failed");
        }
    }

    async fn try_append(&self, record: &DeliveryRecord) -> Result<()> {
        let line = serde_json::to_string(record)? + "\n";
        let bytes = line.as_bytes();

        let mut guard = self.file.lock().await;

        // Rotation check: if the on-disk file has grown past 50 MB, close the
        // handle and rename the file before opening a fresh one.
        if guard.is_some() {
            if let Ok(meta) = tokio::fs::metadata(&self.path).await {
                if meta.len() >= ROTATE_BYTES {
                    *guard = None; // drop file handle (flushes on drop)
                    let rotated = self.path.with_extension("log.1");
                    let _ = tokio::fs::rename(&self.path, &rotated).await;
                }
            }
        }

        // Open (or re-open after rotation) lazily.
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            *guard = Some(f);
        }

        if let Some(f) = guard.as_mut() {
            f.write_all(bytes).await?;
        }
        Ok(())
    }

    // ─── Read-back ───────────────────────────────────────────────────────────

    /// Read the log back, newest first, applying the query's filters.
    /// A missing log file is an empty result, not an error.
    pub async fn query(&self, query: &LogQuery) -> Result<Vec<DeliveryRecord>> {
        let mut records = self.read_all().await?;

        let matches = |filter: &Option<String>, value: &str| -> bool {
            match filter.as_deref().filter(|f| !f.is_empty()) {
                Some(f) => f.eq_ignore_ascii_case(value),
                None => true,
            }
        };
        records.retain(|r| {
            matches(&query.level, &r.level)
                && matches(&query.event, &r.event)
                && matches(&query.container, &r.container)
        });

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(query.limit.unwrap_or(DEFAULT_QUERY_LIMIT));
        Ok(records)
    }

    /// Aggregate counters over the whole log.
    pub async fn stats(&self) -> Result<LogStats> {
        let records = self.read_all().await?;

        let mut stats = LogStats {
            total_events: 0,
            success_count: 0,
            error_count: 0,
            info_count: 0,
            events_by_type: HashMap::new(),
            recent_activity: Vec::new(),
        };
        for record in &records {
            stats.total_events += 1;
            if record.stage == "success" {
                stats.success_count += 1;
            } else if record.level == "ERROR" {
                stats.error_count += 1;
            } else {
                stats.info_count += 1;
            }
            *stats.events_by_type.entry(record.event.clone()).or_insert(0) += 1;
        }
        stats.recent_activity = records
            .into_iter()
            .rev()
            .take(RECENT_ACTIVITY_LIMIT)
            .collect();
        Ok(stats)
    }

    /// Truncate the log file. The cached handle is dropped so the next
    /// append starts on the fresh file.
    pub async fn clear(&self) -> Result<()> {
        let mut guard = self.file.lock().await;
        *guard = None;
        tokio::fs::write(&self.path, b"").await?;
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<DeliveryRecord>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
