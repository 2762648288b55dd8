//! Append-only audit trail for executed batches.
//!
//! Every execution batch is recorded as one JSON line in a per-tenant,
//! per-day file. Audit failures must never block execution; callers log the
//! error and fall back to the console sink.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::models::ExecutionBatch;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to create audit directory {path}: {source}")]
    CreateDir { path: String, source: std::io::Error },

    #[error("failed to write audit record to {path}: {source}")]
    Write { path: String, source: std::io::Error },

    #[error("failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Proof that a batch was durably recorded.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReceipt {
    pub status: String,
    pub location: String,
    pub timestamp: String,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, tenant: &str, batch: &ExecutionBatch) -> Result<AuditReceipt, AuditError>;
}

/// Appends batches as JSON lines under `<root>/<tenant>/<YYYY-MM-DD>.json`.
pub struct FileAuditSink {
    root: PathBuf,
}

impl FileAuditSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn record(&self, tenant: &str, batch: &ExecutionBatch) -> Result<AuditReceipt, AuditError> {
        let dir = self.root.join(tenant);
        tokio::fs::create_dir_all(&dir).await.map_err(|source| AuditError::CreateDir {
            path: dir.display().to_string(),
            source,
        })?;

        let path = dir.join(format!("{}.json", Utc::now().format("%Y-%m-%d")));
        let mut line = serde_json::to_string(batch)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| AuditError::Write { path: path.display().to_string(), source })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| AuditError::Write { path: path.display().to_string(), source })?;
        file.flush()
            .await
            .map_err(|source| AuditError::Write { path: path.display().to_string(), source })?;

        tracing::debug!(tenant, batch_id = %batch.batch_id, path = %path.display(), "batch audited");
        Ok(AuditReceipt {
            status: "recorded".to_string(),
            location: path.display().to_string(),
            timestamp: Utc::now().to_rfc3339(),
        })
    }
}

/// Last-resort sink when the file sink is unavailable.
pub struct ConsoleAuditSink;

#[async_trait]
impl AuditSink for ConsoleAuditSink {
    async fn record(&self, tenant: &str, batch: &ExecutionBatch) -> Result<AuditReceipt, AuditError> {
        let line = serde_json::to_string(batch)?;
        tracing::info!(tenant, audit = %line, "execution batch (console audit)");
        Ok(AuditReceipt {
            status: "logged".to_string(),
            location: "console".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExecutionSummary;

    fn batch(id: &str) -> ExecutionBatch {
        ExecutionBatch {
            batch_id: id.to_string(),
            results: vec![],
            summary: ExecutionSummary {
                total_processed: 0,
                success: 0,
                failed: 0,
                skipped: 0,
                dry_run: true,
            },
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_file_sink_appends_one_line_per_batch() {
        let dir = std::env::temp_dir().join(format!("audit-test-{}", uuid::Uuid::new_v4()));
        let sink = FileAuditSink::new(&dir);

        let receipt = sink.record("acme", &batch("b-1")).await.unwrap();
        sink.record("acme", &batch("b-2")).await.unwrap();
        assert_eq!(receipt.status, "recorded");

        let path = std::path::PathBuf::from(&receipt.location);
        assert!(path.starts_with(dir.join("acme")));
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: ExecutionBatch = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.batch_id, "b-1");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let dir = std::env::temp_dir().join(format!("audit-test-{}", uuid::Uuid::new_v4()));
        let sink = FileAuditSink::new(&dir);

        let a = sink.record("tenant_a", &batch("b-1")).await.unwrap();
        let b = sink.record("tenant_b", &batch("b-2")).await.unwrap();
        assert_ne!(a.location, b.location);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_console_sink_always_succeeds() {
        let receipt = ConsoleAuditSink.record("acme", &batch("b-1")).await.unwrap();
        assert_eq!(receipt.location, "console");
    }
}
