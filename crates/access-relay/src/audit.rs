//! Access log
//!
//! One JSON record per authorized request, appended after dispatch, and one
//! per request refused after its nullifier was extracted. Logging is
//! best-effort: a failed write is reported through tracing and never changes
//! the outcome returned to the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;
use zk_gateway_common::{Nullifier, Result};

use crate::models::RelayPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessOutcome {
    Authorized,
    DispatchFailed,
    /// Refused after signal extraction; `error` holds the reason code
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub nullifier: Nullifier,
    /// Absent when the endpoint hash did not resolve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_endpoint: Option<String>,
    /// Sensitive header values are redacted before the entry is built
    pub payload: RelayPayload,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub organization_commitment: String,
    pub endpoint_hash: String,
    pub outcome: AccessOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct AccessLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AccessLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry; failures are logged and swallowed
    pub async fn append(&self, entry: &AccessLogEntry) {
        if let Err(e) = self.try_append(entry).await {
            tracing::warn!(
                "Failed to write access log entry {} to {}: {}",
                entry.request_id,
                self.path.display(),
                e
            );
        }
    }

    async fn try_append(&self, entry: &AccessLogEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read back every readable entry, skipping corrupt lines
    pub async fn entries(&self) -> Result<Vec<AccessLogEntry>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (idx, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(
                    "Skipping corrupt access log line {}:{}: {}",
                    self.path.display(),
                    idx + 1,
                    e
                ),
            }
        }
        Ok(entries)
    }
}
