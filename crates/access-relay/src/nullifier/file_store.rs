//! Append-only file backend
//!
//! One JSON-encoded nullifier per line. The full set is cached in memory; the
//! cache is only updated after the line has been flushed and synced, so it is
//! never the sole record of a consumed nullifier.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use zk_gateway_common::{Error, Nullifier, Result};

use super::{ConsumeOutcome, NullifierStore};

struct Inner {
    consumed: HashSet<Nullifier>,
    file: File,
    /// Length of the file up to the last acknowledged record
    len: u64,
}

/// Nullifier store persisted to an append-only JSON-lines file
pub struct FileNullifierStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl FileNullifierStore {
    /// Open the store, replaying every recorded nullifier.
    ///
    /// A trailing record without its newline was never acknowledged: if it
    /// does not parse it is dropped. Any other unreadable record fails the
    /// open, since starting without it would re-admit a consumed nullifier.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let loaded = load(&path).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let mut len = loaded.valid_len;
        if loaded.truncate {
            file.set_len(len).await?;
        }
        if loaded.missing_newline {
            file.write_all(b"\n").await?;
            file.flush().await?;
            file.sync_data().await?;
            len += 1;
        }

        info!(
            "Loaded {} consumed nullifiers from {}",
            loaded.consumed.len(),
            path.display()
        );

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                consumed: loaded.consumed,
                file,
                len,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct Loaded {
    consumed: HashSet<Nullifier>,
    valid_len: u64,
    truncate: bool,
    missing_newline: bool,
}

async fn load(path: &Path) -> Result<Loaded> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    let mut loaded = Loaded {
        consumed: HashSet::new(),
        valid_len: 0,
        truncate: false,
        missing_newline: false,
    };

    let mut offset = 0usize;
    let mut line_no = 0usize;
    while offset < data.len() {
        line_no += 1;
        let (line, terminated) = match data[offset..].iter().position(|&b| b == b'\n') {
            Some(end) => (&data[offset..offset + end], true),
            None => (&data[offset..], false),
        };
        let next = offset + line.len() + usize::from(terminated);

        if line.iter().all(u8::is_ascii_whitespace) {
            offset = next;
            loaded.valid_len = next as u64;
            continue;
        }

        match serde_json::from_slice::<Nullifier>(line) {
            Ok(nullifier) => {
                loaded.consumed.insert(nullifier);
                loaded.missing_newline = !terminated;
            }
            Err(e) if !terminated => {
                warn!(
                    "Dropping unterminated nullifier record at {}:{}: {}",
                    path.display(),
                    line_no,
                    e
                );
                loaded.truncate = true;
                break;
            }
            Err(e) => {
                error!(
                    "Corrupt nullifier record at {}:{}: {}",
                    path.display(),
                    line_no,
                    e
                );
                return Err(Error::Storage(format!(
                    "corrupt nullifier record at {}:{}",
                    path.display(),
                    line_no
                )));
            }
        }

        offset = next;
        loaded.valid_len = next as u64;
    }

    Ok(loaded)
}

#[async_trait]
impl NullifierStore for FileNullifierStore {
    async fn try_consume(&self, nullifier: &Nullifier) -> Result<ConsumeOutcome> {
        let mut inner = self.inner.lock().await;
        if inner.consumed.contains(nullifier) {
            return Ok(ConsumeOutcome::AlreadyConsumed);
        }

        let mut record = serde_json::to_vec(nullifier)?;
        record.push(b'\n');

        let written = async {
            inner.file.write_all(&record).await?;
            inner.file.flush().await?;
            inner.file.sync_data().await
        }
        .await;

        if let Err(e) = written {
            error!("Failed to persist nullifier {}: {}", nullifier, e);
            let len = inner.len;
            if let Err(e) = inner.file.set_len(len).await {
                warn!("Failed to roll back partial nullifier record: {}", e);
            }
            return Err(e.into());
        }

        inner.len += record.len() as u64;
        inner.consumed.insert(nullifier.clone());
        Ok(ConsumeOutcome::Consumed)
    }

    async fn is_consumed(&self, nullifier: &Nullifier) -> Result<bool> {
        Ok(self.inner.lock().await.consumed.contains(nullifier))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.lock().await.consumed.len())
    }
}
