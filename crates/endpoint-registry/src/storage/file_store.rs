//! JSON file backend
//!
//! Layout: `{ "mappings": [...], "lastUpdated": "<rfc3339>" }`.
//!
//! The whole file is loaded once into an immutable snapshot. Readers clone the
//! snapshot `Arc` and never wait on a write; writers build a new snapshot,
//! persist it with write-to-temp + rename, then swap it in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use zk_gateway_common::Result;

use super::EndpointStore;
use crate::models::EndpointMapping;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndpointFile {
    #[serde(default)]
    mappings: Vec<EndpointMapping>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Snapshot {
    mappings: Vec<EndpointMapping>,
    by_hash: HashMap<String, usize>,
}

impl Snapshot {
    fn new(mappings: Vec<EndpointMapping>) -> Self {
        let by_hash = mappings
            .iter()
            .enumerate()
            .map(|(i, m)| (m.hash.clone(), i))
            .collect();
        Self { mappings, by_hash }
    }

    fn get(&self, hash: &str) -> Option<&EndpointMapping> {
        self.by_hash.get(hash).map(|&i| &self.mappings[i])
    }
}

/// Endpoint store persisted to a single JSON file
pub struct FileEndpointStore {
    path: PathBuf,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl FileEndpointStore {
    /// Open the store, loading any existing mappings.
    ///
    /// An unreadable or corrupt file does not fail the open: it is moved aside
    /// to `<path>.corrupt` and the registry starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mappings = load_mappings(&path).await;
        info!(
            "Loaded {} endpoint mappings from {}",
            mappings.len(),
            path.display()
        );

        Ok(Self {
            path,
            snapshot: RwLock::new(Arc::new(Snapshot::new(mappings))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    async fn persist(&self, mappings: &[EndpointMapping]) -> Result<()> {
        let file = EndpointFileRef {
            mappings,
            last_updated: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut tmp = tokio::fs::File::create(&tmp_path).await?;
        tmp.write_all(&json).await?;
        tmp.sync_all().await?;
        drop(tmp);
        tokio::fs::rename(&tmp_path, &self.path).await?;

        debug!("Endpoint mappings saved to {}", self.path.display());
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EndpointFileRef<'a> {
    mappings: &'a [EndpointMapping],
    last_updated: DateTime<Utc>,
}

async fn load_mappings(path: &Path) -> Vec<EndpointMapping> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(
                "Failed to read endpoint mappings from {}: {}; starting empty",
                path.display(),
                e
            );
            return Vec::new();
        }
    };

    match serde_json::from_slice::<EndpointFile>(&data) {
        Ok(file) => file.mappings,
        Err(e) => {
            let mut aside = path.as_os_str().to_owned();
            aside.push(".corrupt");
            warn!(
                "Endpoint mappings file {} is corrupt ({}); moving it to {:?} and starting empty",
                path.display(),
                e,
                aside
            );
            if let Err(e) = tokio::fs::rename(path, &aside).await {
                warn!("Failed to move corrupt mappings file aside: {}", e);
            }
            Vec::new()
        }
    }
}

#[async_trait]
impl EndpointStore for FileEndpointStore {
    async fn get(&self, hash: &str) -> Result<Option<EndpointMapping>> {
        Ok(self.current().await.get(hash).cloned())
    }

    async fn put(&self, mappings: Vec<EndpointMapping>) -> Result<()> {
        if mappings.is_empty() {
            return Ok(());
        }

        let mut next = self.current().await.mappings.clone();
        next.extend(mappings);
        self.persist(&next).await?;

        *self.snapshot.write().await = Arc::new(Snapshot::new(next));
        Ok(())
    }

    async fn list(&self) -> Result<Vec<EndpointMapping>> {
        Ok(self.current().await.mappings.clone())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        *self.snapshot.write().await = Arc::new(Snapshot::default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("endpoints.json");

        let store = FileEndpointStore::open(&path).await.unwrap();
        let mapping = EndpointMapping::new("https://api.example.com/data".into(), "acme".into());
        store.put(vec![mapping.clone()]).await.unwrap();

        assert_eq!(store.get(&mapping.hash).await.unwrap(), Some(mapping.clone()));

        let reopened = FileEndpointStore::open(&path).await.unwrap();
        assert_eq!(reopened.list().await.unwrap(), vec![mapping]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("endpoints.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = FileEndpointStore::open(&path).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(dir.path().join("endpoints.json.corrupt").exists());

        // The store remains writable after degrading
        let mapping = EndpointMapping::new("https://a.test".into(), "org".into());
        store.put(vec![mapping.clone()]).await.unwrap();
        assert_eq!(store.get(&mapping.hash).await.unwrap(), Some(mapping));
    }

    #[tokio::test]
    async fn test_file_without_mappings_key_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("endpoints.json");
        std::fs::write(&path, br#"{"lastUpdated":"2024-01-01T00:00:00Z"}"#).unwrap();

        let store = FileEndpointStore::open(&path).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("endpoints.json");

        let store = FileEndpointStore::open(&path).await.unwrap();
        store
            .put(vec![EndpointMapping::new("https://a.test".into(), "org".into())])
            .await
            .unwrap();
        assert!(path.exists());

        store.clear().await.unwrap();
        assert!(!path.exists());
        assert!(store.list().await.unwrap().is_empty());

        // Clearing twice is fine
        store.clear().await.unwrap();
    }
}
