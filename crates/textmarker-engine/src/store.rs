/*!
 * Highlight persistence.
 *
 * The storage collaborator is an async key-value surface keyed by document
 * identifier. [`AnchorStore`] layers the whole-sequence read-modify-write
 * CRUD on top of it: there is no partial-update primitive, so every append
 * and removal reads the full list, edits it, and writes it back. A
 * per-document-identifier lock keeps two such sequences for the same
 * document from interleaving inside one process; across processes the last
 * writer wins, silently and by design.
 *
 * Storage failures are not retried anywhere — they propagate to the caller
 * of the triggering operation.
 */

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::highlight::{Highlight, HighlightId};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read highlight store {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write highlight store {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("highlight store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// The persistence collaborator: async get/set keyed by document identifier.
#[async_trait]
pub trait HighlightStorage: Send + Sync {
    /// Full highlight list for a document, `None` when the document has
    /// never been saved.
    async fn load(&self, document_id: &str) -> Result<Option<Vec<Highlight>>, StorageError>;

    /// Replace the document's full highlight list.
    async fn save(&self, document_id: &str, highlights: &[Highlight]) -> Result<(), StorageError>;

    /// Drop the document's entry entirely.
    async fn clear(&self, document_id: &str) -> Result<(), StorageError>;
}

/// In-memory storage for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Vec<Highlight>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HighlightStorage for MemoryStorage {
    async fn load(&self, document_id: &str) -> Result<Option<Vec<Highlight>>, StorageError> {
        Ok(self.entries.lock().await.get(document_id).cloned())
    }

    async fn save(&self, document_id: &str, highlights: &[Highlight]) -> Result<(), StorageError> {
        self.entries
            .lock()
            .await
            .insert(document_id.to_string(), highlights.to_vec());
        Ok(())
    }

    async fn clear(&self, document_id: &str) -> Result<(), StorageError> {
        self.entries.lock().await.remove(document_id);
        Ok(())
    }
}

/// File-backed storage: one JSON document mapping document identifiers to
/// their highlight lists. The map is a `BTreeMap` so the file serializes in
/// a stable key order.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

type StoreMap = BTreeMap<String, Vec<Highlight>>;

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<StoreMap, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
                    path: self.path.clone(),
                    source,
                })
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(StoreMap::new()),
            Err(source) => Err(StorageError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn write_map(&self, map: &StoreMap) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Write {
                    path: self.path.clone(),
                    source,
                })?;
        }
        let content = serde_json::to_string_pretty(map).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|source| StorageError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

#[async_trait]
impl HighlightStorage for JsonFileStorage {
    async fn load(&self, document_id: &str) -> Result<Option<Vec<Highlight>>, StorageError> {
        Ok(self.read_map().await?.remove(document_id))
    }

    async fn save(&self, document_id: &str, highlights: &[Highlight]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(document_id.to_string(), highlights.to_vec());
        self.write_map(&map).await
    }

    async fn clear(&self, document_id: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map().await?;
        if map.remove(document_id).is_none() {
            return Ok(());
        }
        self.write_map(&map).await
    }
}

/// CRUD over a document's ordered highlight list.
///
/// Insertion order equals creation order and is semantically meaningful:
/// replay walks the list front to back.
pub struct AnchorStore<S> {
    storage: S,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: HighlightStorage> AnchorStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn document_lock(&self, document_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(document_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// The document's highlight list in creation order, empty if none.
    pub async fn get(&self, document_id: &str) -> Result<Vec<Highlight>, StorageError> {
        Ok(self.storage.load(document_id).await?.unwrap_or_default())
    }

    /// Read the full list, append, write the full list back.
    pub async fn append(
        &self,
        document_id: &str,
        highlight: Highlight,
    ) -> Result<(), StorageError> {
        let lock = self.document_lock(document_id).await;
        let _guard = lock.lock().await;
        let mut highlights = self.storage.load(document_id).await?.unwrap_or_default();
        highlights.push(highlight);
        self.storage.save(document_id, &highlights).await
    }

    /// Filter out one highlight by id. Returns whether it was present.
    pub async fn remove(
        &self,
        document_id: &str,
        id: HighlightId,
    ) -> Result<bool, StorageError> {
        let lock = self.document_lock(document_id).await;
        let _guard = lock.lock().await;
        let mut highlights = self.storage.load(document_id).await?.unwrap_or_default();
        let before = highlights.len();
        highlights.retain(|highlight| highlight.id != id);
        if highlights.len() == before {
            return Ok(false);
        }
        self.storage.save(document_id, &highlights).await?;
        Ok(true)
    }

    /// Delete the document's entry entirely.
    pub async fn clear_all(&self, document_id: &str) -> Result<(), StorageError> {
        let lock = self.document_lock(document_id).await;
        let _guard = lock.lock().await;
        self.storage.clear(document_id).await
    }
}
