//! Per-query result cache
//!
//! One pretty-printed JSON document per query under the cache root. The
//! file stem is the percent-encoded query, so any query maps to a single
//! safe file name and can be recovered from it. Featured listings live in
//! a reserved document that no encoded query can collide with.
//!
//! Writes go to a temp file in the cache root which is then renamed over
//! the target, so a crash never leaves a truncated entry behind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::record::{Query, ResultRecord};

/// Reserved document holding featured listings (`@` never survives encoding).
pub const FEATURED_DOCUMENT: &str = "@featured.json";

const EXTENSION: &str = "json";

/// On-disk shape of one cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    query: String,
    /// Unix seconds
    saved_at: u64,
    records: Vec<ResultRecord>,
}

/// Size of one cache document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheFileInfo {
    pub name: String,
    pub size: u64,
}

/// Summary of the cache directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub cache_dir: PathBuf,
    pub file_count: usize,
    pub total_size_bytes: u64,
    pub files: Vec<CacheFileInfo>,
    pub queries: Vec<String>,
}

impl CacheStats {
    /// Total size in megabytes, rounded to two decimals.
    pub fn total_size_mb(&self) -> f64 {
        let mb = self.total_size_bytes as f64 / 1024.0 / 1024.0;
        (mb * 100.0).round() / 100.0
    }
}

/// File-backed cache keyed by query.
#[derive(Debug, Clone)]
pub struct QueryCache {
    root: PathBuf,
}

impl QueryCache {
    /// Cache rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, query: &Query) -> PathBuf {
        self.root
            .join(format!("{}.{}", urlencoding::encode(query.as_str()), EXTENSION))
    }

    fn featured_path(&self) -> PathBuf {
        self.root.join(FEATURED_DOCUMENT)
    }

    /// Cached records for `query`; `None` on a miss.
    ///
    /// Unreadable or corrupt entries count as misses.
    pub fn get(&self, query: &Query) -> Option<Vec<ResultRecord>> {
        read_document(&self.path_for(query))
    }

    /// Replace the entry for `query`.
    pub fn put(&self, query: &Query, records: &[ResultRecord]) -> Result<(), CacheError> {
        self.write_document(&self.path_for(query), query.as_str(), records)
    }

    pub fn get_featured(&self) -> Option<Vec<ResultRecord>> {
        read_document(&self.featured_path())
    }

    pub fn put_featured(&self, records: &[ResultRecord]) -> Result<(), CacheError> {
        self.write_document(&self.featured_path(), "", records)
    }

    fn write_document(
        &self,
        path: &Path,
        query: &str,
        records: &[ResultRecord],
    ) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.root).map_err(|e| CacheError::io(&self.root, e))?;

        let document = CacheDocument {
            query: query.to_string(),
            saved_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            records: records.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&document)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".entry-")
            .suffix(".part")
            .tempfile_in(&self.root)
            .map_err(|e| CacheError::io(&self.root, e))?;
        tmp.write_all(&json).map_err(|e| CacheError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| CacheError::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| CacheError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;

        debug!("Cached {} records at {}", records.len(), path.display());
        Ok(())
    }

    /// All cache documents, sorted by path. Empty when the root is missing.
    fn documents(&self) -> Result<Vec<PathBuf>, CacheError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.root, e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| CacheError::io(&self.root, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Every cached query, excluding the featured document.
    pub fn list_queries(&self) -> Result<BTreeSet<Query>, CacheError> {
        let mut queries = BTreeSet::new();
        for path in self.documents()? {
            if path.file_name().is_some_and(|name| name == FEATURED_DOCUMENT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match urlencoding::decode(stem).map(|raw| Query::new(raw.into_owned())) {
                Ok(Ok(query)) => {
                    queries.insert(query);
                }
                _ => warn!("Ignoring unrecognised cache file {}", path.display()),
            }
        }
        Ok(queries)
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut files = Vec::new();
        for path in self.documents()? {
            let size = std::fs::metadata(&path)
                .map_err(|e| CacheError::io(&path, e))?
                .len();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            files.push(CacheFileInfo { name, size });
        }

        Ok(CacheStats {
            cache_dir: self.root.clone(),
            file_count: files.len(),
            total_size_bytes: files.iter().map(|f| f.size).sum(),
            files,
            queries: self
                .list_queries()?
                .into_iter()
                .map(|q| q.as_str().to_string())
                .collect(),
        })
    }

    /// Delete every cache document, featured included. Returns the count.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let documents = self.documents()?;
        for path in &documents {
            std::fs::remove_file(path).map_err(|e| CacheError::io(path, e))?;
        }
        info!("Cache cleared: {} ({} files)", self.root.display(), documents.len());
        Ok(documents.len())
    }
}

fn read_document(path: &Path) -> Option<Vec<ResultRecord>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Cache miss: {}", path.display());
            return None;
        }
        Err(e) => {
            warn!("Could not read cache entry {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_slice::<CacheDocument>(&bytes) {
        Ok(document) => {
            debug!("Cache hit: {}", path.display());
            Some(document.records)
        }
        Err(e) => {
            warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
            None
        }
    }
}
