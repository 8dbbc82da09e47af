use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use log::debug;

use super::loader::load_file;
use super::model::SalesTable;
use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Source identity
// ---------------------------------------------------------------------------

/// Identity of a source file's contents: length plus modification time.
/// A changed stamp invalidates the cached table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SourceStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl SourceStamp {
    fn probe(path: &Path) -> Result<SourceStamp, EngineError> {
        let meta = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::SourceNotFound(path.to_path_buf())
            } else {
                EngineError::unreadable(path, e)
            }
        })?;
        Ok(SourceStamp {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// DatasetCache
// ---------------------------------------------------------------------------

/// Explicit, caller-owned memoization of [`load_file`].
///
/// The initial load is the only slow operation in the engine, so repeated
/// filter/aggregate cycles should not re-parse the source. Tables come back
/// as `Arc<SalesTable>` and are immutable, so multiple sessions may share
/// one cached table read-only while each keeps its own filter criteria.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: HashMap<PathBuf, (SourceStamp, Arc<SalesTable>)>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached table for `path`, reloading when the file's
    /// length or modification time has changed since the last load.
    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<SalesTable>, EngineError> {
        let stamp = SourceStamp::probe(path)?;

        if let Some((cached_stamp, table)) = self.entries.get(path) {
            if *cached_stamp == stamp {
                debug!("cache hit for {}", path.display());
                return Ok(Arc::clone(table));
            }
            debug!("source changed, reloading {}", path.display());
        }

        let table = Arc::new(load_file(path)?);
        self.entries
            .insert(path.to_path_buf(), (stamp, Arc::clone(&table)));
        Ok(table)
    }

    /// Drop the cached entry for `path`, forcing the next access to reload.
    pub fn invalidate(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    /// Drop every cached table.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const HEADER: &str = "Posting Date,Sell to State,Final Line Amount (A-B+C)\n";

    #[test]
    fn repeated_loads_share_one_table() {
        let mut tmp = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(tmp, "{HEADER}05-01-2024,North,500\n").unwrap();
        tmp.flush().unwrap();

        let mut cache = DatasetCache::new();
        let a = cache.get_or_load(tmp.path()).unwrap();
        let b = cache.get_or_load(tmp.path()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn changed_source_is_reloaded() {
        let mut tmp = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(tmp, "{HEADER}05-01-2024,North,500\n").unwrap();
        tmp.flush().unwrap();

        let mut cache = DatasetCache::new();
        let before = cache.get_or_load(tmp.path()).unwrap();
        assert_eq!(before.len(), 1);

        // Appending a row changes the stamp (length at minimum).
        write!(tmp, "06-01-2024,South,800\n").unwrap();
        tmp.flush().unwrap();

        let after = cache.get_or_load(tmp.path()).unwrap();
        assert_eq!(after.len(), 2);
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn invalidate_forces_reload() {
        let mut tmp = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(tmp, "{HEADER}05-01-2024,North,500\n").unwrap();
        tmp.flush().unwrap();

        let mut cache = DatasetCache::new();
        let a = cache.get_or_load(tmp.path()).unwrap();
        cache.invalidate(tmp.path());
        let b = cache.get_or_load(tmp.path()).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
    }

    #[test]
    fn missing_file_surfaces_not_found() {
        let mut cache = DatasetCache::new();
        let err = cache.get_or_load(Path::new("/no/such/sales.csv")).unwrap_err();
        assert!(matches!(err, EngineError::SourceNotFound(_)));
    }
}
