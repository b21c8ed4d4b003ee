//! Dataset cache keyed by file path and modification time
//!
//! A loaded dataset is reused until the file on disk changes or the caller
//! explicitly invalidates it. There is no background file watching; staleness
//! is checked on each lookup.

use crate::dataset::{loader, Dataset};
use crate::error::DatasetError;
use log::{debug, info};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

struct CacheEntry {
    /// Modification time observed when the dataset was loaded
    modified: Option<SystemTime>,
    dataset: Arc<Dataset>,
}

/// Memoizes loaded datasets for the lifetime of the cache
#[derive(Default)]
pub struct DatasetCache {
    entries: HashMap<PathBuf, CacheEntry>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached dataset for `path`, loading it on a miss
    ///
    /// A cached entry is discarded and reloaded when the file's modification
    /// time differs from the one recorded at load time.
    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<Dataset>, DatasetError> {
        let modified = modified_time(path)?;

        if let Some(entry) = self.entries.get(path) {
            if entry.modified == modified {
                debug!("Dataset cache hit for {}", path.display());
                return Ok(Arc::clone(&entry.dataset));
            }
            info!(
                "Dataset {} changed on disk, reloading",
                path.display()
            );
        } else {
            debug!("Dataset cache miss for {}", path.display());
        }

        self.load_entry(path, modified)
    }

    /// Force a fresh read of `path`, replacing any cached entry
    pub fn reload(&mut self, path: &Path) -> Result<Arc<Dataset>, DatasetError> {
        let modified = modified_time(path)?;
        self.load_entry(path, modified)
    }

    /// Drop the cached entry for `path`
    ///
    /// Returns `true` if an entry was present.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        let removed = self.entries.remove(path).is_some();
        if removed {
            debug!("Invalidated cached dataset {}", path.display());
        }
        removed
    }

    /// Drop every cached entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether the file behind a cached entry has changed since it was loaded
    ///
    /// Paths that are not cached are reported as stale.
    pub fn is_stale(&self, path: &Path) -> Result<bool, DatasetError> {
        match self.entries.get(path) {
            Some(entry) => Ok(entry.modified != modified_time(path)?),
            None => Ok(true),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn load_entry(
        &mut self,
        path: &Path,
        modified: Option<SystemTime>,
    ) -> Result<Arc<Dataset>, DatasetError> {
        let dataset = Arc::new(loader::load(path)?);
        self.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                modified,
                dataset: Arc::clone(&dataset),
            },
        );
        Ok(dataset)
    }
}

/// Modification time of `path`, or `None` where the platform does not report one
fn modified_time(path: &Path) -> Result<Option<SystemTime>, DatasetError> {
    let metadata = std::fs::metadata(path)?;
    Ok(metadata.modified().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::time::Duration;

    const HEADER: &str = "Timestamp,Temperature (°C),Humidity (%),Sound (dB),AQI,Heart Rate (bpm),SpO2 (%),Latitude,Longitude";

    fn write_dataset(path: &Path, rows: &[&str]) {
        let mut file = File::create(path).unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
    }

    fn bump_mtime(path: &Path, offset_secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(offset_secs))
            .unwrap();
    }

    #[test]
    fn test_cache_reuses_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.csv");
        write_dataset(&path, &["2025-03-01 08:00:00,30,50,60,80,90,98,12.9,77.5"]);

        let mut cache = DatasetCache::new();
        let first = cache.get_or_load(&path).unwrap();
        let second = cache.get_or_load(&path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_stale(&path).unwrap());
    }

    #[test]
    fn test_cache_reloads_when_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.csv");
        write_dataset(&path, &["2025-03-01 08:00:00,30,50,60,80,90,98,12.9,77.5"]);

        let mut cache = DatasetCache::new();
        let first = cache.get_or_load(&path).unwrap();
        assert_eq!(first.len(), 1);

        write_dataset(
            &path,
            &[
                "2025-03-01 08:00:00,30,50,60,80,90,98,12.9,77.5",
                "2025-03-01 08:01:00,31,50,60,80,90,98,12.9,77.5",
            ],
        );
        bump_mtime(&path, 60);
        assert!(cache.is_stale(&path).unwrap());

        let second = cache.get_or_load(&path).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn test_invalidate_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.csv");
        write_dataset(&path, &["2025-03-01 08:00:00,30,50,60,80,90,98,12.9,77.5"]);

        let mut cache = DatasetCache::new();
        let first = cache.get_or_load(&path).unwrap();

        assert!(cache.invalidate(&path));
        assert!(!cache.invalidate(&path));
        assert!(cache.is_empty());
        assert!(cache.is_stale(&path).unwrap());

        let second = cache.get_or_load(&path).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        let third = cache.reload(&path).unwrap();
        assert!(!Arc::ptr_eq(&second, &third));
        assert_eq!(*second, *third);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.csv");
        std::fs::write(&path, "Timestamp,AQI\n2025-03-01 08:00:00,80\n").unwrap();

        let mut cache = DatasetCache::new();
        assert!(matches!(
            cache.get_or_load(&path),
            Err(DatasetError::SchemaMismatch { .. })
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_file_is_error() {
        let mut cache = DatasetCache::new();
        let result = cache.get_or_load(Path::new("/nonexistent/readings.csv"));
        assert!(matches!(result, Err(DatasetError::Io(_))));
    }
}
