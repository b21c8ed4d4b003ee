/// CSV loader with eager schema validation
pub mod loader;

/// Modification-time keyed dataset cache
pub mod cache;

pub use cache::DatasetCache;
pub use loader::{load, load_from_reader};

use crate::readings::Reading;
use std::path::{Path, PathBuf};

/// Ordered collection of readings for one monitoring session
///
/// Readings keep the order of the file they were loaded from. The loader
/// never produces an empty dataset; one built by hand may be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    source: PathBuf,
    readings: Vec<Reading>,
}

impl Dataset {
    /// Create a dataset from readings that did not come from a file
    pub fn from_readings(readings: Vec<Reading>) -> Self {
        Self {
            source: PathBuf::new(),
            readings,
        }
    }

    pub(crate) fn with_source(source: PathBuf, readings: Vec<Reading>) -> Self {
        Self { source, readings }
    }

    /// File the readings were loaded from (empty for in-memory datasets)
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reading> {
        self.readings.iter()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Reading;
    type IntoIter = std::slice::Iter<'a, Reading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.iter()
    }
}
