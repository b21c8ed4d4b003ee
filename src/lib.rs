/// Error types for loading, configuration and narrative requests
pub mod error;

/// Sensor reading record and condition vocabulary
pub mod readings;

/// CSV dataset loading and caching
pub mod dataset;

/// KPI computation and threshold alerting
pub mod monitor;

/// Narrative summaries and Q&A through a language model
pub mod narrative;

/// Dashboard rendering and map view
pub mod presentation;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use dataset::{Dataset, DatasetCache};
pub use error::{ConfigError, DatasetError, NarrativeError};
pub use monitor::{Alert, AlertSet, ConditionMonitor, KpiSummary, Thresholds};
pub use readings::{Condition, Reading, Severity};
