/// Configuration management
pub mod conf;

pub use conf::{
    BackendKind, Config, DatasetConfig, DisplayConfig, NarrativeBackendConfig, NarrativeConfig,
};
