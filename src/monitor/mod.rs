/// Condition monitor: KPI aggregation and multi-metric alerting
pub mod condition_monitor;
pub mod rules;
pub mod thresholds;

pub use condition_monitor::{Alert, AlertSet, ConditionMonitor, KpiSummary};
pub use rules::ThresholdRule;
pub use thresholds::Thresholds;
