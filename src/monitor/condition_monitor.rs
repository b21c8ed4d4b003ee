use crate::dataset::Dataset;
use crate::error::DatasetError;
use crate::monitor::rules::ThresholdRule;
use crate::monitor::thresholds::Thresholds;
use crate::readings::{Condition, Reading, Severity};
use log::debug;
use serde::{Deserialize, Serialize};

/// Evaluates KPIs and safety thresholds over a dataset
///
/// The monitor holds no state beyond its rules: both operations are pure
/// functions of the dataset passed in.
pub struct ConditionMonitor {
    rules: Vec<Box<dyn ThresholdRule>>,
}

/// Aggregate statistics for a dataset
///
/// Values are raw means; display rounding is left to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub reading_count: usize,
    pub avg_temperature_c: f64,
    pub avg_humidity_percent: f64,
    pub avg_aqi: f64,
    pub avg_heart_rate_bpm: f64,
    pub avg_sound_db: f64,
    pub avg_spo2_percent: f64,
    /// Mean latitude, used as the map center
    pub center_latitude: f64,
    /// Mean longitude, used as the map center
    pub center_longitude: f64,
}

/// A reading that violated at least one threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Zero-based position of the reading in its dataset
    pub index: usize,
    pub reading: Reading,
    /// Every condition that fired, in rule order
    pub conditions: Vec<Condition>,
}

impl Alert {
    /// Highest severity among the triggered conditions
    pub fn severity(&self) -> Severity {
        self.conditions
            .iter()
            .map(|c| c.severity())
            .fold(Severity::Warning, Ord::max)
    }
}

/// Readings that violated at least one threshold, in dataset order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSet {
    pub alerts: Vec<Alert>,
}

impl AlertSet {
    /// `true` is the all-clear state
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Alert> {
        self.alerts.iter()
    }

    /// Number of alerts that include `condition`
    pub fn count_condition(&self, condition: Condition) -> usize {
        self.alerts
            .iter()
            .filter(|a| a.conditions.contains(&condition))
            .count()
    }

    /// Highest severity across all alerts, `None` when all clear
    pub fn max_severity(&self) -> Option<Severity> {
        self.alerts.iter().map(|a| a.severity()).max()
    }
}

impl Default for ConditionMonitor {
    fn default() -> Self {
        Self::new(&Thresholds::default())
    }
}

impl ConditionMonitor {
    /// Create a monitor with one rule per threshold
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            rules: thresholds.rules(),
        }
    }

    /// Create a monitor with no rules
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a threshold rule to the monitor
    pub fn add_rule(&mut self, rule: Box<dyn ThresholdRule>) {
        self.rules.push(rule);
    }

    /// Get the number of configured rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Compute the mean of each tracked metric
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::EmptyDataset` if the dataset has no readings.
    pub fn compute_kpis(&self, dataset: &Dataset) -> Result<KpiSummary, DatasetError> {
        let readings = dataset.readings();
        if readings.is_empty() {
            return Err(DatasetError::EmptyDataset);
        }

        let count = readings.len() as f64;
        let mean = |field: fn(&Reading) -> f64| readings.iter().map(field).sum::<f64>() / count;

        let summary = KpiSummary {
            reading_count: readings.len(),
            avg_temperature_c: mean(|r| r.temperature_c),
            avg_humidity_percent: mean(|r| r.humidity_percent),
            avg_aqi: mean(|r| r.aqi),
            avg_heart_rate_bpm: mean(|r| r.heart_rate_bpm),
            avg_sound_db: mean(|r| r.sound_db),
            avg_spo2_percent: mean(|r| r.spo2_percent),
            center_latitude: mean(|r| r.latitude),
            center_longitude: mean(|r| r.longitude),
        };

        debug!("Computed KPIs over {} readings: {:?}", readings.len(), summary);
        Ok(summary)
    }

    /// Collect every reading for which at least one rule fires
    ///
    /// Order follows the dataset and each reading appears at most once. An
    /// empty dataset or a dataset with no violations yields an empty set.
    pub fn detect_alerts(&self, dataset: &Dataset) -> AlertSet {
        let alerts: Vec<Alert> = dataset
            .iter()
            .enumerate()
            .filter_map(|(index, reading)| {
                let conditions = self.conditions_for(reading);
                if conditions.is_empty() {
                    None
                } else {
                    Some(Alert {
                        index,
                        reading: reading.clone(),
                        conditions,
                    })
                }
            })
            .collect();

        debug!(
            "Detected {} alerts across {} readings",
            alerts.len(),
            dataset.len()
        );
        AlertSet { alerts }
    }

    /// Conditions a single reading triggers, in rule order
    pub fn conditions_for(&self, reading: &Reading) -> Vec<Condition> {
        self.rules
            .iter()
            .filter(|rule| rule.evaluate(reading))
            .map(|rule| rule.condition())
            .collect()
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    /// Readings whose values straddle every default threshold
    #[derive(Debug, Clone)]
    struct ReadingData {
        readings: Vec<Reading>,
    }

    fn pick(g: &mut Gen, low: f64, span: u16, step: f64) -> f64 {
        low + (u16::arbitrary(g) % span) as f64 * step
    }

    impl Arbitrary for ReadingData {
        fn arbitrary(g: &mut Gen) -> Self {
            let count = 1 + (u8::arbitrary(g) % 30) as usize;
            let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();

            let readings = (0..count)
                .map(|i| Reading {
                    timestamp: start + Duration::minutes(i as i64),
                    temperature_c: pick(g, 30.0, 100, 0.1),
                    humidity_percent: pick(g, 20.0, 600, 0.1),
                    sound_db: pick(g, 70.0, 30, 1.0),
                    aqi: pick(g, 120.0, 60, 1.0),
                    heart_rate_bpm: pick(g, 100.0, 40, 1.0),
                    spo2_percent: pick(g, 90.0, 10, 1.0),
                    latitude: pick(g, -10.0, 2000, 0.01),
                    longitude: pick(g, 70.0, 2000, 0.01),
                })
                .collect();

            Self { readings }
        }
    }

    fn violates_default_envelope(r: &Reading) -> bool {
        r.temperature_c > 37.0
            || r.aqi > 150.0
            || r.sound_db > 85.0
            || r.heart_rate_bpm > 120.0
            || r.spo2_percent < 94.0
    }

    #[quickcheck]
    fn prop_alert_membership_matches_predicates(data: ReadingData) -> bool {
        let dataset = Dataset::from_readings(data.readings.clone());
        let alerts = ConditionMonitor::default().detect_alerts(&dataset);

        let expected: Vec<usize> = data
            .readings
            .iter()
            .enumerate()
            .filter(|(_, r)| violates_default_envelope(r))
            .map(|(i, _)| i)
            .collect();
        let actual: Vec<usize> = alerts.iter().map(|a| a.index).collect();

        expected == actual
    }

    #[quickcheck]
    fn prop_alerts_preserve_order_without_duplicates(data: ReadingData) -> bool {
        let dataset = Dataset::from_readings(data.readings);
        let alerts = ConditionMonitor::default().detect_alerts(&dataset);

        let strictly_increasing = alerts.alerts.windows(2).all(|w| w[0].index < w[1].index);
        let readings_match = alerts
            .iter()
            .all(|a| dataset.readings()[a.index] == a.reading && !a.conditions.is_empty());

        strictly_increasing && readings_match
    }

    #[quickcheck]
    fn prop_detect_alerts_is_idempotent(data: ReadingData) -> bool {
        let dataset = Dataset::from_readings(data.readings);
        let monitor = ConditionMonitor::default();
        monitor.detect_alerts(&dataset) == monitor.detect_alerts(&dataset)
    }

    #[quickcheck]
    fn prop_kpis_match_direct_mean(data: ReadingData) -> bool {
        let dataset = Dataset::from_readings(data.readings.clone());
        let kpis = match ConditionMonitor::default().compute_kpis(&dataset) {
            Ok(kpis) => kpis,
            Err(_) => return false,
        };

        let n = data.readings.len() as f64;
        let direct = |f: fn(&Reading) -> f64| {
            let mut total = 0.0;
            for r in &data.readings {
                total += f(r);
            }
            total / n
        };
        let close = |a: f64, b: f64| (a - b).abs() <= 1e-9 * b.abs().max(1.0);

        close(kpis.avg_temperature_c, direct(|r| r.temperature_c))
            && close(kpis.avg_humidity_percent, direct(|r| r.humidity_percent))
            && close(kpis.avg_aqi, direct(|r| r.aqi))
            && close(kpis.avg_heart_rate_bpm, direct(|r| r.heart_rate_bpm))
    }
}
