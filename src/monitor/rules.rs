//! Built-in threshold rules for wearable readings
//!
//! Each rule checks one field of a reading against one limit and reports the
//! condition it detects. The condition monitor ORs every rule together.

use crate::readings::{Condition, Reading, Severity};

/// A single-metric safety predicate
pub trait ThresholdRule: Send + Sync {
    /// Whether the reading violates this rule's limit
    fn evaluate(&self, reading: &Reading) -> bool;

    /// Get a human-readable name for this rule
    fn name(&self) -> &str;

    /// Condition reported when this rule fires
    fn condition(&self) -> Condition;

    /// Get the severity level if this rule fires
    fn severity(&self) -> Severity {
        self.condition().severity()
    }
}

/// Fires when temperature exceeds a maximum
pub struct TemperatureRule {
    /// Highest safe temperature in °C
    pub max_c: f64,
}

impl TemperatureRule {
    pub fn new(max_c: f64) -> Self {
        Self { max_c }
    }

    /// Create a default temperature rule (above 37 °C)
    pub fn with_defaults() -> Self {
        Self::new(37.0)
    }
}

impl ThresholdRule for TemperatureRule {
    fn evaluate(&self, reading: &Reading) -> bool {
        reading.temperature_c > self.max_c
    }

    fn name(&self) -> &str {
        "TemperatureRule"
    }

    fn condition(&self) -> Condition {
        Condition::HighTemperature
    }
}

/// Fires when the air quality index exceeds a maximum
pub struct AirQualityRule {
    /// Highest safe AQI
    pub max_aqi: f64,
}

impl AirQualityRule {
    pub fn new(max_aqi: f64) -> Self {
        Self { max_aqi }
    }

    /// Create a default air quality rule (AQI above 150)
    pub fn with_defaults() -> Self {
        Self::new(150.0)
    }
}

impl ThresholdRule for AirQualityRule {
    fn evaluate(&self, reading: &Reading) -> bool {
        reading.aqi > self.max_aqi
    }

    fn name(&self) -> &str {
        "AirQualityRule"
    }

    fn condition(&self) -> Condition {
        Condition::PoorAirQuality
    }
}

/// Fires when the sound level exceeds a maximum
pub struct NoiseRule {
    /// Highest safe sound level in dB
    pub max_db: f64,
}

impl NoiseRule {
    pub fn new(max_db: f64) -> Self {
        Self { max_db }
    }

    /// Create a default noise rule (above 85 dB)
    pub fn with_defaults() -> Self {
        Self::new(85.0)
    }
}

impl ThresholdRule for NoiseRule {
    fn evaluate(&self, reading: &Reading) -> bool {
        reading.sound_db > self.max_db
    }

    fn name(&self) -> &str {
        "NoiseRule"
    }

    fn condition(&self) -> Condition {
        Condition::ExcessiveNoise
    }
}

/// Fires when heart rate exceeds a maximum
pub struct HeartRateRule {
    /// Highest safe heart rate in bpm
    pub max_bpm: f64,
}

impl HeartRateRule {
    pub fn new(max_bpm: f64) -> Self {
        Self { max_bpm }
    }

    /// Create a default heart rate rule (above 120 bpm)
    pub fn with_defaults() -> Self {
        Self::new(120.0)
    }
}

impl ThresholdRule for HeartRateRule {
    fn evaluate(&self, reading: &Reading) -> bool {
        reading.heart_rate_bpm > self.max_bpm
    }

    fn name(&self) -> &str {
        "HeartRateRule"
    }

    fn condition(&self) -> Condition {
        Condition::ElevatedHeartRate
    }
}

/// Fires when blood-oxygen saturation drops below a minimum
pub struct OxygenSaturationRule {
    /// Lowest safe SpO2 in percent
    pub min_percent: f64,
}

impl OxygenSaturationRule {
    pub fn new(min_percent: f64) -> Self {
        Self { min_percent }
    }

    /// Create a default SpO2 rule (below 94 %)
    pub fn with_defaults() -> Self {
        Self::new(94.0)
    }
}

impl ThresholdRule for OxygenSaturationRule {
    fn evaluate(&self, reading: &Reading) -> bool {
        reading.spo2_percent < self.min_percent
    }

    fn name(&self) -> &str {
        "OxygenSaturationRule"
    }

    fn condition(&self) -> Condition {
        Condition::LowOxygen
    }
}
