//! Safety envelope for wearable readings

use crate::error::ConfigError;
use crate::monitor::rules::{
    AirQualityRule, HeartRateRule, NoiseRule, OxygenSaturationRule, TemperatureRule,
    ThresholdRule,
};
use serde::{Deserialize, Serialize};

/// Named limits the condition monitor compares readings against
///
/// Maximums are exclusive upper bounds and the SpO2 minimum is an exclusive
/// lower bound: a reading sitting exactly on a limit is considered safe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_max_temperature")]
    pub max_temperature_c: f64,
    #[serde(default = "default_max_aqi")]
    pub max_aqi: f64,
    #[serde(default = "default_max_sound")]
    pub max_sound_db: f64,
    #[serde(default = "default_max_heart_rate")]
    pub max_heart_rate_bpm: f64,
    #[serde(default = "default_min_spo2")]
    pub min_spo2_percent: f64,
}

const fn default_max_temperature() -> f64 {
    37.0
}

const fn default_max_aqi() -> f64 {
    150.0
}

const fn default_max_sound() -> f64 {
    85.0
}

const fn default_max_heart_rate() -> f64 {
    120.0
}

const fn default_min_spo2() -> f64 {
    94.0
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_temperature_c: default_max_temperature(),
            max_aqi: default_max_aqi(),
            max_sound_db: default_max_sound(),
            max_heart_rate_bpm: default_max_heart_rate(),
            min_spo2_percent: default_min_spo2(),
        }
    }
}

impl Thresholds {
    /// Reject limits that cannot be compared meaningfully
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("max_temperature_c", self.max_temperature_c),
            ("max_aqi", self.max_aqi),
            ("max_sound_db", self.max_sound_db),
            ("max_heart_rate_bpm", self.max_heart_rate_bpm),
            ("min_spo2_percent", self.min_spo2_percent),
        ];

        for (name, value) in limits {
            if !value.is_finite() {
                return Err(ConfigError::ValidationError(format!(
                    "thresholds.{} must be a finite number",
                    name
                )));
            }
        }

        for (name, value) in &limits[1..] {
            if *value < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "thresholds.{} must not be negative, got {}",
                    name, value
                )));
            }
        }

        if self.min_spo2_percent > 100.0 {
            return Err(ConfigError::ValidationError(format!(
                "thresholds.min_spo2_percent must be at most 100, got {}",
                self.min_spo2_percent
            )));
        }

        Ok(())
    }

    /// Build one rule per limit, in reporting order
    pub fn rules(&self) -> Vec<Box<dyn ThresholdRule>> {
        vec![
            Box::new(TemperatureRule::new(self.max_temperature_c)),
            Box::new(AirQualityRule::new(self.max_aqi)),
            Box::new(NoiseRule::new(self.max_sound_db)),
            Box::new(HeartRateRule::new(self.max_heart_rate_bpm)),
            Box::new(OxygenSaturationRule::new(self.min_spo2_percent)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_envelope() {
        let thresholds = Thresholds::default();
        assert_eq!(thresholds.max_temperature_c, 37.0);
        assert_eq!(thresholds.max_aqi, 150.0);
        assert_eq!(thresholds.max_sound_db, 85.0);
        assert_eq!(thresholds.max_heart_rate_bpm, 120.0);
        assert_eq!(thresholds.min_spo2_percent, 94.0);
        assert!(thresholds.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let thresholds: Thresholds = toml::from_str("max_aqi = 100.0").unwrap();
        assert_eq!(thresholds.max_aqi, 100.0);
        assert_eq!(thresholds.max_temperature_c, 37.0);
        assert_eq!(thresholds.min_spo2_percent, 94.0);
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let nan = Thresholds {
            max_temperature_c: f64::NAN,
            ..Thresholds::default()
        };
        assert!(nan.validate().is_err());

        let negative = Thresholds {
            max_sound_db: -1.0,
            ..Thresholds::default()
        };
        assert!(negative.validate().is_err());

        let impossible_spo2 = Thresholds {
            min_spo2_percent: 101.0,
            ..Thresholds::default()
        };
        assert!(impossible_spo2.validate().is_err());
    }

    #[test]
    fn test_rules_cover_every_limit() {
        let rules = Thresholds::default().rules();
        let names: Vec<&str> = rules.iter().map(|r| r.name()).collect();
        assert_eq!(
            names,
            vec![
                "TemperatureRule",
                "AirQualityRule",
                "NoiseRule",
                "HeartRateRule",
                "OxygenSaturationRule"
            ]
        );
    }
}
