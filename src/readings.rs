//! Core reading types and enums for the wearable monitor
//!
//! This module defines the fundamental data structures used throughout the application
//! for representing sensor readings, the conditions that flag them, and severity levels.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Column headers every input file must carry, in display order
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "Timestamp",
    "Temperature (°C)",
    "Humidity (%)",
    "Sound (dB)",
    "AQI",
    "Heart Rate (bpm)",
    "SpO2 (%)",
    "Latitude",
    "Longitude",
];

/// One timestamped capture from a wearable device
///
/// Field names on the wire match the column headers of the input file, so a
/// reading serializes back to the same keys it was loaded from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    /// When the reading was captured
    #[serde(rename = "Timestamp", deserialize_with = "deserialize_timestamp")]
    pub timestamp: Timestamp,
    /// Ambient temperature in °C
    #[serde(rename = "Temperature (°C)")]
    pub temperature_c: f64,
    /// Relative humidity in percent
    #[serde(rename = "Humidity (%)")]
    pub humidity_percent: f64,
    /// Sound level in dB
    #[serde(rename = "Sound (dB)")]
    pub sound_db: f64,
    /// Air quality index
    #[serde(rename = "AQI")]
    pub aqi: f64,
    /// Wearer heart rate in beats per minute
    #[serde(rename = "Heart Rate (bpm)")]
    pub heart_rate_bpm: f64,
    /// Blood-oxygen saturation in percent
    #[serde(rename = "SpO2 (%)")]
    pub spo2_percent: f64,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
}

impl Reading {
    /// Check that every numeric field holds a finite value
    ///
    /// Returns the header of the first offending column.
    pub fn non_finite_field(&self) -> Option<&'static str> {
        let fields = [
            (self.temperature_c, REQUIRED_COLUMNS[1]),
            (self.humidity_percent, REQUIRED_COLUMNS[2]),
            (self.sound_db, REQUIRED_COLUMNS[3]),
            (self.aqi, REQUIRED_COLUMNS[4]),
            (self.heart_rate_bpm, REQUIRED_COLUMNS[5]),
            (self.spo2_percent, REQUIRED_COLUMNS[6]),
            (self.latitude, REQUIRED_COLUMNS[7]),
            (self.longitude, REQUIRED_COLUMNS[8]),
        ];

        fields
            .iter()
            .find(|(value, _)| !value.is_finite())
            .map(|(_, column)| *column)
    }
}

/// Parse a timestamp cell
///
/// Accepts RFC 3339 as well as the naive `YYYY-MM-DD HH:MM[:SS[.fff]]` forms
/// spreadsheet exports produce, with a space or `T` separator, taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp '{}'", raw)))
}

/// An unsafe condition a single reading can exhibit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Temperature above the safe maximum
    HighTemperature,
    /// Air quality index above the safe maximum
    PoorAirQuality,
    /// Sound level above the safe maximum
    ExcessiveNoise,
    /// Heart rate above the safe maximum
    ElevatedHeartRate,
    /// Blood-oxygen saturation below the safe minimum
    LowOxygen,
}

impl Condition {
    /// Severity assigned to this condition
    ///
    /// Physiological conditions are critical, environmental ones are warnings.
    pub fn severity(&self) -> Severity {
        match self {
            Condition::HighTemperature | Condition::PoorAirQuality | Condition::ExcessiveNoise => {
                Severity::Warning
            }
            Condition::ElevatedHeartRate | Condition::LowOxygen => Severity::Critical,
        }
    }

    /// Short human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Condition::HighTemperature => "high temperature",
            Condition::PoorAirQuality => "poor air quality",
            Condition::ExcessiveNoise => "excessive noise",
            Condition::ElevatedHeartRate => "elevated heart rate",
            Condition::LowOxygen => "low SpO2",
        }
    }
}

/// Severity level for alerts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Warning that may require attention
    Warning,
    /// Critical issue requiring immediate attention
    Critical,
}
