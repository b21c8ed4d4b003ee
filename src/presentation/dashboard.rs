//! Plain-text dashboard report
//!
//! Renders the KPI block, a downsampled trend table, the alert table (or an
//! all-clear line) and a summary of the map view. Display rounding happens
//! here and nowhere else.

use crate::dataset::Dataset;
use crate::monitor::{AlertSet, KpiSummary};
use crate::presentation::map::MapView;
use crate::readings::Reading;
use std::fmt;

/// Line printed when no reading violates a threshold
pub const ALL_CLEAR: &str = "All monitored values are within safe limits.";

/// Line printed above a non-empty alert table
pub const UNSAFE_WARNING: &str = "Warning: Unsafe conditions detected!";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Everything the dashboard shows for one dataset
pub struct Dashboard<'a> {
    pub dataset: &'a Dataset,
    pub kpis: &'a KpiSummary,
    pub alerts: &'a AlertSet,
    pub max_trend_rows: usize,
}

impl<'a> Dashboard<'a> {
    pub fn new(
        dataset: &'a Dataset,
        kpis: &'a KpiSummary,
        alerts: &'a AlertSet,
        max_trend_rows: usize,
    ) -> Self {
        Self {
            dataset,
            kpis,
            alerts,
            max_trend_rows,
        }
    }

    fn write_kpis(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Real-Time KPIs")?;
        for (label, value) in kpi_lines(self.kpis) {
            writeln!(f, "  {:<14}{}", label, value)?;
        }
        Ok(())
    }

    fn write_trends(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sensor Trends Over Time")?;
        writeln!(
            f,
            "  {:<19}  {:>9}  {:>12}  {:>10}  {:>5}",
            "Timestamp", "Temp (°C)", "Humidity (%)", "Sound (dB)", "AQI"
        )?;

        let indices = sample_indices(self.dataset.len(), self.max_trend_rows);
        for index in &indices {
            let r = &self.dataset.readings()[*index];
            writeln!(
                f,
                "  {:<19}  {:>9.1}  {:>12.1}  {:>10.1}  {:>5.0}",
                r.timestamp.format(TIMESTAMP_FORMAT),
                r.temperature_c,
                r.humidity_percent,
                r.sound_db,
                r.aqi
            )?;
        }

        if indices.len() < self.dataset.len() {
            writeln!(
                f,
                "  ({} of {} readings shown)",
                indices.len(),
                self.dataset.len()
            )?;
        }
        Ok(())
    }

    fn write_alerts(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Alerts")?;
        if self.alerts.is_empty() {
            return writeln!(f, "  {}", ALL_CLEAR);
        }

        writeln!(f, "  {}", UNSAFE_WARNING)?;
        writeln!(
            f,
            "  {:>5}  {:<19}  {:>6}  {:>6}  {:>6}  {:>4}  {:>4}  {:>5}  Conditions",
            "Row", "Timestamp", "Temp", "Hum", "Sound", "AQI", "HR", "SpO2"
        )?;

        for alert in self.alerts.iter() {
            let conditions = alert
                .conditions
                .iter()
                .map(|c| c.label())
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(
                f,
                "  {:>5}  {}  {}",
                alert.index,
                format_reading_columns(&alert.reading),
                conditions
            )?;
        }

        writeln!(
            f,
            "  {} of {} readings flagged",
            self.alerts.len(),
            self.dataset.len()
        )
    }

    fn write_map(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = MapView::from_dataset(self.dataset, self.kpis);
        writeln!(f, "Location Map")?;
        writeln!(
            f,
            "  Center: {:.5}, {:.5} (zoom {}, pitch {})",
            view.center_latitude, view.center_longitude, view.zoom, view.pitch
        )?;
        if let Some(((south, west), (north, east))) = view.bounds() {
            writeln!(
                f,
                "  Bounds: {:.5}, {:.5} to {:.5}, {:.5}",
                south, west, north, east
            )?;
        }
        writeln!(f, "  Markers: {}", view.markers.len())
    }
}

impl fmt::Display for Dashboard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = "IoT Wearable Dashboard - Health & Environment Monitor";
        writeln!(f, "{}", title)?;
        writeln!(f, "{}", "=".repeat(title.len()))?;
        if !self.dataset.source().as_os_str().is_empty() {
            writeln!(
                f,
                "Source: {} ({} readings)",
                self.dataset.source().display(),
                self.dataset.len()
            )?;
        }
        writeln!(f)?;

        self.write_kpis(f)?;
        writeln!(f)?;
        self.write_trends(f)?;
        writeln!(f)?;
        self.write_alerts(f)?;
        writeln!(f)?;
        self.write_map(f)
    }
}

/// Render the full dashboard to a string
pub fn render_dashboard(
    dataset: &Dataset,
    kpis: &KpiSummary,
    alerts: &AlertSet,
    max_trend_rows: usize,
) -> String {
    Dashboard::new(dataset, kpis, alerts, max_trend_rows).to_string()
}

/// The four headline metrics with their display rounding applied
pub fn kpi_lines(kpis: &KpiSummary) -> [(&'static str, String); 4] {
    [
        ("Avg Temp", format!("{:.1} °C", kpis.avg_temperature_c)),
        ("Avg Humidity", format!("{:.1} %", kpis.avg_humidity_percent)),
        ("Avg AQI", format!("{:.0}", kpis.avg_aqi)),
        ("Avg HR", format!("{:.0} bpm", kpis.avg_heart_rate_bpm)),
    ]
}

fn format_reading_columns(r: &Reading) -> String {
    format!(
        "{:<19}  {:>6.1}  {:>6.1}  {:>6.1}  {:>4.0}  {:>4.0}  {:>5.1}",
        r.timestamp.format(TIMESTAMP_FORMAT),
        r.temperature_c,
        r.humidity_percent,
        r.sound_db,
        r.aqi,
        r.heart_rate_bpm,
        r.spo2_percent
    )
}

/// Evenly spaced indices into `len` items, at most `max` of them
///
/// The first and last items are always included when `max >= 2`.
pub fn sample_indices(len: usize, max: usize) -> Vec<usize> {
    if len <= max {
        return (0..len).collect();
    }
    match max {
        0 => Vec::new(),
        1 => vec![0],
        _ => (0..max).map(|i| i * (len - 1) / (max - 1)).collect(),
    }
}
