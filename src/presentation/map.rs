//! Geographic view of a dataset
//!
//! The view is centered on the dataset's mean position and carries one marker
//! per reading. It can be exported as a GeoJSON `FeatureCollection` for any
//! map tool that reads the format.

use crate::dataset::Dataset;
use crate::monitor::KpiSummary;
use crate::readings::Timestamp;
use serde::Serialize;
use serde_json::{json, Value};

/// Default zoom level for the initial view
pub const DEFAULT_ZOOM: u8 = 11;

/// Default camera pitch in degrees
pub const DEFAULT_PITCH: u8 = 50;

/// One point on the map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Timestamp,
    pub temperature_c: f64,
    pub heart_rate_bpm: f64,
    pub aqi: f64,
}

/// Camera position plus markers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub zoom: u8,
    pub pitch: u8,
    pub markers: Vec<MapMarker>,
}

impl MapView {
    /// Build a view centered on the mean position from `kpis`
    pub fn from_dataset(dataset: &Dataset, kpis: &KpiSummary) -> Self {
        let markers = dataset
            .iter()
            .map(|r| MapMarker {
                latitude: r.latitude,
                longitude: r.longitude,
                timestamp: r.timestamp,
                temperature_c: r.temperature_c,
                heart_rate_bpm: r.heart_rate_bpm,
                aqi: r.aqi,
            })
            .collect();

        Self {
            center_latitude: kpis.center_latitude,
            center_longitude: kpis.center_longitude,
            zoom: DEFAULT_ZOOM,
            pitch: DEFAULT_PITCH,
            markers,
        }
    }

    /// South-west and north-east corners of the markers, `None` without markers
    pub fn bounds(&self) -> Option<((f64, f64), (f64, f64))> {
        let first = self.markers.first()?;
        let init = (
            (first.latitude, first.longitude),
            (first.latitude, first.longitude),
        );

        Some(self.markers.iter().fold(init, |((s, w), (n, e)), m| {
            (
                (s.min(m.latitude), w.min(m.longitude)),
                (n.max(m.latitude), e.max(m.longitude)),
            )
        }))
    }

    /// Export markers as a GeoJSON `FeatureCollection`
    ///
    /// Coordinates follow GeoJSON order, `[longitude, latitude]`. The view
    /// state is attached as a foreign member so a viewer can restore it.
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .markers
            .iter()
            .map(|m| {
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Point",
                        "coordinates": [m.longitude, m.latitude],
                    },
                    "properties": {
                        "Timestamp": m.timestamp.to_rfc3339(),
                        "Temperature (°C)": m.temperature_c,
                        "Heart Rate (bpm)": m.heart_rate_bpm,
                        "AQI": m.aqi,
                    },
                })
            })
            .collect();

        json!({
            "type": "FeatureCollection",
            "features": features,
            "view": {
                "latitude": self.center_latitude,
                "longitude": self.center_longitude,
                "zoom": self.zoom,
                "pitch": self.pitch,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ConditionMonitor;
    use crate::readings::Reading;
    use chrono::{TimeZone, Utc};

    fn reading_at(latitude: f64, longitude: f64) -> Reading {
        Reading {
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
            temperature_c: 30.0,
            humidity_percent: 50.0,
            sound_db: 60.0,
            aqi: 80.0,
            heart_rate_bpm: 75.0,
            spo2_percent: 98.0,
            latitude,
            longitude,
        }
    }

    fn create_view() -> MapView {
        let dataset = Dataset::from_readings(vec![reading_at(10.0, 70.0), reading_at(12.0, 74.0)]);
        let kpis = ConditionMonitor::default().compute_kpis(&dataset).unwrap();
        MapView::from_dataset(&dataset, &kpis)
    }

    #[test]
    fn test_view_centered_on_mean_position() {
        let view = create_view();
        assert_eq!(view.center_latitude, 11.0);
        assert_eq!(view.center_longitude, 72.0);
        assert_eq!(view.zoom, 11);
        assert_eq!(view.pitch, 50);
        assert_eq!(view.markers.len(), 2);
    }

    #[test]
    fn test_bounds() {
        let view = create_view();
        assert_eq!(view.bounds(), Some(((10.0, 70.0), (12.0, 74.0))));

        let empty = MapView {
            markers: Vec::new(),
            ..view
        };
        assert_eq!(empty.bounds(), None);
    }

    #[test]
    fn test_geojson_uses_lon_lat_order() {
        let geojson = create_view().to_geojson();

        assert_eq!(geojson["type"], "FeatureCollection");
        assert_eq!(geojson["features"].as_array().unwrap().len(), 2);

        let first = &geojson["features"][0];
        assert_eq!(first["geometry"]["coordinates"][0], 70.0);
        assert_eq!(first["geometry"]["coordinates"][1], 10.0);
        assert_eq!(first["properties"]["Heart Rate (bpm)"], 75.0);
        assert_eq!(geojson["view"]["zoom"], 11);
    }
}
