/// Terminal dashboard report
pub mod dashboard;

/// Map view and GeoJSON export
pub mod map;

pub use dashboard::{render_dashboard, Dashboard, ALL_CLEAR, UNSAFE_WARNING};
pub use map::{MapMarker, MapView};
