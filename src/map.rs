//! # Direction map
//!
//! Self-contained HTML document (Leaflet from a CDN, OSM tiles) with the QTH
//! marker and one red line per alert bearing. Line end points are computed
//! here with [`crate::geo::destination`], so the page carries no math.

use crate::geo::destination;
use crate::notify::{Notification, SEVERITY_ERROR, SEVERITY_WARNING};

pub const MAP_TITLE: &str = "ES Alert";
const LEAFLET_VERSION: &str = "1.9.4";

/// Why no map could be produced; each maps to one user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapUnavailable {
    NoRecentAlert,
    QthMissing,
    NoDirections,
}

impl MapUnavailable {
    pub fn notification(self) -> Notification {
        match self {
            MapUnavailable::NoRecentAlert => Notification::new(
                SEVERITY_WARNING,
                MAP_TITLE,
                "No map information is currently available for the configured OMID.",
            ),
            MapUnavailable::QthMissing => {
                Notification::new(SEVERITY_ERROR, MAP_TITLE, "QTH coordinates missing.")
            }
            MapUnavailable::NoDirections => Notification::new(
                SEVERITY_WARNING,
                MAP_TITLE,
                "No direction data available yet.",
            ),
        }
    }
}

/// One direction line: bearing plus its computed end point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionLine {
    pub bearing: f64,
    pub end: (f64, f64),
}

pub fn direction_lines(qth: (f64, f64), bearings: &[f64], line_km: f64) -> Vec<DirectionLine> {
    bearings
        .iter()
        .map(|&b| DirectionLine {
            bearing: b,
            end: destination(qth.0, qth.1, b, line_km),
        })
        .collect()
}

/// Check the preconditions in order: recent alert, QTH, directions.
pub fn check_available(
    has_recent_alert: bool,
    qth: Option<(f64, f64)>,
    bearings: &[f64],
) -> Result<(f64, f64), MapUnavailable> {
    if !has_recent_alert {
        return Err(MapUnavailable::NoRecentAlert);
    }
    let qth = qth.ok_or(MapUnavailable::QthMissing)?;
    if bearings.is_empty() {
        return Err(MapUnavailable::NoDirections);
    }
    Ok(qth)
}

/// Render the full page.
pub fn render_map_html(qth: (f64, f64), bearings: &[f64], line_km: f64) -> String {
    let lines = direction_lines(qth, bearings, line_km);
    let title = crate::alert::join_directions(bearings);

    let mut polylines = String::new();
    let mut points = format!("[{}, {}]", qth.0, qth.1);
    for l in &lines {
        polylines.push_str(&format!(
            "  L.polyline([p0, [{lat}, {lon}]], {{color: 'red', weight: 2}}).addTo(map).bindTooltip('Azimuth {b}°');\n",
            lat = l.end.0,
            lon = l.end.1,
            b = l.bearing
        ));
        points.push_str(&format!(", [{}, {}]", l.end.0, l.end.1));
    }

    format!(
        r#"<!DOCTYPE html><html><head>
<meta charset="utf-8">
<title>ES Alert Directions: {title}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@{v}/dist/leaflet.css"/>
<style>html,body,#map{{height:100%;margin:0}}</style>
</head><body><div id="map"></div>
<script src="https://unpkg.com/leaflet@{v}/dist/leaflet.js"></script>
<script>
  var map = L.map('map');
  L.tileLayer('https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
    maxZoom: 18, attribution: '© OpenStreetMap'
  }}).addTo(map);
  var p0 = L.latLng({lat}, {lon});
  L.marker(p0).addTo(map).bindPopup('QTH');
{polylines}  window.addEventListener('load', function () {{
    map.invalidateSize();
    map.fitBounds(L.latLngBounds([{points}]), {{padding: [20, 20]}});
  }});
</script></body></html>"#,
        title = title,
        v = LEAFLET_VERSION,
        lat = qth.0,
        lon = qth.1,
        polylines = polylines,
        points = points,
    )
}
