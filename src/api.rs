use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use shuttle_axum::axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::dashboard::{AlertStatus, Dashboard, Panel, ToggleOutcome};
use crate::flags::MapGeometry;
use crate::map::MapUnavailable;
use crate::muf::MufReading;
use crate::ticker::{TickerEntry, TickerSlot};

pub type AppState = Arc<Dashboard>;

pub fn router(dashboard: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/alert/status", get(alert_status))
        .route("/alert/toggle", post(alert_toggle))
        .route("/ticker", get(ticker_slot))
        .route("/ticker/entries", get(ticker_entries))
        .route("/map", get(map_page))
        .route("/map/geometry", get(map_geometry).put(save_map_geometry))
        .route("/muf", get(muf))
        .route("/panels/{panel}/toggle", post(panel_toggle))
        .layer(CorsLayer::very_permissive())
        .with_state(dashboard)
}

async fn alert_status(State(d): State<AppState>) -> Json<AlertStatus> {
    Json(d.alert_status(Utc::now()))
}

async fn alert_toggle(State(d): State<AppState>) -> Response {
    let outcome = d.toggle_alerts().await;
    let status = match outcome {
        ToggleOutcome::Denied => StatusCode::FORBIDDEN,
        ToggleOutcome::Toggled { .. } => StatusCode::OK,
    };
    (status, Json(outcome)).into_response()
}

async fn ticker_slot(State(d): State<AppState>) -> Json<TickerSlot> {
    Json(d.ticker_slot())
}

#[derive(Serialize)]
struct EntryOut {
    headline: String,
    #[serde(flatten)]
    entry: TickerEntry,
}

async fn ticker_entries(State(d): State<AppState>) -> Json<Vec<EntryOut>> {
    let out = d
        .ticker_entries()
        .into_iter()
        .map(|entry| EntryOut {
            headline: entry.headline(),
            entry,
        })
        .collect();
    Json(out)
}

async fn map_page(State(d): State<AppState>) -> Response {
    match d.map_document(Utc::now()).await {
        Ok(html) => Html(html).into_response(),
        Err(why) => {
            let status = match why {
                MapUnavailable::QthMissing => StatusCode::UNPROCESSABLE_ENTITY,
                MapUnavailable::NoRecentAlert | MapUnavailable::NoDirections => {
                    StatusCode::NOT_FOUND
                }
            };
            (status, why.notification().body).into_response()
        }
    }
}

async fn map_geometry(State(d): State<AppState>) -> Json<MapGeometry> {
    Json(d.map_geometry())
}

async fn save_map_geometry(State(d): State<AppState>, Json(g): Json<MapGeometry>) -> Response {
    match d.save_map_geometry(&g) {
        Ok(()) => Json(d.map_geometry()).into_response(),
        Err(e) => {
            tracing::warn!(error = ?e, "could not persist map geometry");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to persist geometry").into_response()
        }
    }
}

#[derive(Serialize)]
struct MufOut {
    hidden: bool,
    reading: Option<MufReading>,
}

async fn muf(State(d): State<AppState>) -> Json<MufOut> {
    Json(MufOut {
        hidden: d.panel_hidden(Panel::Muf),
        reading: d.muf_reading(),
    })
}

#[derive(Serialize)]
struct PanelOut {
    panel: String,
    hidden: bool,
}

async fn panel_toggle(State(d): State<AppState>, Path(name): Path<String>) -> Response {
    let panel: Panel = match name.parse() {
        Ok(p) => p,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let hidden = d.toggle_panel(panel);
    Json(PanelOut {
        panel: name,
        hidden,
    })
    .into_response()
}
