use crate::config::AppConfig;
use crate::error::MapError;
use crate::export::layer_collection;
use crate::legend::render_html;
use crate::processing::MapDataset;
use crate::session::{SessionError, SessionId, SessionRegistry};
use crate::spatial::AreaLocator;
use crate::types::{AreaId, LegendSpec, Unit};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

pub struct AppState {
    pub dataset: Arc<MapDataset>,
    pub locator: AreaLocator,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(dataset: MapDataset) -> Self {
        let dataset = Arc::new(dataset);
        Self {
            locator: AreaLocator::new(&dataset.areas),
            sessions: SessionRegistry::new(Arc::clone(&dataset)),
            dataset,
        }
    }
}

#[derive(Debug)]
pub struct ApiError(SessionError);

impl From<MapError> for ApiError {
    fn from(e: MapError) -> Self {
        ApiError(SessionError::Map(e))
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SessionError::UnknownSession(_) => StatusCode::NOT_FOUND,
            SessionError::Map(MapError::UnknownIndicator { .. }) => StatusCode::NOT_FOUND,
            SessionError::Map(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (self.status(), body).into_response()
    }
}

#[derive(Serialize)]
pub struct IndicatorSummary {
    key: String,
    name: String,
    unit: Unit,
}

#[derive(Serialize)]
pub struct SessionCreated {
    id: SessionId,
}

#[derive(Deserialize)]
pub struct LayerChange {
    name: String,
}

#[derive(Deserialize)]
pub struct QueryParams {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
pub struct QueryResponse {
    id: AreaId,
    name: String,
    labels: BTreeMap<String, String>, // indicator key -> hover label
}

pub fn router(state: Arc<AppState>, static_dir: &std::path::Path) -> Router {
    Router::new()
        .route("/api/indicators", get(indicators_handler))
        .route("/api/layers/:key", get(layer_handler))
        .route("/api/legends/:key", get(legend_handler))
        .route("/api/legends/:key/html", get(legend_html_handler))
        .route("/api/sessions", post(create_session_handler))
        .route("/api/sessions/:id", delete(close_session_handler))
        .route("/api/sessions/:id/legend", get(current_legend_handler))
        .route("/api/sessions/:id/layer", post(select_layer_handler))
        .route("/api/query", get(query_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, dataset: MapDataset) -> Result<()> {
    info!("Building spatial index for API...");
    let state = Arc::new(AppState::new(dataset));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    info!("Starting server on http://{}", addr);

    let app = router(state, &config.output.dir);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn indicators_handler(State(state): State<Arc<AppState>>) -> Json<Vec<IndicatorSummary>> {
    Json(
        state
            .dataset
            .layers
            .iter()
            .map(|l| IndicatorSummary {
                key: l.indicator.key.clone(),
                name: l.indicator.name.clone(),
                unit: l.indicator.unit,
            })
            .collect(),
    )
}

async fn layer_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<FeatureCollection>, ApiError> {
    let layer = state.dataset.layer(&key)?;
    Ok(Json(layer_collection(&state.dataset, layer)))
}

async fn legend_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<LegendSpec>, ApiError> {
    let layer = state.dataset.layer(&key)?;
    Ok(Json(layer.legend.clone()))
}

async fn legend_html_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Html<String>, ApiError> {
    let layer = state.dataset.layer(&key)?;
    Ok(Html(render_html(&layer.legend)))
}

async fn create_session_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<SessionCreated>) {
    let id = state.sessions.open();
    (StatusCode::CREATED, Json(SessionCreated { id }))
}

async fn close_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.close(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(SessionError::UnknownSession(id).into())
    }
}

async fn current_legend_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
) -> Result<Json<Option<LegendSpec>>, ApiError> {
    Ok(Json(state.sessions.current_legend(id)?))
}

async fn select_layer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
    Json(change): Json<LayerChange>,
) -> Result<Json<LegendSpec>, ApiError> {
    let legend = state.sessions.select_layer(id, &change.name)?;
    Ok(Json(legend))
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<QueryResponse>> {
    let dataset = &state.dataset;
    let found = state.locator.locate(&dataset.areas, params.lon, params.lat).map(|i| {
        let area = &dataset.areas[i];
        QueryResponse {
            id: area.id,
            name: area.name.clone(),
            labels: dataset
                .layers
                .iter()
                .map(|layer| (layer.indicator.key.clone(), dataset.label(layer, area)))
                .collect(),
        }
    });

    Json(found)
}
