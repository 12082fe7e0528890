use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use scatterview_core::config::SourceSettings;
use scatterview_core::consts::DEV_MODE_RIGHT_INDEX;
use scatterview_core::error::Result;
use scatterview_core::fetch::fetch_pair;
use scatterview_core::source::resolve;
use scatterview_core::stats::AccumulatedStatistics;

use crate::error::ApiError;
use crate::response::{Diagnostics, ScanPairData, ScanPairResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ScanPairQuery {
    #[serde(default)]
    pub left_image_index: usize,
    #[serde(default = "default_right_index")]
    pub right_image_index: usize,
}

fn default_right_index() -> usize {
    1
}

/// GET /initial-scans-fetching
///
/// Store settings are validated before anything is opened, in DEV mode too.
/// DEV mode reads the local directory and always shows scan 0 on the right.
/// The blocking work is cancelled if the client goes away.
pub async fn initial_scans_fetching(
    State(state): State<AppState>,
    query: std::result::Result<Query<ScanPairQuery>, QueryRejection>,
) -> std::result::Result<Json<ScanPairResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let dev_mode = state.config.dev_mode;

    let credentials = state.env.store_env().validate()?;

    let left = query.left_image_index;
    let right = if dev_mode {
        DEV_MODE_RIGHT_INDEX
    } else {
        query.right_image_index
    };
    let settings = if dev_mode {
        SourceSettings::Local(state.config.source.local_settings())
    } else {
        SourceSettings::Remote(state.config.source.remote_settings(&credentials))
    };
    debug!(left, right, dev_mode, "Scan pair requested");

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let task_state = state.clone();
    let tiled_uri = credentials.images_uri;
    let response = tokio::task::spawn_blocking(move || {
        fetch_scans(&task_state, &settings, &tiled_uri, left, right, &cancel)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Scan task failed: {e}")))??;
    guard.disarm();

    Ok(Json(response))
}

fn fetch_scans(
    state: &AppState,
    settings: &SourceSettings,
    tiled_uri: &str,
    left: usize,
    right: usize,
    cancel: &CancellationToken,
) -> Result<ScanPairResponse> {
    let config = &state.config;
    let source = state.sources.open(settings)?;
    let (fresh, mask) = resolve(source.as_ref())?;
    let scans = state.reconcile_scans(&source.location(), fresh);

    let pair = fetch_pair(
        &scans,
        left,
        right,
        &mask,
        source.as_ref(),
        AccumulatedStatistics::default(),
        &config.source.accumulate_options(),
        cancel,
    )?;
    info!(
        left = %pair.left.name,
        right = %pair.right.name,
        scans = scans.len(),
        gaps = pair.statistics.gap_count(),
        "Serving scan pair"
    );

    let diagnostics = Diagnostics::new(
        &mask,
        tiled_uri,
        &config.source.data_local_path.display().to_string(),
        config.dev_mode,
    );
    Ok(ScanPairResponse {
        data: ScanPairData::new(pair, &scans),
        diagnostics,
    })
}
