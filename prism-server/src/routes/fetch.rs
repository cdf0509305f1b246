use super::body;
use crate::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use prism_common::PrismError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub html: String,
}

/// `POST /api/fetch-url`: raw HTML of a public page.
pub async fn fetch_url(
    State(state): State<AppState>,
    payload: Result<Json<FetchRequest>, JsonRejection>,
) -> Result<Json<FetchResponse>, ApiError> {
    let req = body(&state, payload)?;
    let url = req
        .url
        .ok_or_else(|| state.error(PrismError::Input("URL is required".into())))?;
    let page = state.fetcher.fetch(&url).await.map_err(|e| state.error(e))?;
    Ok(Json(FetchResponse { html: page.html }))
}
