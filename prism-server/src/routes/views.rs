use super::body;
use crate::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use prism_common::PrismError;
use prism_views::{View, ViewInput};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ViewsRequest {
    pub url: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateViewsRequest {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ViewsResponse {
    pub views: Vec<View>,
}

/// `POST /api/views`: article URL or text in, views out.
pub async fn create_views(
    State(state): State<AppState>,
    payload: Result<Json<ViewsRequest>, JsonRejection>,
) -> Result<Json<ViewsResponse>, ApiError> {
    let req = body(&state, payload)?;
    let input = ViewInput::from_parts(req.url, req.text).map_err(|e| state.error(e))?;
    let pipeline = state.views.get().map_err(|e| state.error(e))?;
    let views = pipeline.run(input).await.map_err(|e| state.error(e))?;
    Ok(Json(ViewsResponse { views }))
}

/// `POST /api/generate-views`: text only.
pub async fn generate_views(
    State(state): State<AppState>,
    payload: Result<Json<GenerateViewsRequest>, JsonRejection>,
) -> Result<Json<ViewsResponse>, ApiError> {
    let req = body(&state, payload)?;
    let text = req
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| state.error(PrismError::Input("Text is required".into())))?;
    let pipeline = state.views.get().map_err(|e| state.error(e))?;
    let views = pipeline
        .views_from_text(&text)
        .await
        .map_err(|e| state.error(e))?;
    Ok(Json(ViewsResponse { views }))
}
