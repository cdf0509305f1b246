use super::body;
use crate::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use prism_common::PrismError;
use prism_image::{GeneratedImages, ImageGenerator};
use prism_image::runware::{InferenceRequest, RunwareImage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunwareResponse {
    pub image_url: String,
    pub all_image_urls: Vec<String>,
    pub all_images: Vec<RunwareImage>,
}

fn require_prompt(state: &AppState, prompt: Option<&str>) -> Result<(), ApiError> {
    match prompt {
        Some(p) if !p.trim().is_empty() => Ok(()),
        _ => Err(state.error(PrismError::Input("A valid prompt is required".into()))),
    }
}

/// `POST /api/generate-image`: submit to Leonardo and poll until ready.
pub async fn generate_image(
    State(state): State<AppState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Json<GeneratedImages>, ApiError> {
    let req = body(&state, payload)?;
    require_prompt(&state, req.prompt.as_deref())?;
    let prompt = req.prompt.unwrap_or_default();

    let generator = state.leonardo.get().map_err(|e| state.error(e))?;
    let images = generator
        .generate(&prompt)
        .await
        .into_result(generator.provider())
        .map_err(|e| state.error(e))?;
    Ok(Json(images))
}

/// `POST /api/runware-image`: one synchronous Runware inference.
pub async fn runware_image(
    State(state): State<AppState>,
    payload: Result<Json<InferenceRequest>, JsonRejection>,
) -> Result<Json<RunwareResponse>, ApiError> {
    let req = body(&state, payload)?;
    require_prompt(&state, Some(&req.prompt))?;

    let client = state.runware.get().map_err(|e| state.error(e))?;
    let images = client
        .infer(&req)
        .await
        .map_err(|e| state.error(e.into_prism(client.provider())))?;

    let all_image_urls: Vec<String> = images.iter().map(|img| img.image_url.clone()).collect();
    let image_url = all_image_urls
        .first()
        .cloned()
        .ok_or_else(|| state.error(PrismError::upstream("runware", "No images generated")))?;
    Ok(Json(RunwareResponse {
        image_url,
        all_image_urls,
        all_images: images,
    }))
}
