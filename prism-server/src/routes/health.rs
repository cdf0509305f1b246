use crate::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub llm: &'static str,
    pub images: ImageHealth,
}

#[derive(Debug, Serialize)]
pub struct ImageHealth {
    pub leonardo: &'static str,
    pub runware: &'static str,
}

/// Liveness plus which providers have credentials. Always 200.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        llm: state.views.status(),
        images: ImageHealth {
            leonardo: state.leonardo.status(),
            runware: state.runware.status(),
        },
    })
}
