pub mod fetch;
pub mod health;
pub mod images;
pub mod views;

use crate::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use prism_common::PrismError;

/// Unwrap a JSON body, reporting rejections in the API's error shape.
pub(crate) fn body<T>(state: &AppState, payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| state.error(PrismError::Input(rejection.body_text())))
}
