use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use prism_common::PrismError;
use serde_json::{Value, json};
use tracing::{error, warn};

/// A [`PrismError`] on its way to an HTTP caller.
#[derive(Debug)]
pub struct ApiError {
    pub error: PrismError,
    /// Include upstream bodies and configuration specifics in the response.
    pub expose_diagnostics: bool,
}

impl ApiError {
    pub fn new(error: PrismError, expose_diagnostics: bool) -> Self {
        Self {
            error,
            expose_diagnostics,
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            PrismError::Input(_) => StatusCode::BAD_REQUEST,
            PrismError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            PrismError::Upstream { .. } | PrismError::Parse { .. } => StatusCode::BAD_GATEWAY,
            PrismError::Exhausted { .. } => StatusCode::GATEWAY_TIMEOUT,
            PrismError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        let expose = self.expose_diagnostics;
        match &self.error {
            PrismError::Input(msg) => json!({ "error": msg }),
            PrismError::Config(reason) => {
                let mut body = json!({ "error": "Service is not configured" });
                if expose {
                    body["details"] = json!(reason);
                }
                body
            }
            PrismError::Upstream {
                service,
                status,
                message,
                body: upstream_body,
            } => {
                let mut body = json!({ "error": format!("{service} request failed") });
                if expose {
                    body["details"] = json!({
                        "status": status,
                        "message": message,
                        "body": upstream_body,
                    });
                }
                body
            }
            PrismError::Parse { reason, raw } => {
                let mut body = json!({
                    "error": "Failed to parse views",
                    "rawContent": raw,
                });
                if expose {
                    body["details"] = json!(reason);
                }
                body
            }
            PrismError::Exhausted { attempts } => json!({
                "error": "Could not generate image after multiple attempts",
                "details": { "attempts": attempts },
            }),
            PrismError::Internal(msg) => {
                let mut body = json!({ "error": "Internal error" });
                if expose {
                    body["details"] = json!(msg);
                }
                body
            }
        }
    }
}

impl From<PrismError> for ApiError {
    fn from(error: PrismError) -> Self {
        Self::new(error, false)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.error.kind();
        if status.is_server_error() {
            error!(%kind, status = status.as_u16(), error = ?self.error, "request failed");
        } else {
            warn!(%kind, status = status.as_u16(), error = %self.error, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
