//! HTTP surface for Prism.
//!
//! [`app::AppState::from_config`] builds every provider client once;
//! [`app::build_router`] mounts the routes over that shared state.

pub mod app;
pub mod error;
pub mod routes;

pub use app::{AppState, Provisioned, Services, build_router};
pub use error::ApiError;
