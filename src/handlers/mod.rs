pub mod extract;
pub mod file;
pub mod nav;
pub mod user;

use axum::Json;

use crate::error::ApiResponse;

/// Liveness check
/// GET /api/v1/health
pub async fn health() -> Json<ApiResponse<()>> {
    Json(ApiResponse::<()>::success_message("ok"))
}
