use axum::Json;

use crate::error::ApiResponse;
use crate::ui::{self, DashboardRoute, NavItem};

/// Dashboard side menu
/// GET /api/v1/nav
pub async fn get_nav() -> Json<ApiResponse<Vec<NavItem>>> {
    Json(ApiResponse::success(ui::nav_items()))
}

/// Pages handled by the dashboard's client-side router
/// GET /api/v1/nav/routes
pub async fn get_routes() -> Json<ApiResponse<&'static [DashboardRoute]>> {
    Json(ApiResponse::success(ui::DASHBOARD_ROUTES))
}
