use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{ApiResponse, Result};
use crate::handlers::extract::{AppJson, AppQuery};
use crate::models::{
    CreateUserRequest, PaginationQuery, UpdateUserRequest, UserListResponse, UserResponse,
};
use crate::services::UserService;
use crate::AppState;

/// Create a user
/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let user = UserService::create(&state.db, req).await?;
    Ok(Json(ApiResponse::success(UserResponse::from(user))))
}

/// List users, one page at a time
/// GET /api/v1/users?page_index=1&page_size=10
pub async fn list_users(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PaginationQuery>,
) -> Result<Json<ApiResponse<UserListResponse>>> {
    let page = UserService::find_all(&state.db, &query).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Get a user
/// GET /api/v1/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let user = UserService::find_user_by_id(&state.db, &id).await?;
    Ok(Json(ApiResponse::success(UserResponse::from(user))))
}

/// Look a user up by name; `data` is null when nobody has that name
/// GET /api/v1/users/by-name/:user_name
pub async fn get_user_by_name(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
) -> Result<Json<ApiResponse<Option<UserResponse>>>> {
    let user = UserService::find_user_by_name(&state.db, &user_name).await?;
    Ok(Json(ApiResponse::success(user.map(UserResponse::from))))
}

/// Update a user; responds with the user as it was before the update
/// PUT /api/v1/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let previous = UserService::update_user(&state.db, &id, req).await?;
    Ok(Json(ApiResponse::success(UserResponse::from(previous))))
}

/// Delete a user
/// DELETE /api/v1/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let deleted = UserService::delete_user(&state.db, &id).await?;
    let response = match deleted {
        Some(user) => ApiResponse::success(UserResponse::from(user)),
        None => ApiResponse {
            code: 0,
            message: "No user matched".to_string(),
            data: None,
        },
    };
    Ok(Json(response))
}
