//! Current user and team routes

use axum::{extract::State, Json};
use std::sync::Arc;

use super::changed;
use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::users::{is_hex_color, UpdateProfileRequest, User};
use crate::error::{ApiError, ApiResult};
use crate::services::{ChangeEvent, ChangeOp, Table};

const USER_COLUMNS: &str = "id, email, name, color, is_admin, created_at, updated_at";

/// GET /me
///
/// Upserts the caller from token claims. Stored names are kept; the email
/// follows the identity provider.
pub async fn get_me(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResult<DataResponse<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, email, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET
            email = COALESCE(EXCLUDED.email, users.email),
            name = COALESCE(users.name, EXCLUDED.name),
            updated_at = NOW()
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(auth.user_id)
    .bind(&auth.email)
    .bind(&auth.name)
    .fetch_one(&state.db)
    .await?;

    Ok(DataResponse::new(user))
}

/// GET /users
pub async fn list_users(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResult<DataResponse<Vec<User>>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users ORDER BY LOWER(COALESCE(name, email, '')), id",
        USER_COLUMNS
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(DataResponse::new(users))
}

/// PATCH /users/me
pub async fn update_profile(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<DataResponse<User>> {
    let name = req.name.as_deref().map(str::trim);
    if name.is_some_and(str::is_empty) {
        return Err(ApiError::bad_request("Name must not be empty"));
    }
    if let Some(color) = req.color.as_deref() {
        if !is_hex_color(color) {
            return Err(ApiError::bad_request("Color must look like #RRGGBB"));
        }
    }

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users SET
            name = COALESCE($2, name),
            color = COALESCE($3, color),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(auth.user_id)
    .bind(name)
    .bind(req.color.as_deref().map(str::to_uppercase))
    .fetch_one(&state.db)
    .await?;

    tracing::info!(user_id = %auth.user_id, "Profile updated");
    changed(
        &state,
        ChangeEvent::new(Table::Users, ChangeOp::Update, user.id),
    )
    .await;

    Ok(DataResponse::new(user))
}
