// src/db/queries/profile.rs
use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use sqlx::PgPool;

use crate::db::models::user::{Profile, UpdateProfile};
use crate::middleware::auth::{ActorScope, ScopeCache};
use crate::utils::api_response::ApiResponse;

const PROFILE_COLUMNS: &str = "id, email, full_name, role, stream, department, reg_no, \
                               student_class, fcm_token, created_at, updated_at";

/// The caller's own profile.
#[utoipa::path(
    get,
    path = "/profile/me",
    responses(
        (status = 200, description = "Profile retrieved", body = Profile),
        (status = 404, description = "Profile not found"),
        (status = 500, description = "Failed to retrieve profile")
    ),
    tag = "Profile",
    security(("bearerAuth" = []))
)]
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(scope): Extension<ActorScope>,
) -> Result<ApiResponse<Profile>, ApiResponse<()>> {
    let profile = sqlx::query_as::<_, Profile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
    ))
    .bind(scope.user_id)
    .fetch_optional(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Profile not found", None))?;

    Ok(ApiResponse::success(StatusCode::OK, "Profile retrieved", profile))
}

/// Self-service profile update: students correcting reg_no / class before
/// applying, and devices registering their push token. Unset fields are left
/// untouched. The scope cache entry is dropped so the next request sees the
/// fresh row.
#[utoipa::path(
    patch,
    path = "/profile/me",
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = Profile),
        (status = 404, description = "Profile not found"),
        (status = 500, description = "Failed to update profile")
    ),
    tag = "Profile",
    security(("bearerAuth" = []))
)]
pub async fn update_me(
    State(pool): State<PgPool>,
    Extension(scope): Extension<ActorScope>,
    Extension(scope_cache): Extension<ScopeCache>,
    Json(payload): Json<UpdateProfile>,
) -> Result<ApiResponse<Profile>, ApiResponse<()>> {
    let profile = sqlx::query_as::<_, Profile>(&format!(
        r#"
        UPDATE profiles
        SET reg_no = COALESCE($2, reg_no),
            student_class = COALESCE($3, student_class),
            fcm_token = COALESCE($4, fcm_token),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {PROFILE_COLUMNS}
        "#
    ))
    .bind(scope.user_id)
    .bind(&payload.reg_no)
    .bind(&payload.student_class)
    .bind(&payload.fcm_token)
    .fetch_optional(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Profile not found", None))?;

    scope_cache.invalidate(&scope.user_id);

    Ok(ApiResponse::success(StatusCode::OK, "Profile updated", profile))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(get_me, update_me),
    components(schemas(Profile, UpdateProfile)),
    tags(
        (name = "Profile", description = "Authenticated actor profile endpoints")
    )
)]
pub struct ProfileDoc;
