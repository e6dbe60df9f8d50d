// src/db/queries/notification.rs
use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
};
use sqlx::PgPool;

use crate::db::models::notification::{Notification, NotificationCountResponse, NotificationFilter};
use crate::middleware::auth::ActorScope;
use crate::utils::api_response::ApiResponse;

/// The caller's most recent notifications, newest first.
#[utoipa::path(
    get,
    path = "/notifications",
    params(NotificationFilter),
    responses(
        (status = 200, description = "Notifications retrieved", body = Vec<Notification>),
        (status = 500, description = "Failed to retrieve notifications")
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn get_notifications(
    State(pool): State<PgPool>,
    Extension(scope): Extension<ActorScope>,
    Query(filter): Query<NotificationFilter>,
) -> Result<ApiResponse<Vec<Notification>>, ApiResponse<()>> {
    let limit = filter.limit.unwrap_or(20).clamp(1, 100);

    let notifications = sqlx::query_as::<_, Notification>(
        r#"
        SELECT * FROM notifications
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(scope.user_id)
    .bind(limit)
    .fetch_all(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?;

    Ok(ApiResponse::success(StatusCode::OK, "Notifications", notifications))
}

/// Total and unread counts, for the bell badge.
#[utoipa::path(
    get,
    path = "/notifications/count",
    responses(
        (status = 200, description = "Notification counts", body = NotificationCountResponse),
        (status = 500, description = "Failed to count notifications")
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn get_notification_count(
    State(pool): State<PgPool>,
    Extension(scope): Extension<ActorScope>,
) -> Result<ApiResponse<NotificationCountResponse>, ApiResponse<()>> {
    let (total, unread): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COUNT(*) FILTER (WHERE NOT is_read)
        FROM notifications
        WHERE user_id = $1
        "#,
    )
    .bind(scope.user_id)
    .fetch_one(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notification counts",
        NotificationCountResponse { total, unread },
    ))
}

/// Mark every one of the caller's notifications read. The only mutation the
/// recipient is allowed.
#[utoipa::path(
    patch,
    path = "/notifications/read_all",
    responses(
        (status = 200, description = "Notifications marked read", body = u64),
        (status = 500, description = "Failed to update notifications")
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn mark_all_read(
    State(pool): State<PgPool>,
    Extension(scope): Extension<ActorScope>,
) -> Result<ApiResponse<u64>, ApiResponse<()>> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
    )
    .bind(scope.user_id)
    .execute(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notifications marked read",
        result.rows_affected(),
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(get_notifications, get_notification_count, mark_all_read),
    components(schemas(Notification, NotificationCountResponse)),
    tags(
        (name = "Notifications", description = "Per-user notification endpoints")
    )
)]
pub struct NotificationDoc;
