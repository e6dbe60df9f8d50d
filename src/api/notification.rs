// src/api/notification.rs
use crate::db::queries::notification::*;
use axum::{
    routing::{get, patch},
    Router,
};
use sqlx::PgPool;

pub fn notification_routes() -> Router<PgPool> {
    Router::new()
        .route("/notifications", get(get_notifications))
        .route("/notifications/count", get(get_notification_count))
        .route("/notifications/read_all", patch(mark_all_read))
}
