// src/api/leave.rs
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::leave::*;

pub fn leave_routes() -> Router<PgPool> {
    Router::new()
        .route("/requests", post(create_leave_request).get(list_leave_requests))
        .route("/requests/mine", get(my_leave_requests))
        .route("/requests/stats", get(leave_request_stats))
        .route(
            "/requests/{request_id}",
            get(get_leave_request)
                .patch(review_leave_request)
                .delete(delete_leave_request),
        )
}
