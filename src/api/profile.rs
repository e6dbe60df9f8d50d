// src/api/profile.rs
use crate::db::queries::profile::*;
use axum::{routing::get, Router};
use sqlx::PgPool;

pub fn profile_routes() -> Router<PgPool> {
    Router::new().route("/profile/me", get(get_me).patch(update_me))
}
