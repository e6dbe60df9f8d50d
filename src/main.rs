use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use dotenvy::dotenv;
use sqlx::PgPool;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod config;
mod db;
mod middleware;
mod utils;
mod workflow;

use crate::api::attachment::AttachmentDoc;
use crate::api::auth::AuthDoc;
use crate::config::Config;
use crate::db::queries::leave::LeaveDoc;
use crate::db::queries::notification::NotificationDoc;
use crate::db::queries::profile::ProfileDoc;
use crate::middleware::auth::{create_scope_cache, jwt_middleware, scope_middleware};

#[tokio::main]
async fn main() {
    dotenv().ok();
    Config::init();

    std::fs::create_dir_all("logs").expect("Failed to create logs directory");
    let file_appender = tracing_appender::rolling::daily("logs", "leavex.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .with_writer(non_blocking)
        .init();

    let scope_cache = create_scope_cache();
    let pool = db::pool::get_db_pool()
        .await
        .expect("Failed to connect to the database");

    let merged_doc = AuthDoc::openapi()
        .merge_from(LeaveDoc::openapi())
        .merge_from(NotificationDoc::openapi())
        .merge_from(ProfileDoc::openapi())
        .merge_from(AttachmentDoc::openapi());

    // Public routes
    let public_routes = Router::new()
        .merge(api::auth::auth_routes());

    // Private routes: JWT first, then actor scope resolution
    let private_routes = Router::new()
        .merge(api::leave::leave_routes())
        .merge(api::notification::notification_routes())
        .merge(api::profile::profile_routes())
        .merge(api::attachment::attachment_routes())
        .merge(api::auth::secure_auth_routes())
        .route_layer(from_fn_with_state(pool.clone(), scope_middleware))
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(api::health::health_routes())
        .merge(public_routes)
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(CorsLayer::permissive())
        .layer(Extension(scope_cache.clone()))
        .with_state(pool.clone());

    run_server(app, pool).await;
    println!("Shutdown complete.");
}

async fn run_server(app: Router, pool: PgPool) {
    let addr: SocketAddr = Config::get()
        .listen_addr
        .parse()
        .expect("LISTEN_ADDR must be a valid socket address");
    println!("Server running at http://{}", addr);

    let listener = TcpListener::bind(&addr).await.expect("Failed to bind listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server encountered an error");

    println!("🛠️ Closing database pool...");
    pool.close().await;
    println!("✅ Database pool closed. Server shutting down.");
}

async fn shutdown_signal() {
    signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
    println!("Received Ctrl+C, shutting down...");
}
