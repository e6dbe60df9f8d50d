use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Extension, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use moka::sync::Cache; // ✅ High-performance TTL Cache
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use tracing::error;
use uuid::Uuid;

use crate::api::auth::Claims;
use crate::config::Config;
use crate::db::models::leave::Stream;
use crate::db::models::user::Role;
use crate::utils::api_response::ApiResponse;

/// ✅ Actor-scope cache keyed by user id
pub type ScopeCache = Arc<Cache<Uuid, ActorScope>>;

/// ✅ Initialize the `moka` Cache
pub fn create_scope_cache() -> ScopeCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(600)) // TTL = 10 minutes
            .build(),
    )
}

/// ✅ JWT Middleware (Handles Token Authentication)
pub async fn jwt_middleware(mut req: Request<Body>, next: Next) -> Result<Response, Response> {
    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing Authorization header", None)
            .into_response()
    })?;

    let token_str = auth_header.to_str().map_err(|_| {
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid Authorization header format",
            None,
        )
        .into_response()
    })?;

    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid token format (missing 'Bearer ' prefix)",
            None,
        )
        .into_response()
    })?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid token",
            Some(json!({ "error": e.to_string() })),
        )
        .into_response()
    })?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// The authenticated actor's authorization context, loaded from `profiles`.
///
/// Every role-scoped handler re-verifies against this — the store's row-level
/// policies are a separate guard, not a substitute.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct ActorScope {
    pub user_id: Uuid,
    pub role: Role,
    pub stream: Stream,
    pub department: Option<String>,
    pub full_name: String,
}

impl ActorScope {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// ✅ Can this actor act as the PC reviewer for a request in `stream`?
    pub fn can_review_stream(&self, stream: Stream) -> bool {
        self.role == Role::Pc && self.stream == stream
    }

    /// Read visibility: admins see every stream, PC and staff see their own.
    pub fn can_view_stream(&self, stream: Stream) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Pc | Role::Staff => self.stream == stream,
            Role::Student => false, // students only see their own rows
        }
    }
}

/// ✅ Scope middleware: resolves Claims into an `ActorScope` (cache first)
pub async fn scope_middleware(
    State(db_pool): State<PgPool>,
    Extension(scope_cache): Extension<ScopeCache>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        error!("Missing JWT claims in request");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing JWT claims in request", None)
            .into_response()
    })?;

    let user_id: Uuid = claims.sub.parse().map_err(|_| {
        error!("Invalid user ID format in JWT claims");
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid user ID format in JWT claims",
            None,
        )
        .into_response()
    })?;

    // ✅ Check cache first before querying DB
    if let Some(cached_scope) = scope_cache.get(&user_id) {
        req.extensions_mut().insert(cached_scope);
        return Ok(next.run(req).await);
    }

    let scope = match fetch_scope_from_db(user_id, &db_pool).await {
        Ok(Some(scope)) => scope,
        Ok(None) => {
            // Authenticated token but no profile row: treat as unauthenticated.
            return Err(ApiResponse::<()>::error(
                StatusCode::UNAUTHORIZED,
                "No profile found for authenticated user",
                None,
            )
            .into_response());
        }
        Err(err) => {
            error!("Failed to load actor scope: {:?}", err);
            return Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load user profile",
                Some(json!({ "error": err.to_string() })),
            )
            .into_response());
        }
    };

    scope_cache.insert(user_id, scope.clone());
    req.extensions_mut().insert(scope);
    Ok(next.run(req).await)
}

async fn fetch_scope_from_db(user_id: Uuid, pool: &PgPool) -> Result<Option<ActorScope>, sqlx::Error> {
    sqlx::query_as::<_, ActorScope>(
        r#"
        SELECT id AS user_id, role, stream, department, full_name
        FROM profiles
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(role: Role, stream: Stream) -> ActorScope {
        ActorScope {
            user_id: Uuid::new_v4(),
            role,
            stream,
            department: None,
            full_name: "Test Actor".to_string(),
        }
    }

    #[test]
    fn pc_reviews_only_their_own_stream() {
        let pc = scope(Role::Pc, Stream::Cse);
        assert!(pc.can_review_stream(Stream::Cse));
        assert!(!pc.can_review_stream(Stream::Ece));
    }

    #[test]
    fn admins_never_hold_pc_review_authority() {
        let admin = scope(Role::Admin, Stream::Cse);
        assert!(!admin.can_review_stream(Stream::Cse));
        assert!(admin.can_view_stream(Stream::Mech));
    }

    #[test]
    fn staff_visibility_is_stream_scoped() {
        let staff = scope(Role::Staff, Stream::Eee);
        assert!(staff.can_view_stream(Stream::Eee));
        assert!(!staff.can_view_stream(Stream::Civil));
    }

    #[test]
    fn students_have_no_stream_visibility() {
        let student = scope(Role::Student, Stream::Cse);
        assert!(!student.can_view_stream(Stream::Cse));
    }
}
