use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::db::models::leave::Stream;
use crate::db::models::user::Role;
use crate::utils::api_response::ApiResponse;

/// Represents a request to register a new account.
#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
    /// Role assigned at signup; never changes afterwards
    pub role: Role,
    pub stream: Stream,
    /// Required for staff, pc and admin accounts
    pub department: Option<String>,
    /// Required for student accounts
    pub reg_no: Option<String>,
    /// Required for student accounts
    pub student_class: Option<String>,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.email.trim().is_empty() || !self.email.contains('@') {
            problems.push("a valid email is required".to_string());
        }
        if self.password.len() < 8 {
            problems.push("password must be at least 8 characters".to_string());
        }
        if self.password != self.confirm_password {
            problems.push("passwords do not match".to_string());
        }
        if self.full_name.trim().is_empty() {
            problems.push("full_name is required".to_string());
        }
        match self.role {
            Role::Student => {
                if self.reg_no.as_deref().map_or(true, |s| s.trim().is_empty()) {
                    problems.push("reg_no is required for students".to_string());
                }
                if self
                    .student_class
                    .as_deref()
                    .map_or(true, |s| s.trim().is_empty())
                {
                    problems.push("student_class is required for students".to_string());
                }
            }
            Role::Staff | Role::Pc | Role::Admin => {
                if self
                    .department
                    .as_deref()
                    .map_or(true, |s| s.trim().is_empty())
                {
                    problems.push("department is required for this role".to_string());
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
}

/// JWT Claims used for authentication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - user ID as string
    pub sub: String,
    /// Email of the authenticated user
    pub email: String,
    /// Role string carried for clients; authorization re-reads the profile
    pub role: String,
    /// Expiration timestamp (UNIX time)
    pub exp: usize,
}

impl Claims {
    /// Converts `sub` to a `Uuid`, or returns a descriptive error.
    pub fn user_id(&self) -> Result<Uuid, ApiResponse<()>> {
        self.sub.parse::<Uuid>().map_err(|_| {
            ApiResponse::error(StatusCode::BAD_REQUEST, "Invalid user ID format in token", None)
        })
    }
}

#[derive(Serialize, Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login: token plus the role-resolved home destination, so
/// clients land on the right dashboard without re-deriving the mapping.
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub home: String,
}

#[derive(FromRow)]
struct Credential {
    id: Uuid,
    email: String,
    password_hash: String,
    role: Role,
}

/// Handles user login.
///
/// # Returns
/// * `200 OK` - JWT token, role and home destination.
/// * `401 Unauthorized` - If credentials are incorrect.
/// * `500 Internal Server Error` - If a database or token generation error occurs.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body(
        content = LoginRequest,
        description = "User login details",
    ),
    responses(
        (status = 200, description = "Successful login", body = LoginResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn login(
    State(pool): State<PgPool>,
    Json(payload): Json<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, ApiResponse<()>> {
    let config = Config::get();

    let credential = sqlx::query_as::<_, Credential>(
        "SELECT id, email, password_hash, role FROM profiles WHERE email = $1",
    )
    .bind(&payload.email)
    .fetch_optional(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?;

    let Some(credential) = credential else {
        warn!("❌ Login attempt for unknown email: {}", payload.email);
        return Err(ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid email or password.",
            None,
        ));
    };

    match verify(&payload.password, &credential.password_hash) {
        Ok(true) => {
            let claims = Claims {
                sub: credential.id.to_string(),
                email: credential.email.clone(),
                role: credential.role.as_str().to_string(),
                exp: chrono::Utc::now().timestamp() as usize + 36000, // 10 hour expiration
            };
            let token = encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            )
            .map_err(|e| {
                ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Token generation failed",
                    Some(json!({ "error": e.to_string() })),
                )
            })?;

            info!("✅ Login successful for {}", payload.email);
            Ok(ApiResponse::success(
                StatusCode::OK,
                "Login successful",
                LoginResponse {
                    token,
                    role: credential.role,
                    home: credential.role.home_path().to_string(),
                },
            ))
        }
        Ok(false) => {
            warn!("❌ Invalid password attempt for {}", payload.email);
            Err(ApiResponse::<()>::error(
                StatusCode::UNAUTHORIZED,
                "Invalid email or password.",
                None,
            ))
        }
        Err(e) => Err(ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password verification error",
            Some(json!({ "error": e.to_string() })),
        )),
    }
}

/// Handles account registration.
///
/// Validation (mismatched passwords, missing role-specific fields) rejects
/// before any store write.
///
/// # Returns
/// * `201 Created` - If registration is successful.
/// * `400 Bad Request` - If the payload fails validation.
/// * `409 Conflict` - If the email is already registered.
/// * `500 Internal Server Error` - If a database error occurs.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "Authentication",
    responses(
        (status = 201, description = "Account registered", body = RegisterResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<ApiResponse<RegisterResponse>, ApiResponse<()>> {
    if let Err(problems) = payload.validate() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Validation failed",
            Some(json!({ "problems": problems })),
        ));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let result = sqlx::query(
        r#"
        INSERT INTO profiles (email, password_hash, full_name, role, stream, department, reg_no, student_class)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(payload.email.trim())
    .bind(&password_hash)
    .bind(payload.full_name.trim())
    .bind(payload.role)
    .bind(payload.stream)
    .bind(&payload.department)
    .bind(&payload.reg_no)
    .bind(&payload.student_class)
    .execute(&pool)
    .await;

    match result {
        Ok(_) => Ok(ApiResponse::success(
            StatusCode::CREATED,
            "Account registered",
            RegisterResponse {
                message: "Account registered".into(),
            },
        )),
        Err(e) => {
            if let Some(db_err) = e.as_database_error() {
                if db_err.code().map(|code| code == "23505").unwrap_or(false) {
                    return Err(ApiResponse::<()>::error(
                        StatusCode::CONFLICT,
                        "Email already registered",
                        None,
                    ));
                }
            }
            Err(ApiResponse::<()>::db_error(e))
        }
    }
}

/// The caller's resolved dashboard destination.
#[derive(Serialize, ToSchema)]
pub struct HomeResponse {
    pub role: Role,
    pub home: String,
}

/// Resolve the caller's home destination from the role claim in their token.
///
/// Tokens minted before a role rename would carry an unknown string; those
/// take the documented student fallback rather than stranding the client.
#[utoipa::path(
    get,
    path = "/auth/home",
    tag = "Authentication",
    responses(
        (status = 200, description = "Home destination resolved", body = HomeResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn resolve_home(Extension(claims): Extension<Claims>) -> ApiResponse<HomeResponse> {
    let role = Role::parse_lenient(&claims.role);
    ApiResponse::success(
        StatusCode::OK,
        "Home destination resolved",
        HomeResponse {
            role,
            home: role.home_path().to_string(),
        },
    )
}

/// Represents a request to change the caller's own password.
#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Handles a self-service password change.
///
/// The caller must provide their current password for verification; the
/// target account is always the authenticated user.
#[utoipa::path(
    post,
    path = "/auth/change_password",
    tag = "Authentication",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated successfully"),
        (status = 401, description = "Old password incorrect"),
        (status = 404, description = "Profile not found"),
        (status = 500, description = "Internal Server Error")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn change_password(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    if payload.new_password.len() < 8 {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "New password must be at least 8 characters",
            None,
        ));
    }

    let current_hash: Option<String> =
        sqlx::query_scalar("SELECT password_hash FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&pool)
            .await
            .map_err(ApiResponse::<()>::db_error)?;

    let Some(current_hash) = current_hash else {
        return Err(ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Profile not found", None));
    };

    let is_valid = verify(&payload.old_password, &current_hash).unwrap_or(false);
    if !is_valid {
        return Err(ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Incorrect old password",
            None,
        ));
    }

    let new_password_hash = hash(&payload.new_password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    sqlx::query("UPDATE profiles SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(&new_password_hash)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(ApiResponse::<()>::db_error)?;

    Ok(ApiResponse::success(StatusCode::OK, "Password updated successfully", ()))
}

/// Public authentication routes: registration and login.
pub fn auth_routes() -> Router<PgPool> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Protected authentication routes (require a valid JWT).
pub fn secure_auth_routes() -> Router<PgPool> {
    Router::new()
        .route("/auth/change_password", post(change_password))
        .route("/auth/home", get(resolve_home))
}

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::Components;
use utoipa::Modify;
use utoipa::OpenApi;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.clone().unwrap_or(Components::default());
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        openapi.components = Some(components);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(login, register, change_password, resolve_home),
    components(
        schemas(
            LoginRequest, LoginResponse,
            RegisterRequest, RegisterResponse,
            ChangePasswordRequest, HomeResponse
        )
    ),
    tags(
        (name = "Authentication", description = "User Auth Endpoints")
    ),
    modifiers(&SecurityAddon)
)]
pub struct AuthDoc;
