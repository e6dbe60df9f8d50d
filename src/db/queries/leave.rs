// src/db/queries/leave.rs
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::db::models::leave::{
    LeaveFilter, LeaveRequest, LeaveStats, LeaveStatus, NewLeaveRequest, ReviewDecision, Stream,
};
use crate::db::models::user::Role;
use crate::middleware::auth::ActorScope;
use crate::utils::api_response::ApiResponse;
use crate::utils::notification;
use crate::workflow::{self, ReviewAction, ReviewStage, WorkflowError};

/// Submit a leave request. The entry status is derived from the submitter's
/// role: students and staff enter PC review, a PC's own request enters admin
/// review with the PC stage already stamped.
#[utoipa::path(
    post,
    path = "/requests",
    request_body = NewLeaveRequest,
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Submitter role has no entry state"),
        (status = 500, description = "Failed to insert leave request")
    ),
    tag = "Leave Requests",
    security(("bearerAuth" = []))
)]
pub async fn create_leave_request(
    State(pool): State<PgPool>,
    Extension(scope): Extension<ActorScope>,
    Json(payload): Json<NewLeaveRequest>,
) -> Result<ApiResponse<LeaveRequest>, ApiResponse<()>> {
    if let Err(problems) = payload.validate() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Validation failed",
            Some(json!({ "problems": problems })),
        ));
    }

    let entry = workflow::entry_point(scope.role).map_err(|e| {
        ApiResponse::<()>::error(StatusCode::FORBIDDEN, e.to_string(), None)
    })?;

    let (pc_reviewed_by, pc_reviewed_at) = if entry.pc_preapproved {
        (Some(scope.user_id), Some(Utc::now()))
    } else {
        (None, None)
    };

    let request = sqlx::query_as::<_, LeaveRequest>(
        r#"
        INSERT INTO leave_requests (
            requested_by, student_name, student_class, reg_no, stream,
            cgpa, attendance_percentage, from_date, to_date, reason,
            attachment_url, status, pc_reviewed_by, pc_reviewed_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(scope.user_id)
    .bind(payload.student_name.trim())
    .bind(payload.student_class.trim())
    .bind(&payload.reg_no)
    .bind(scope.stream)
    .bind(&payload.cgpa)
    .bind(&payload.attendance_percentage)
    .bind(payload.from_date)
    .bind(payload.to_date)
    .bind(payload.reason.trim())
    .bind(&payload.attachment_url)
    .bind(entry.status)
    .bind(pc_reviewed_by)
    .bind(pc_reviewed_at)
    .fetch_one(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?;

    // Reviewer-facing heads-up; the submitter sees the row they just wrote.
    if let Err(e) = notification::notify_request_submitted(&pool, &request).await {
        tracing::warn!(request_id = %request.id, error = %e, "failed to notify reviewers of new request");
    }

    Ok(ApiResponse::success(StatusCode::CREATED, "Leave request submitted", request))
}

/// Role-scoped listing: admins see every stream (optionally filtered), PC and
/// staff see their own stream, students see only their own submissions.
#[utoipa::path(
    get,
    path = "/requests",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Leave requests in the caller's scope", body = Vec<LeaveRequest>),
        (status = 500, description = "Failed to retrieve requests")
    ),
    tag = "Leave Requests",
    security(("bearerAuth" = []))
)]
pub async fn list_leave_requests(
    State(pool): State<PgPool>,
    Extension(scope): Extension<ActorScope>,
    Query(filter): Query<LeaveFilter>,
) -> Result<ApiResponse<Vec<LeaveRequest>>, ApiResponse<()>> {
    let limit = filter.limit.unwrap_or(50).clamp(1, 200);
    let offset = filter.offset.unwrap_or(0).max(0);

    let mut qb = QueryBuilder::new("SELECT * FROM leave_requests WHERE 1=1");
    push_scope_filter(&mut qb, &scope, filter.stream);

    if let Some(raw) = filter.status.as_deref() {
        qb.push(" AND status = ").push_bind(LeaveStatus::parse_lenient(raw));
    }

    qb.push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let requests = qb
        .build_query_as::<LeaveRequest>()
        .fetch_all(&pool)
        .await
        .map_err(ApiResponse::<()>::db_error)?;

    Ok(ApiResponse::success(StatusCode::OK, "Leave requests", requests))
}

/// The caller's own submissions, newest first.
#[utoipa::path(
    get,
    path = "/requests/mine",
    responses(
        (status = 200, description = "Caller's own leave requests", body = Vec<LeaveRequest>),
        (status = 500, description = "Failed to retrieve requests")
    ),
    tag = "Leave Requests",
    security(("bearerAuth" = []))
)]
pub async fn my_leave_requests(
    State(pool): State<PgPool>,
    Extension(scope): Extension<ActorScope>,
) -> Result<ApiResponse<Vec<LeaveRequest>>, ApiResponse<()>> {
    let requests = sqlx::query_as::<_, LeaveRequest>(
        "SELECT * FROM leave_requests WHERE requested_by = $1 ORDER BY created_at DESC",
    )
    .bind(scope.user_id)
    .fetch_all(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?;

    Ok(ApiResponse::success(StatusCode::OK, "Your leave requests", requests))
}

/// Per-status counts over the caller's visibility scope, for dashboard tiles.
#[utoipa::path(
    get,
    path = "/requests/stats",
    responses(
        (status = 200, description = "Counts by status", body = LeaveStats),
        (status = 500, description = "Failed to compute stats")
    ),
    tag = "Leave Requests",
    security(("bearerAuth" = []))
)]
pub async fn leave_request_stats(
    State(pool): State<PgPool>,
    Extension(scope): Extension<ActorScope>,
) -> Result<ApiResponse<LeaveStats>, ApiResponse<()>> {
    let mut qb =
        QueryBuilder::new("SELECT status, COUNT(*) FROM leave_requests WHERE 1=1");
    push_scope_filter(&mut qb, &scope, None);
    qb.push(" GROUP BY status");

    let rows: Vec<(LeaveStatus, i64)> = qb
        .build_query_as::<(LeaveStatus, i64)>()
        .fetch_all(&pool)
        .await
        .map_err(ApiResponse::<()>::db_error)?;

    let mut stats = LeaveStats::default();
    for (status, count) in rows {
        stats.total += count;
        match status {
            LeaveStatus::PendingPc => stats.pending_pc = count,
            LeaveStatus::PendingAdmin => stats.pending_admin = count,
            LeaveStatus::Approved => stats.approved = count,
            LeaveStatus::Declined => stats.declined = count,
        }
    }

    Ok(ApiResponse::success(StatusCode::OK, "Leave request stats", stats))
}

/// Fetch one request. Visible to its submitter, reviewers of its stream, and
/// admins; everyone else gets a 403 even if the id is guessed.
#[utoipa::path(
    get,
    path = "/requests/{request_id}",
    params(
        ("request_id" = Uuid, Path, description = "Leave request ID")
    ),
    responses(
        (status = 200, description = "Leave request retrieved", body = LeaveRequest),
        (status = 403, description = "Request outside the caller's scope"),
        (status = 404, description = "Leave request not found")
    ),
    tag = "Leave Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_leave_request(
    State(pool): State<PgPool>,
    Extension(scope): Extension<ActorScope>,
    Path(request_id): Path<Uuid>,
) -> Result<ApiResponse<LeaveRequest>, ApiResponse<()>> {
    let request = fetch_request(&pool, request_id).await?;

    if request.requested_by != scope.user_id && !scope.can_view_stream(request.stream) {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Request is outside your scope",
            None,
        ));
    }

    Ok(ApiResponse::success(StatusCode::OK, "Leave request retrieved", request))
}

/// Apply a reviewer's decision.
///
/// The status change is a conditional update guarded by the expected current
/// status; a stale caller (double click, concurrent reviewer) gets a 409 and
/// should re-fetch rather than retry. The submitter's notification is written
/// in the same transaction as the transition.
#[utoipa::path(
    patch,
    path = "/requests/{request_id}",
    params(
        ("request_id" = Uuid, Path, description = "Leave request ID")
    ),
    request_body = ReviewDecision,
    responses(
        (status = 200, description = "Review recorded", body = LeaveRequest),
        (status = 403, description = "Caller cannot review this request"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Request already processed"),
        (status = 500, description = "Failed to update leave request")
    ),
    tag = "Leave Requests",
    security(("bearerAuth" = []))
)]
pub async fn review_leave_request(
    State(pool): State<PgPool>,
    Extension(scope): Extension<ActorScope>,
    Path(request_id): Path<Uuid>,
    Json(decision): Json<ReviewDecision>,
) -> Result<ApiResponse<LeaveRequest>, ApiResponse<()>> {
    let request = fetch_request(&pool, request_id).await?;

    // Stream guard: a PC only reviews requests from their own stream.
    if scope.role == Role::Pc && !scope.can_review_stream(request.stream) {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Request is outside your stream",
            None,
        ));
    }

    let transition = workflow::transition(request.status, scope.role, decision.action)
        .map_err(workflow_error_response)?;

    let now = Utc::now();
    let mut tx = pool.begin().await.map_err(ApiResponse::<()>::db_error)?;

    let updated = match transition.stage {
        ReviewStage::Pc => {
            sqlx::query_as::<_, LeaveRequest>(
                r#"
                UPDATE leave_requests
                SET status = $1, pc_reviewed_by = $2, pc_reviewed_at = $3
                WHERE id = $4 AND status = $5
                RETURNING *
                "#,
            )
            .bind(transition.to)
            .bind(scope.user_id)
            .bind(now)
            .bind(request_id)
            .bind(transition.from)
            .fetch_optional(&mut *tx)
            .await
            .map_err(ApiResponse::<()>::db_error)?
        }
        ReviewStage::Admin => {
            let declined_by =
                (transition.to == LeaveStatus::Declined).then_some(scope.user_id);
            sqlx::query_as::<_, LeaveRequest>(
                r#"
                UPDATE leave_requests
                SET status = $1, reviewed_by = $2, reviewed_at = $3, declined_by = $4
                WHERE id = $5 AND status = $6
                RETURNING *
                "#,
            )
            .bind(transition.to)
            .bind(scope.user_id)
            .bind(now)
            .bind(declined_by)
            .bind(request_id)
            .bind(transition.from)
            .fetch_optional(&mut *tx)
            .await
            .map_err(ApiResponse::<()>::db_error)?
        }
    };

    // Zero rows: someone else moved the request first. Dropping the
    // transaction rolls back; the caller re-fetches authoritative state.
    let Some(updated) = updated else {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Request already processed",
            None,
        ));
    };

    notification::notify_request_decision(&mut *tx, &updated, &transition)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create notification",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    tx.commit().await.map_err(ApiResponse::<()>::db_error)?;

    Ok(ApiResponse::success(StatusCode::OK, "Review recorded", updated))
}

/// Hard delete, no tombstone: allowed for the submitter, the stream's PC, or
/// an admin.
#[utoipa::path(
    delete,
    path = "/requests/{request_id}",
    params(
        ("request_id" = Uuid, Path, description = "Leave request ID")
    ),
    responses(
        (status = 200, description = "Leave request deleted"),
        (status = 403, description = "Caller cannot delete this request"),
        (status = 404, description = "Leave request not found")
    ),
    tag = "Leave Requests",
    security(("bearerAuth" = []))
)]
pub async fn delete_leave_request(
    State(pool): State<PgPool>,
    Extension(scope): Extension<ActorScope>,
    Path(request_id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let request = fetch_request(&pool, request_id).await?;

    let allowed = request.requested_by == scope.user_id
        || scope.is_admin()
        || scope.can_review_stream(request.stream);
    if !allowed {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "You cannot delete this request",
            None,
        ));
    }

    sqlx::query("DELETE FROM leave_requests WHERE id = $1")
        .bind(request_id)
        .execute(&pool)
        .await
        .map_err(ApiResponse::<()>::db_error)?;

    Ok(ApiResponse::success(StatusCode::OK, "Leave request deleted", ()))
}

async fn fetch_request(pool: &PgPool, request_id: Uuid) -> Result<LeaveRequest, ApiResponse<()>> {
    sqlx::query_as::<_, LeaveRequest>("SELECT * FROM leave_requests WHERE id = $1")
        .bind(request_id)
        .fetch_optional(pool)
        .await
        .map_err(ApiResponse::<()>::db_error)?
        .ok_or_else(|| {
            ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Leave request not found", None)
        })
}

fn push_scope_filter(qb: &mut QueryBuilder<'_, sqlx::Postgres>, scope: &ActorScope, stream: Option<Stream>) {
    match scope.role {
        Role::Admin => {
            if let Some(stream) = stream {
                qb.push(" AND stream = ").push_bind(stream);
            }
        }
        Role::Pc | Role::Staff => {
            qb.push(" AND stream = ").push_bind(scope.stream);
        }
        Role::Student => {
            qb.push(" AND requested_by = ").push_bind(scope.user_id);
        }
    }
}

fn workflow_error_response(err: WorkflowError) -> ApiResponse<()> {
    match err {
        WorkflowError::NotActionable { .. } => {
            ApiResponse::<()>::error(StatusCode::CONFLICT, "Request already processed", None)
        }
        WorkflowError::NotReviewer(_) | WorkflowError::SubmitterNotPermitted(_) => {
            ApiResponse::<()>::error(StatusCode::FORBIDDEN, err.to_string(), None)
        }
    }
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        create_leave_request,
        list_leave_requests,
        my_leave_requests,
        leave_request_stats,
        get_leave_request,
        review_leave_request,
        delete_leave_request
    ),
    components(schemas(
        LeaveRequest,
        NewLeaveRequest,
        ReviewDecision,
        ReviewAction,
        LeaveStats,
        LeaveStatus,
        Stream
    )),
    tags(
        (name = "Leave Requests", description = "Leave request lifecycle endpoints")
    )
)]
pub struct LeaveDoc;
