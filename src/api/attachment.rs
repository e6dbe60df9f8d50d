// src/api/attachment.rs
//
// Local-disk attachment storage. An upload must fully succeed before the
// client receives a URL to put on a submission; a failed upload therefore
// aborts the whole apply flow instead of producing a request that references
// a missing file.
use axum::{
    extract::{Extension, Multipart, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::middleware::auth::ActorScope;
use crate::utils::api_response::ApiResponse;

#[derive(Serialize, ToSchema)]
pub struct AttachmentUpload {
    /// Stored verbatim as `attachment_url` on the submission
    pub url: String,
}

/// Keep only characters that are safe in a stored filename.
fn sanitize_filename(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

#[utoipa::path(
    post,
    path = "/attachments",
    responses(
        (status = 201, description = "Attachment stored", body = AttachmentUpload),
        (status = 400, description = "No file uploaded"),
        (status = 500, description = "Failed to store attachment")
    ),
    tag = "Attachments",
    security(("bearerAuth" = []))
)]
pub async fn upload_attachment(
    Extension(scope): Extension<ActorScope>,
    mut multipart: Multipart,
) -> Result<ApiResponse<AttachmentUpload>, ApiResponse<()>> {
    let owner_dir = Config::get()
        .attachment_storage_path
        .join(scope.user_id.to_string());
    fs::create_dir_all(&owner_dir).await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create attachment directory",
            Some(json!({ "message": e.to_string() })),
        )
    })?;

    let mut stored_name: Option<String> = None;
    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Failed to process multipart data",
            Some(json!({ "message": e.to_string() })),
        )
    })? {
        let Some(filename) = field.file_name().map(sanitize_filename) else {
            continue;
        };
        if filename.is_empty() {
            continue;
        }

        let name = format!("{}_{}", Utc::now().timestamp_millis(), filename);
        let file_path = owner_dir.join(&name);
        let mut file = fs::File::create(&file_path).await.map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create attachment file",
                Some(json!({ "message": e.to_string() })),
            )
        })?;

        while let Some(chunk) = field.chunk().await.map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read attachment data",
                Some(json!({ "message": e.to_string() })),
            )
        })? {
            if let Err(e) = file.write_all(&chunk).await {
                // Half-written files must never become URLs.
                fs::remove_file(&file_path).await.ok();
                return Err(ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to write attachment file",
                    Some(json!({ "message": e.to_string() })),
                ));
            }
        }

        stored_name = Some(name);
        break; // one attachment per submission
    }

    let Some(stored_name) = stored_name else {
        return Err(ApiResponse::<()>::error(StatusCode::BAD_REQUEST, "No file uploaded", None));
    };

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Attachment stored",
        AttachmentUpload {
            url: format!("/attachments/{}/{}", scope.user_id, stored_name),
        },
    ))
}

#[utoipa::path(
    get,
    path = "/attachments/{owner_id}/{filename}",
    params(
        ("owner_id" = Uuid, Path, description = "Uploader's user ID"),
        ("filename" = String, Path, description = "Stored file name"),
    ),
    responses(
        (status = 200, description = "Attachment retrieved"),
        (status = 404, description = "Attachment not found")
    ),
    tag = "Attachments",
    security(("bearerAuth" = []))
)]
pub async fn download_attachment(
    Path((owner_id, filename)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, StatusCode> {
    if filename.contains('/') || filename.contains("..") {
        return Err(StatusCode::NOT_FOUND);
    }

    let file_path = Config::get()
        .attachment_storage_path
        .join(owner_id.to_string())
        .join(&filename);
    if fs::metadata(&file_path).await.is_err() {
        return Err(StatusCode::NOT_FOUND);
    }

    let file = fs::File::open(&file_path)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let stream = ReaderStream::new(file);
    Ok(axum::response::Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/octet-stream")
        .body(axum::body::Body::from_stream(stream))
        .unwrap())
}

pub fn attachment_routes() -> Router<PgPool> {
    Router::new()
        .route("/attachments", post(upload_attachment))
        .route("/attachments/{owner_id}/{filename}", get(download_attachment))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(upload_attachment, download_attachment),
    components(schemas(AttachmentUpload)),
    tags(
        (name = "Attachments", description = "Leave request attachment storage")
    )
)]
pub struct AttachmentDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "....etcpasswd");
        assert_eq!(sanitize_filename("medical note.pdf"), "medicalnote.pdf");
        assert_eq!(sanitize_filename("scan_01-final.PNG"), "scan_01-final.PNG");
    }
}
