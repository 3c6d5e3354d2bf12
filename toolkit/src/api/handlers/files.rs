use axum::{
    extract::{Multipart, Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::api::models::files::{DownloadQuery, UploadQuery};
use crate::errors::{Error, Result};
use crate::json::JsonResponse;

/// Store every file part of the request in the upload directory.
pub async fn upload_files(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    if let Err(e) = state.toolkit.check_upload_length(&headers) {
        return e.into_response();
    }

    let files = match state
        .toolkit
        .upload_files(multipart, &state.config.upload_dir, query.rename)
        .await
    {
        Ok(files) => files,
        Err(failure) => return failure.into_response(),
    };

    tracing::info!(count = files.len(), "Stored uploaded files");

    let message = format!("{} file(s) uploaded", files.len());
    state
        .toolkit
        .write_json(StatusCode::CREATED, &JsonResponse::ok(message, files), None)
        .into_response()
}

/// Store a single uploaded file.
pub async fn upload_file(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response> {
    state.toolkit.check_upload_length(&headers)?;

    let file = state
        .toolkit
        .upload_one_file(multipart, &state.config.upload_dir, query.rename)
        .await?;

    state
        .toolkit
        .write_json(StatusCode::CREATED, &JsonResponse::ok("file uploaded", file), None)
}

/// Serve a file from the download directory as an attachment.
pub async fn download_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<DownloadQuery>,
    req: Request,
) -> Result<Response> {
    // Only plain names inside the download directory
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::Filesystem(std::io::ErrorKind::NotFound.into()));
    }

    let display_name = query.display_name.unwrap_or_else(|| name.clone());
    state
        .toolkit
        .download_static_file(req, &state.config.download_dir, &name, &display_name)
        .await
}
