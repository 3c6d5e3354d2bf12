use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

use crate::json::JsonResponse;
use crate::upload::UploadedFile;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Request body exceeded the configured JSON size cap
    #[error("body must not be larger than {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// Body is not syntactically valid JSON
    #[error("body contains badly-formed JSON (at character {offset})")]
    MalformedSyntax { offset: usize },

    /// A JSON value could not be stored in the target field
    #[error("{}", wrong_type_message(.field, .offset))]
    WrongType { field: Option<String>, offset: usize },

    /// Body ended in the middle of a JSON value
    #[error("body contains badly-formed JSON")]
    TruncatedBody,

    #[error("body must not be empty")]
    EmptyBody,

    /// Something other than whitespace followed the first JSON value
    #[error("body must contain only one JSON value")]
    MultipleValues,

    #[error("body contains unknown key \"{field}\"")]
    UnknownField { field: String },

    /// The target type refused the decoded value (missing fields, custom validation)
    #[error("error unmarshalling JSON: {message}")]
    InvalidTarget { message: String },

    /// Request body could not be read from the connection
    #[error("failed to read request body: {message}")]
    UnreadableBody { message: String },

    /// Uploaded content exceeded the configured maximum upload size
    #[error("the uploaded file is too big (limit is {limit} bytes)")]
    FileTooLarge { limit: u64 },

    /// Sniffed content type is not in the allow-list
    #[error("the uploaded file type is not permitted")]
    UnsupportedFileType { content_type: String },

    #[error("failed to parse multipart data: {message}")]
    MalformedMultipart { message: String },

    #[error("no file was uploaded")]
    NoFileUploaded,

    #[error("empty string not permitted")]
    EmptyInput,

    #[error("after removing characters slug is 0 length")]
    EmptyResult,

    #[error("invalid {name} header value")]
    InvalidHeader { name: &'static str },

    #[error("invalid URL {url}: {source}")]
    InvalidUrl { url: String, source: url::ParseError },

    /// Filesystem operation failed (permissions, missing parent, disk full)
    #[error(transparent)]
    Filesystem(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Remote endpoint could not be reached
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

fn wrong_type_message(field: &Option<String>, offset: &usize) -> String {
    match field {
        Some(field) => format!("body contains incorrect JSON type for field \"{field}\""),
        None => format!("body contains incorrect JSON type (at character {offset})"),
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BodyTooLarge { .. } | Error::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::UnsupportedFileType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::MalformedSyntax { .. }
            | Error::WrongType { .. }
            | Error::TruncatedBody
            | Error::EmptyBody
            | Error::MultipleValues
            | Error::UnknownField { .. }
            | Error::InvalidTarget { .. }
            | Error::UnreadableBody { .. }
            | Error::MalformedMultipart { .. }
            | Error::NoFileUploaded
            | Error::EmptyInput
            | Error::EmptyResult
            | Error::InvalidHeader { .. }
            | Error::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
            Error::Filesystem(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            Error::Filesystem(_) | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Filesystem(e) if e.kind() == std::io::ErrorKind::NotFound => "File not found".to_string(),
            Error::Filesystem(_) | Error::Serialization(_) => "Internal server error".to_string(),
            Error::Transport(_) => "Failed to reach remote endpoint".to_string(),
            other => other.to_string(),
        }
    }

    fn log(&self) {
        match self {
            Error::Filesystem(_) | Error::Serialization(_) => {
                tracing::error!("Internal toolkit error: {:#}", self);
            }
            Error::Transport(_) => {
                tracing::warn!("Remote push failed: {}", self);
            }
            Error::UnsupportedFileType { content_type } => {
                tracing::info!(content_type = %content_type, "Rejected upload: {}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        (status, axum::Json(JsonResponse::<()>::error(self.user_message()))).into_response()
    }
}

/// A failed upload batch: the files still on disk from this request, handed back alongside
/// the first error. Empty when the size limit was exceeded.
#[derive(ThisError, Debug)]
#[error("{error}")]
pub struct UploadFailure {
    pub uploaded: Vec<UploadedFile>,
    #[source]
    pub error: Error,
}

impl From<UploadFailure> for Error {
    fn from(failure: UploadFailure) -> Self {
        failure.error
    }
}

impl IntoResponse for UploadFailure {
    fn into_response(self) -> Response {
        if self.uploaded.is_empty() {
            return self.error.into_response();
        }

        self.error.log();
        tracing::warn!(
            kept = self.uploaded.len(),
            "Upload aborted after earlier files were stored; they are left on disk"
        );

        let status = self.error.status_code();
        let body = JsonResponse {
            error: true,
            message: self.error.user_message(),
            data: Some(self.uploaded),
        };
        (status, axum::Json(body)).into_response()
    }
}

/// Type alias for toolkit operation results
pub type Result<T> = std::result::Result<T, Error>;
