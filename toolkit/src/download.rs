use std::path::{Component, Path};

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderValue, header};
use axum::response::Response;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::Toolkit;
use crate::errors::{Error, Result};

impl Toolkit {
    /// Serves `dir/file` as an attachment named `display_name`.
    ///
    /// Length, content type (from the extension), ranges and conditional requests are handled
    /// by `ServeFile`; the `Content-Disposition: attachment` header makes clients save the
    /// response instead of rendering it. A missing file yields 404 with the same header.
    ///
    /// `file` is resolved inside `dir`: absolute paths and `..` segments are refused with a
    /// not-found error.
    pub async fn download_static_file(&self, req: Request, dir: impl AsRef<Path>, file: &str, display_name: &str) -> Result<Response> {
        if !is_contained(file) {
            tracing::warn!(file, "Refusing download outside the base directory");
            return Err(Error::Filesystem(std::io::ErrorKind::NotFound.into()));
        }

        let path = dir.as_ref().join(file);
        let disposition = attachment_disposition(display_name)?;

        let response = match ServeFile::new(&path).oneshot(req).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        tracing::debug!(path = %path.display(), status = %response.status(), display_name, "Serving download");

        let mut response = response.map(Body::new);
        response.headers_mut().insert(header::CONTENT_DISPOSITION, disposition);
        Ok(response)
    }
}

/// Only plain (and `.`) components, so the joined path cannot leave its base
fn is_contained(file: &str) -> bool {
    let path = Path::new(file);
    path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn attachment_disposition(display_name: &str) -> Result<HeaderValue> {
    let escaped = display_name.replace('\\', "\\\\").replace('"', "\\\"");
    HeaderValue::from_str(&format!("attachment; filename=\"{escaped}\"")).map_err(|_| Error::InvalidHeader {
        name: "Content-Disposition",
    })
}
