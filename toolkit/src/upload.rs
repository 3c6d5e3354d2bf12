//! Multipart upload handling.
//!
//! Every file part of a `multipart/form-data` request is sniffed, checked against the
//! allow-list and streamed straight to disk. Parts without a file name are ordinary form
//! values and are skipped.
//!
//! Files are written one after another. When a later part fails validation (disallowed type,
//! I/O) the batch stops, and the files already stored are returned with the error inside an
//! [`UploadFailure`]. They are *not* removed; cleaning them up is the caller's call.
//! Exceeding the size limit rejects the whole request instead: every file written by the call
//! is removed and `uploaded` comes back empty.
//! With renaming off the client's file name is reused as-is, so uploads can overwrite each
//! other.

use std::path::Path;

use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use axum::http::{HeaderMap, StatusCode, header};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::Toolkit;
use crate::errors::{Error, Result, UploadFailure};
use crate::sniff::{SNIFF_LEN, detect_content_type};

/// Length of the random stem used for renamed uploads
const RENAMED_STEM_LEN: usize = 25;

/// A stored upload. Only built once every byte has reached the destination file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Name of the file inside the upload directory
    pub new_file_name: String,
    /// Name the client sent, reduced to its final path component
    pub original_file_name: String,
    pub file_size: u64,
}

impl Toolkit {
    /// Stores every file part of `multipart` under `upload_dir`.
    ///
    /// `rename` defaults to `true`: stored names become a random identifier plus the original
    /// extension. With `Some(false)` the original name is kept.
    pub async fn upload_files(
        &self,
        mut multipart: Multipart,
        upload_dir: impl AsRef<Path>,
        rename: Option<bool>,
    ) -> std::result::Result<Vec<UploadedFile>, UploadFailure> {
        let upload_dir = upload_dir.as_ref();
        let rename = rename.unwrap_or(true);
        let mut uploaded = Vec::new();

        if let Err(error) = self.create_dir_if_not_exists(upload_dir).await {
            return Err(self.abort(upload_dir, uploaded, error).await);
        }

        // Bytes received across all file parts of this request
        let mut total_size = 0u64;

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    let error = self.multipart_error(e);
                    return Err(self.abort(upload_dir, uploaded, error).await);
                }
            };

            let Some(original_file_name) = field.file_name().and_then(base_name) else {
                tracing::trace!(field = ?field.name(), "Skipping non-file multipart field");
                continue;
            };

            match self
                .store_field(field, upload_dir, original_file_name, rename, &mut total_size)
                .await
            {
                Ok(file) => uploaded.push(file),
                Err(error) => return Err(self.abort(upload_dir, uploaded, error).await),
            }
        }

        Ok(uploaded)
    }

    /// Single-file variant of [`Toolkit::upload_files`]: returns the first stored file.
    pub async fn upload_one_file(&self, multipart: Multipart, upload_dir: impl AsRef<Path>, rename: Option<bool>) -> Result<UploadedFile> {
        let files = self.upload_files(multipart, upload_dir, rename).await?;
        files.into_iter().next().ok_or(Error::NoFileUploaded)
    }

    /// Rejects a request whose declared `Content-Length` already exceeds the upload limit,
    /// before any part is read.
    pub fn check_upload_length(&self, headers: &HeaderMap) -> Result<()> {
        let limit = self.config.max_file_size();
        let declared = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        match declared {
            Some(length) if length > limit => {
                tracing::warn!(length, limit, "Upload rejected by declared length");
                Err(Error::FileTooLarge { limit })
            }
            _ => Ok(()),
        }
    }

    /// Builds the failure for a stopped batch. A size-limit breach rejects the request as a
    /// whole, so the files stored so far are removed.
    async fn abort(&self, upload_dir: &Path, uploaded: Vec<UploadedFile>, error: Error) -> UploadFailure {
        if !matches!(error, Error::FileTooLarge { .. }) {
            return UploadFailure { uploaded, error };
        }

        for file in &uploaded {
            let path = upload_dir.join(&file.new_file_name);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove upload after size limit breach");
            }
        }

        UploadFailure {
            uploaded: Vec::new(),
            error,
        }
    }

    async fn store_field(
        &self,
        mut field: Field<'_>,
        upload_dir: &Path,
        original_file_name: String,
        rename: bool,
        total_size: &mut u64,
    ) -> Result<UploadedFile> {
        // Gather the sniffing sample before anything touches the disk
        let mut head = Vec::with_capacity(SNIFF_LEN);
        let mut exhausted = false;
        while head.len() < SNIFF_LEN {
            match field.chunk().await.map_err(|e| self.multipart_error(e))? {
                Some(chunk) => {
                    self.track_size(total_size, chunk.len())?;
                    head.extend_from_slice(&chunk);
                }
                None => {
                    exhausted = true;
                    break;
                }
            }
        }

        let content_type = detect_content_type(&head);
        if !self.config.is_allowed_type(content_type) {
            return Err(Error::UnsupportedFileType {
                content_type: content_type.to_string(),
            });
        }

        let new_file_name = if rename {
            format!("{}{}", self.random_string(RENAMED_STEM_LEN), extension(&original_file_name))
        } else {
            original_file_name.clone()
        };

        let path = upload_dir.join(&new_file_name);
        tracing::info!(
            original = %original_file_name,
            stored = %new_file_name,
            content_type = content_type,
            "Storing uploaded file"
        );

        let mut file = tokio::fs::File::create(&path).await?;
        let written = async {
            file.write_all(&head).await?;
            let mut file_size = head.len() as u64;

            if !exhausted {
                while let Some(chunk) = field.chunk().await.map_err(|e| self.multipart_error(e))? {
                    self.track_size(total_size, chunk.len())?;
                    file.write_all(&chunk).await?;
                    file_size += chunk.len() as u64;
                }
            }

            file.flush().await?;
            Ok::<_, Error>(file_size)
        }
        .await;

        match written {
            Ok(file_size) => {
                tracing::debug!(stored = %new_file_name, file_size, "Upload stored");
                Ok(UploadedFile {
                    new_file_name,
                    original_file_name,
                    file_size,
                })
            }
            Err(e) => {
                // Remove the incomplete file; earlier files in the batch stay
                drop(file);
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %remove_err, "Failed to remove incomplete upload");
                }
                Err(e)
            }
        }
    }

    fn track_size(&self, total_size: &mut u64, chunk_len: usize) -> Result<()> {
        *total_size += chunk_len as u64;
        let limit = self.config.max_file_size();
        if *total_size > limit {
            tracing::warn!(total_size = *total_size, limit, "Upload size limit exceeded, aborting");
            return Err(Error::FileTooLarge { limit });
        }
        Ok(())
    }

    fn multipart_error(&self, e: MultipartError) -> Error {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Error::FileTooLarge {
                limit: self.config.max_file_size(),
            }
        } else {
            Error::MalformedMultipart { message: e.body_text() }
        }
    }
}

/// Final path component of a client-supplied name; `None` when nothing usable remains.
fn base_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    match base {
        "" | "." | ".." => None,
        base => Some(base.to_string()),
    }
}

/// Suffix from the last dot on (`.bashrc` keeps all of itself), or empty
fn extension(name: &str) -> &str {
    name.rfind('.').map(|i| &name[i..]).unwrap_or_default()
}
