use serde::Deserialize;

/// Query parameters for multipart uploads
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    /// Store under a random name (default) or keep the client's file name
    pub rename: Option<bool>,
}

/// Query parameters for downloads
#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    /// Name offered to the client; defaults to the stored name
    pub display_name: Option<String>,
}
