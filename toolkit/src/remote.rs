use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use url::Url;

use crate::Toolkit;
use crate::errors::{Error, Result};

impl Toolkit {
    /// POSTs `data` as JSON to `url` and hands back the raw response with its status.
    ///
    /// Uses `client` when given, otherwise a default `reqwest::Client`. Timeouts and retries
    /// are whatever the client provides; the toolkit adds none.
    pub async fn push_json_to_remote<T: Serialize + ?Sized>(
        &self,
        url: &str,
        data: &T,
        client: Option<&reqwest::Client>,
    ) -> Result<(reqwest::Response, StatusCode)> {
        let payload = serde_json::to_vec(data)?;
        let url = Url::parse(url).map_err(|source| Error::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let default_client;
        let client = match client {
            Some(client) => client,
            None => {
                default_client = reqwest::Client::new();
                &default_client
            }
        };

        tracing::debug!(url = %url, bytes = payload.len(), "Pushing JSON to remote");

        let response = client
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = %status, "Remote responded");

        Ok((response, status))
    }
}
