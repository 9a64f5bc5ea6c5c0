//! Client for the remote share service
//!
//! A share is a snapshot of the playground (input, query and desired output
//! kind) stored server side under a short id. Oversize snapshots are refused
//! locally before any request is made.

use crate::config::ShareConfig;
use crate::error::{Error, Result};
use crate::types::DocumentKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Body of `POST /shares`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub input_data: String,
    pub input_type: DocumentKind,
    pub query: String,
    pub output_type: DocumentKind,
    pub expiration_time_secs: u64,
}

impl ShareRequest {
    /// Characters counted against the payload limit
    pub fn payload_chars(&self) -> usize {
        self.input_data.chars().count() + self.query.chars().count()
    }
}

/// Response of `POST /shares`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShareCreated {
    pub id: String,
}

/// Snapshot returned by `GET /shares/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedSnapshot {
    pub input_data: String,
    pub input_type: DocumentKind,
    pub query: String,
    pub output_type: DocumentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

pub struct ShareClient {
    client: reqwest::Client,
    base_url: String,
    max_payload_chars: usize,
    expiration_secs: u64,
}

impl ShareClient {
    pub fn new(config: &ShareConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_payload_chars: config.max_payload_chars,
            expiration_secs: config.expiration_secs,
        }
    }

    /// Build a request with the configured expiration
    pub fn request(
        &self,
        input_data: impl Into<String>,
        input_type: DocumentKind,
        query: impl Into<String>,
        output_type: DocumentKind,
    ) -> ShareRequest {
        ShareRequest {
            input_data: input_data.into(),
            input_type,
            query: query.into(),
            output_type,
            expiration_time_secs: self.expiration_secs,
        }
    }

    /// Reject payloads over the configured limit
    pub fn check_size(&self, request: &ShareRequest) -> Result<()> {
        let size = request.payload_chars();
        if size > self.max_payload_chars {
            return Err(Error::SharePayloadTooLarge {
                size,
                max: self.max_payload_chars,
            });
        }
        Ok(())
    }

    /// Create a share and return its id
    pub async fn create(&self, request: &ShareRequest) -> Result<String> {
        self.check_size(request)?;

        let url = format!("{}/shares", self.base_url);
        debug!(%url, chars = request.payload_chars(), "creating share");
        let resp = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(unreachable)?;
        let created: ShareCreated = decode(resp).await?;
        Ok(created.id)
    }

    /// Fetch a previously created share
    pub async fn fetch(&self, id: &str) -> Result<SharedSnapshot> {
        let id = id.trim();
        if id.is_empty() || id.contains('/') {
            return Err(Error::invalid_arguments(format!("invalid share id '{id}'")));
        }

        let url = format!("{}/shares/{}", self.base_url, id);
        debug!(%url, "fetching share");
        let resp = self.client.get(url).send().await.map_err(unreachable)?;
        decode(resp).await
    }
}

fn unreachable(e: reqwest::Error) -> Error {
    Error::ShareUnreachable {
        reason: e.to_string(),
    }
}

async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            body.trim().to_string()
        };
        return Err(Error::ShareRejected {
            status: status.as_u16(),
            message,
        });
    }

    resp.json::<T>().await.map_err(|e| Error::ShareRejected {
        status: status.as_u16(),
        message: format!("invalid response body: {e}"),
    })
}
