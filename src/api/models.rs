// API request/response models (DTOs)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope for health and error responses. Data endpoints return their
/// payload bare, matching what existing clients of the price API parse.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Some(Meta::now()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: Some(Meta::now()),
        }
    }
}

/// Metadata included in enveloped responses
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub scrape_running: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Sentinel returned by `/mandi` instead of an empty list.
#[derive(Debug, Serialize, Deserialize)]
pub struct NoDataResponse {
    pub status: String,
}

impl NoDataResponse {
    pub fn new() -> Self {
        Self {
            status: "no_data".to_string(),
        }
    }
}

impl Default for NoDataResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// `region`, or the first release's `state`; `region` wins if both are sent.
#[derive(Debug, Deserialize)]
pub struct MarketsQuery {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl MarketsQuery {
    pub fn region(&self) -> Option<&str> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().map(str::trim).filter(|r| !r.is_empty())
        }
        present(&self.region).or_else(|| present(&self.state))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestAccepted {
    pub message: String,
    pub data: serde_json::Value,
}
