use log::debug;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use super::models::{
    parse_list, unwrap_envelope, HistoryRow, OwnerStats, RacketDetail, RacketItem, StringItem,
};

/// Upstream API failures, each rendering as one human-readable line for the
/// inline error area. Nothing here is retried; the caller decides whether to
/// try again or fall back to manual entry.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

/// Client for the spreadsheet-backed workshop endpoint. Every call is a
/// single GET with an `action` query parameter.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: Client::new(),
        }
    }

    /// Racket identity for a scanned or typed code.
    pub async fn detail(&self, code: &str) -> Result<RacketDetail, ApiError> {
        let raw = self.get("detail", ("kod", code)).await?;
        let detail: RacketDetail = serde_json::from_value(unwrap_envelope(raw, "detail"))
            .map_err(|err| ApiError::Malformed(err.to_string()))?;
        if detail.code.trim().is_empty() {
            return Err(ApiError::Malformed("detail is missing the racket code".into()));
        }
        Ok(detail)
    }

    /// Stringing history for a racket, newest rows first as the sheet keeps
    /// them.
    pub async fn history(&self, code: &str) -> Result<Vec<HistoryRow>, ApiError> {
        let raw = self.get("history", ("kod", code)).await?;
        parse_list(raw, "history").map_err(|err| ApiError::Malformed(err.to_string()))
    }

    pub async fn rackets_by_owner(&self, owner: &str) -> Result<Vec<RacketItem>, ApiError> {
        let raw = self.get("racketsByOwner", ("majitel", owner)).await?;
        parse_list(raw, "rackets").map_err(|err| ApiError::Malformed(err.to_string()))
    }

    pub async fn strings_by_owner(&self, owner: &str) -> Result<Vec<StringItem>, ApiError> {
        let raw = self.get("stringsByOwner", ("majitel", owner)).await?;
        parse_list(raw, "strings").map_err(|err| ApiError::Malformed(err.to_string()))
    }

    pub async fn statistics(&self, owner: &str) -> Result<OwnerStats, ApiError> {
        let raw = self.get("statistics", ("majitel", owner)).await?;
        serde_json::from_value(unwrap_envelope(raw, "statistics"))
            .map_err(|err| ApiError::Malformed(err.to_string()))
    }

    async fn get(&self, action: &str, param: (&str, &str)) -> Result<Value, ApiError> {
        debug!("api call action={action} {}={}", param.0, param.1);
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("action", action), param])
            .send()
            .await
            .map_err(|err| ApiError::Http(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        response
            .json::<Value>()
            .await
            .map_err(|err| ApiError::Malformed(err.to_string()))
    }
}
