// # Cloudflare Zone Source
//
// Lists the primary zone through the Cloudflare API v4.
//
// ## Responsibilities
//
// - One `GET /zones/:zone_id/dns_records?per_page=5000` per fetch
// - Classify failures (5xx/429 and transport errors are transient)
// - Never mutate the zone; Cloudflare is read-only for zonesync
//
// Retries, normalization and scheduling belong to the engine.
//
// ## Security Requirements
//
// - The API token never appears in logs or `Debug` output
// - An empty token or zone id is rejected at construction time
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records`

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use zonesync_core::config::SourceConfig;
use zonesync_core::record::SourceRecord;
use zonesync_core::traits::ZoneSource;
use zonesync_core::{Error, Result};

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records requested per listing; larger zones are truncated
pub const PAGE_SIZE: usize = 5000;

/// Longest response excerpt written to debug logs
const LOG_EXCERPT_LEN: usize = 512;

const PROVIDER: &str = "cloudflare";

/// Cloudflare zone source
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
pub struct CloudflareSource {
    /// ⚠️ NEVER log this value
    api_token: String,
    zone_id: String,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudflareSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareSource")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareSource {
    /// Create a source for `zone_id`, authenticated with a bearer token
    /// carrying Zone:DNS:Read.
    pub fn new(api_token: impl Into<String>, zone_id: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        let zone_id = zone_id.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }
        if zone_id.is_empty() {
            return Err(Error::config("Cloudflare zone ID cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_token,
            zone_id,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        match config {
            SourceConfig::Cloudflare { api_token, zone_id } => Self::new(api_token.clone(), zone_id.clone()),
        }
    }

    /// Point at another API root (a proxy or a local stub)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, self.zone_id)
    }
}

#[async_trait]
impl ZoneSource for CloudflareSource {
    /// ```http
    /// GET /zones/:zone_id/dns_records?per_page=5000
    /// Authorization: Bearer <token>
    /// ```
    async fn fetch_all(&self) -> Result<Vec<SourceRecord>> {
        debug!("Fetching Cloudflare records for zone {}", self.zone_id);

        let response = self
            .client
            .get(self.records_url())
            .query(&[("per_page", PAGE_SIZE)])
            .bearer_auth(&self.api_token)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| Error::transport(PROVIDER, format!("HTTP request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(PROVIDER, format!("Failed to read response: {e}")))?;
        debug!("Cloudflare responded {}: {}", status, excerpt(&body));

        let records = parse_records_response(status, &body)?;
        debug!("Fetched {} Cloudflare record(s)", records.len());
        Ok(records)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    #[serde(default)]
    result: Option<Vec<SourceRecord>>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

fn first_error(errors: &[ApiMessage]) -> Option<String> {
    errors.first().map(|e| match e.code {
        Some(code) => format!("{} (code {})", e.message, code),
        None => e.message.clone(),
    })
}

/// Turn a `dns_records` listing response into records.
///
/// Non-2xx statuses are classified by [`Error::from_status`]. A 2xx body with
/// `success: false` is a permanent failure. A listing shorter than the
/// reported total is returned as-is with a warning.
pub fn parse_records_response(status: u16, body: &str) -> Result<Vec<SourceRecord>> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| first_error(&b.errors))
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(Error::from_status(PROVIDER, status, format!("Cloudflare API error: {message}")));
    }

    let parsed: ListResponse = serde_json::from_str(body)
        .map_err(|e| Error::malformed(PROVIDER, format!("Failed to parse record listing: {e}")))?;

    if !parsed.success {
        let message = first_error(&parsed.errors).unwrap_or_else(|| "request was not successful".to_string());
        return Err(Error::rejected(
            PROVIDER,
            format!("Cloudflare API error: {message}"),
            Some(message),
        ));
    }

    let records = parsed
        .result
        .ok_or_else(|| Error::malformed(PROVIDER, "Invalid response format: result is missing"))?;

    if let Some(total) = parsed.result_info.and_then(|info| info.total_count)
        && total > records.len()
    {
        warn!(
            "Cloudflare listing truncated: received {} of {} record(s) (page size {})",
            records.len(),
            total,
            PAGE_SIZE
        );
    }
    Ok(records)
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(LOG_EXCERPT_LEN) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}
