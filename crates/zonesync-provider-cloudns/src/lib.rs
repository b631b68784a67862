// # ClouDNS Zone Target
//
// Lists and mutates the secondary zone through the ClouDNS HTTP API.
//
// ## Responsibilities
//
// - `records.json` for the listing (one page of 100 rows)
// - `add-record.json`, `modify-record.json` and `delete-record.json` as
//   form-encoded POSTs
// - Classify failures: non-2xx by status, `"status": "Failed"` bodies as
//   permanent errors carrying the provider's `statusDescription`
//
// Retries and planning belong to the engine. This adapter makes exactly one
// request per call.
//
// ## Security Requirements
//
// - The auth password never appears in logs or `Debug` output
// - Request URLs carry credentials and are never logged
//
// ## API Reference
//
// - https://www.cloudns.net/wiki/article/42/ (DNS API)

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use zonesync_core::config::{ClouDnsAuth, TargetConfig};
use zonesync_core::normalize::relative_host;
use zonesync_core::record::{CanonicalRecord, ProviderRef, TargetRecord, TypeFields};
use zonesync_core::traits::ZoneTarget;
use zonesync_core::{Error, Result};

/// ClouDNS DNS API base URL
const CLOUDNS_API_BASE: &str = "https://api.cloudns.net/dns";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Rows requested from `records.json`
pub const ROWS_PER_PAGE: usize = 100;

const PROVIDER: &str = "cloudns";

/// Form parameters for one request, in send order
pub type FormParams = Vec<(&'static str, String)>;

/// ClouDNS zone target
///
/// # Security
///
/// The Debug implementation does NOT expose the auth password.
pub struct ClouDnsTarget {
    auth: ClouDnsAuth,
    /// ⚠️ NEVER log this value
    auth_password: String,
    domain_name: String,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for ClouDnsTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClouDnsTarget")
            .field("auth", &self.auth)
            .field("auth_password", &"<REDACTED>")
            .field("domain_name", &self.domain_name)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ClouDnsTarget {
    pub fn new(auth: ClouDnsAuth, auth_password: impl Into<String>, domain_name: impl Into<String>) -> Result<Self> {
        let auth_password = auth_password.into();
        let domain_name = domain_name.into().trim_end_matches('.').to_lowercase();
        if auth.param().1.is_empty() {
            return Err(Error::config("ClouDNS auth ID cannot be empty"));
        }
        if auth_password.is_empty() {
            return Err(Error::config("ClouDNS auth password cannot be empty"));
        }
        if domain_name.is_empty() {
            return Err(Error::config("ClouDNS domain name cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            auth,
            auth_password,
            domain_name,
            base_url: CLOUDNS_API_BASE.to_string(),
            client,
        })
    }

    pub fn from_config(config: &TargetConfig) -> Result<Self> {
        match config {
            TargetConfig::Cloudns {
                auth,
                auth_password,
                domain_name,
            } => Self::new(auth.clone(), auth_password.clone(), domain_name.clone()),
        }
    }

    /// Point at another API root (a proxy or a local stub)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Credentials and zone, sent with every request
    fn auth_params(&self) -> FormParams {
        let (key, id) = self.auth.param();
        vec![
            (key, id.to_string()),
            ("auth-password", self.auth_password.clone()),
            ("domain-name", self.domain_name.clone()),
        ]
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    async fn post(&self, endpoint: &str, params: FormParams) -> Result<StatusResponse> {
        let response = self
            .client
            .post(self.endpoint(endpoint))
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::transport(PROVIDER, format!("{endpoint} request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(PROVIDER, format!("Failed to read {endpoint} response: {e}")))?;
        parse_status_response(status, &body)
    }
}

/// Record fields for `add-record.json` and `modify-record.json`.
///
/// `host` is relative to `zone` (`@` for the apex). Per-type fields follow
/// the record's [`TypeFields`] and use the same column names the listing
/// returns, so a written record reads back unchanged.
pub fn record_params(record: &CanonicalRecord, zone: &str) -> FormParams {
    let mut params: FormParams = vec![
        ("host", relative_host(record.name(), zone)),
        ("record", record.content().to_string()),
        ("ttl", record.ttl().to_string()),
    ];

    match record.fields() {
        TypeFields::None => {}
        TypeFields::Mx { priority } => params.push(("priority", priority.to_string())),
        TypeFields::Srv { priority, weight, port } => {
            params.push(("priority", priority.to_string()));
            params.push(("weight", weight.to_string()));
            params.push(("port", port.to_string()));
        }
        TypeFields::Caa { flags, tag } => {
            params.push(("caa_flag", flags.to_string()));
            params.push(("caa_type", tag.clone()));
            params.push(("caa_value", record.content().to_string()));
        }
        TypeFields::Naptr {
            order,
            preference,
            flags,
            service,
            regexp,
        } => {
            params.push(("order", order.to_string()));
            params.push(("pref", preference.to_string()));
            params.push(("flag", flags.clone()));
            params.push(("params", service.clone()));
            params.push(("regexp", regexp.clone()));
        }
    }
    params
}

/// Body of every mutating endpoint
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_description: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl StatusResponse {
    /// Id assigned by `add-record.json`
    fn record_id(&self) -> Option<String> {
        match self.data.as_ref()?.get("id")? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

/// Classify a mutating endpoint's response.
///
/// Anything but `"status": "Success"` in a 2xx body is a permanent failure.
pub fn parse_status_response(status: u16, body: &str) -> Result<StatusResponse> {
    if !(200..300).contains(&status) {
        let description = serde_json::from_str::<StatusResponse>(body)
            .ok()
            .and_then(|r| r.status_description)
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(Error::from_status(PROVIDER, status, format!("ClouDNS API error: {description}")));
    }

    let parsed: StatusResponse = serde_json::from_str(body)
        .map_err(|e| Error::malformed(PROVIDER, format!("Failed to parse response: {e}")))?;
    if parsed.status != "Success" {
        let description = parsed
            .status_description
            .clone()
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(Error::rejected(
            PROVIDER,
            format!("ClouDNS API error: {description}"),
            Some(description),
        ));
    }
    Ok(parsed)
}

/// Turn a `records.json` response into records.
///
/// ClouDNS answers with an object keyed by record id, an empty array for an
/// empty zone, or a `{"status": "Failed", ...}` object.
pub fn parse_records_response(status: u16, body: &str) -> Result<Vec<TargetRecord>> {
    if !(200..300).contains(&status) {
        // Reuse the status classification of the mutating endpoints
        return parse_status_response(status, body).map(|_| Vec::new());
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::malformed(PROVIDER, format!("Failed to parse record listing: {e}")))?;

    let rows: Vec<Value> = match value {
        Value::Array(rows) => rows,
        Value::Object(map) => {
            if map.get("status").and_then(Value::as_str) == Some("Failed") {
                let description = map
                    .get("statusDescription")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                return Err(Error::rejected(
                    PROVIDER,
                    format!("ClouDNS API error: {description}"),
                    Some(description),
                ));
            }
            map.into_iter().map(|(_, row)| row).collect()
        }
        other => {
            return Err(Error::malformed(
                PROVIDER,
                format!("Invalid response format: expected object or array, got {other}"),
            ));
        }
    };

    rows.into_iter()
        .map(|row| {
            serde_json::from_value::<TargetRecord>(row)
                .map_err(|e| Error::malformed(PROVIDER, format!("Invalid record in listing: {e}")))
        })
        .collect()
}

/// Handle for a record `add-record.json` reported as created.
///
/// The record exists even when the response omits its id; the next listing
/// supplies the id.
fn created_ref(response: &StatusResponse, record: &CanonicalRecord) -> ProviderRef {
    match response.record_id() {
        Some(id) => {
            info!("Added ClouDNS record {} (id {})", record.identity(), id);
            ProviderRef::new(id)
        }
        None => {
            warn!(
                "Added ClouDNS record {} but the response carried no record id",
                record.identity()
            );
            ProviderRef::unassigned()
        }
    }
}

#[async_trait]
impl ZoneTarget for ClouDnsTarget {
    /// ```http
    /// GET /records.json?auth-id=..&auth-password=..&domain-name=..&rows-per-page=100
    /// ```
    async fn fetch_all(&self) -> Result<Vec<TargetRecord>> {
        debug!("Fetching ClouDNS records for {}", self.domain_name);

        let mut query = self.auth_params();
        query.push(("page", "1".to_string()));
        query.push(("rows-per-page", ROWS_PER_PAGE.to_string()));

        let response = self
            .client
            .get(self.endpoint("records.json"))
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::transport(PROVIDER, format!("records.json request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(PROVIDER, format!("Failed to read records.json response: {e}")))?;

        let records = parse_records_response(status, &body)?;
        if records.len() >= ROWS_PER_PAGE {
            warn!(
                "ClouDNS listing for {} may be truncated at {} rows",
                self.domain_name, ROWS_PER_PAGE
            );
        }
        debug!("Fetched {} ClouDNS record(s)", records.len());
        Ok(records)
    }

    async fn add(&self, record: &CanonicalRecord) -> Result<ProviderRef> {
        let mut params = self.auth_params();
        params.push(("record-type", record.record_type().to_string()));
        params.extend(record_params(record, &self.domain_name));

        let response = self.post("add-record.json", params).await?;
        Ok(created_ref(&response, record))
    }

    async fn update(&self, target: &ProviderRef, record: &CanonicalRecord) -> Result<()> {
        let mut params = self.auth_params();
        params.push(("record-id", target.id.clone()));
        params.extend(record_params(record, &self.domain_name));

        self.post("modify-record.json", params).await?;
        info!("Updated ClouDNS record {} (id {})", record.identity(), target.id);
        Ok(())
    }

    async fn delete(&self, target: &ProviderRef) -> Result<()> {
        let mut params = self.auth_params();
        params.push(("record-id", target.id.clone()));

        self.post("delete-record.json", params).await?;
        info!("Deleted ClouDNS record id {}", target.id);
        Ok(())
    }

    fn zone_name(&self) -> &str {
        &self.domain_name
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
