use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, warn};

use super::error::ApiError;
use super::types::{AppointmentSummary, ListingQuery};
use crate::credentials::Credentials;

pub const DEFAULT_BASE_URL: &str = "https://sidim.no-ip.net";
pub const DEFAULT_APP_BASE: &str = "/prontuarioeletronico_mariana";

/// Source of the day's appointment listing and per-record report documents.
pub trait ReportSource {
    async fn list_completed(
        &self,
        query: &ListingQuery,
    ) -> Result<Vec<AppointmentSummary>, ApiError>;

    async fn fetch_document(&self, record_id: &str) -> Result<Bytes, ApiError>;
}

/// Auxiliary coded-value lookup, used to pre-warm the CID search server-side.
#[async_trait]
pub trait CodeLookup: Send + Sync {
    async fn lookup_code(&self, query: &str) -> Result<Option<Value>, ApiError>;
}

pub struct SidimClient {
    credentials: Credentials,
    client: Client,
    base_url: String,
    app_base: String,
}

impl SidimClient {
    pub fn new(credentials: Credentials) -> Result<Self, ApiError> {
        Self::with_base_url(
            credentials,
            DEFAULT_BASE_URL.to_string(),
            DEFAULT_APP_BASE.to_string(),
        )
    }

    /// Create a client pointing at a custom host (useful for testing).
    pub fn with_base_url(
        credentials: Credentials,
        base_url: String,
        app_base: String,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            credentials,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_base: app_base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.app_base, path)
    }

    /// Authenticated GET; any non-2xx status becomes [`ApiError::Status`].
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Response, ApiError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(self.credentials.token())
            .header("accept", "*/*")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let url = response.url().to_string();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::status(status.as_u16(), url, &body));
        }
        Ok(response)
    }

    /// List the completed appointments of one day.
    ///
    /// A body that is not JSON at all (a login page, say) or not a JSON array
    /// is treated as an empty listing, and items that fail to parse are
    /// skipped.
    pub async fn list_completed(
        &self,
        query: &ListingQuery,
    ) -> Result<Vec<AppointmentSummary>, ApiError> {
        let url = self.endpoint("/api/atendimento/atendimentos");
        let text = self.get(&url, &query.params()).await?.text().await?;
        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(e) => {
                warn!(date = %query.api_date(), error = %e, "listing response is not JSON");
                return Ok(Vec::new());
            }
        };

        let Value::Array(items) = body else {
            warn!(date = %query.api_date(), "listing response is not an array");
            return Ok(Vec::new());
        };

        let total = items.len();
        let listing: Vec<AppointmentSummary> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<AppointmentSummary>(item) {
                Ok(a) => Some(a),
                Err(e) => {
                    warn!(error = %e, "skipping malformed listing item");
                    None
                }
            })
            .filter(|a| a.is_done(&query.done_marker))
            .collect();

        debug!(total, kept = listing.len(), "listing filtered");
        Ok(listing)
    }

    /// Fetch the SOAP report PDF of one appointment.
    pub async fn fetch_document(&self, record_id: &str) -> Result<Bytes, ApiError> {
        let url = self.endpoint(&format!("/api/report/soap/{record_id}/"));
        let params = [
            ("prontuarioId", String::new()),
            ("assinar", "false".to_string()),
        ];
        let bytes = self.get(&url, &params).await?.bytes().await?;
        Ok(bytes)
    }

    /// Query the CID search endpoint. An unparseable body yields `None`.
    pub async fn lookup_code(&self, query: &str) -> Result<Option<Value>, ApiError> {
        let url = self.endpoint("/api/cid");
        let params = [
            ("pesquisa", query.to_string()),
            ("codigoProcedimento", String::new()),
        ];
        let response = self.get(&url, &params).await?;
        Ok(response.json::<Value>().await.ok())
    }
}

impl ReportSource for SidimClient {
    async fn list_completed(
        &self,
        query: &ListingQuery,
    ) -> Result<Vec<AppointmentSummary>, ApiError> {
        SidimClient::list_completed(self, query).await
    }

    async fn fetch_document(&self, record_id: &str) -> Result<Bytes, ApiError> {
        SidimClient::fetch_document(self, record_id).await
    }
}

#[async_trait]
impl CodeLookup for SidimClient {
    async fn lookup_code(&self, query: &str) -> Result<Option<Value>, ApiError> {
        SidimClient::lookup_code(self, query).await
    }
}
