//! Sanity HTTP API client acting as the document store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::document_store::{
    CandidateQuery, CommitReceipt, DocumentPatch, DocumentStore, FeaturedCandidate, StoreError,
};

const DEFAULT_API_VERSION: &str = "2024-01-01";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanityConfig {
    pub project_id: String,
    pub dataset: String,
    pub api_version: String,
    pub token: Option<String>,
    /// Overrides `https://<project_id>.api.sanity.io`
    pub api_host: Option<String>,
}

impl SanityConfig {
    pub fn new(project_id: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset: dataset.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            token: None,
            api_host: None,
        }
    }

    fn base_url(&self) -> String {
        let host = self
            .api_host
            .clone()
            .unwrap_or_else(|| format!("https://{}.api.sanity.io", self.project_id));
        let version = self.api_version.trim_start_matches('v');
        format!("{}/v{}", host.trim_end_matches('/'), version)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct SanityCandidate {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(rename = "_rev")]
    revision: Option<String>,
}

impl From<SanityCandidate> for FeaturedCandidate {
    fn from(doc: SanityCandidate) -> Self {
        let published_at = doc.published_at.as_deref().and_then(|raw| {
            let parsed = parse_published_at(raw);
            if parsed.is_none() {
                warn!(document_id = %doc.id, published_at = %raw, "Unparseable publishedAt, treating as oldest");
            }
            parsed
        });
        Self {
            id: doc.id,
            published_at,
            revision: doc.revision,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MutateResponse {
    #[serde(rename = "transactionId")]
    transaction_id: String,
    #[serde(default)]
    results: Vec<MutateResult>,
}

#[derive(Debug, Deserialize)]
struct MutateResult {
    id: String,
    #[serde(default)]
    operation: Option<String>,
}

/// Accepts full datetimes and plain `YYYY-MM-DD` dates (midnight UTC)
pub fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}

/// GROQ for [`CandidateQuery`]. Parameters are bound separately.
fn build_groq(query: &CandidateQuery) -> String {
    let mut filter = String::from("_type == $collection && isFeatured == true");
    if query.exclude_id.is_some() {
        filter.push_str(" && _id != $excludeId");
    }
    let mut groq = format!(
        "*[{}] | order(publishedAt asc, _id asc) {{ _id, publishedAt, _rev }}",
        filter
    );
    if let Some(limit) = query.limit {
        groq.push_str(&format!(" [0...{}]", limit));
    }
    groq
}

/// Query-string pairs; parameter values are JSON encoded as the API expects
fn query_params(query: &CandidateQuery) -> Vec<(String, String)> {
    let mut params = vec![
        ("query".to_string(), build_groq(query)),
        (
            "$collection".to_string(),
            serde_json::Value::String(query.collection.clone()).to_string(),
        ),
    ];
    if let Some(exclude_id) = &query.exclude_id {
        params.push((
            "$excludeId".to_string(),
            serde_json::Value::String(exclude_id.clone()).to_string(),
        ));
    }
    params
}

fn mutation_body(patch: &DocumentPatch) -> serde_json::Value {
    let mut set = serde_json::Map::new();
    set.insert(patch.set.field().to_string(), patch.set.value());
    let mut body = json!({
        "id": patch.id,
        "set": set,
    });
    if let Some(revision) = &patch.if_revision {
        body["ifRevisionID"] = json!(revision);
    }
    json!({ "mutations": [ { "patch": body } ] })
}

#[derive(Debug, Clone)]
pub struct SanityClient {
    http: Client,
    config: SanityConfig,
}

impl SanityClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(config: SanityConfig) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("club-content/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check_status(
        res: reqwest::Response,
        document_id: Option<&str>,
    ) -> Result<reqwest::Response, StoreError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        match (status, document_id) {
            (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => Err(StoreError::Unauthorized),
            (StatusCode::TOO_MANY_REQUESTS, _) => Err(StoreError::RateLimited),
            // ifRevisionID mismatch
            (StatusCode::CONFLICT, Some(id)) => Err(StoreError::RevisionConflict {
                id: id.to_string(),
            }),
            (s, _) => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(StoreError::Http { status, body })
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Transport(e.to_string())
    }
}

#[async_trait]
impl DocumentStore for SanityClient {
    async fn query_featured(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<FeaturedCandidate>, StoreError> {
        let url = format!(
            "{}/data/query/{}",
            self.config.base_url(),
            self.config.dataset
        );
        let res = self
            .authorize(self.http.get(&url).query(&query_params(query)))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let body = Self::check_status(res, None)
            .await?
            .json::<QueryResponse<Vec<SanityCandidate>>>()
            .await
            .map_err(|e| StoreError::Serde(e.to_string()))?;

        debug!(
            collection = %query.collection,
            count = body.result.len(),
            "Sanity featured query complete"
        );
        Ok(body.result.into_iter().map(FeaturedCandidate::from).collect())
    }

    async fn commit(&self, patch: &DocumentPatch) -> Result<CommitReceipt, StoreError> {
        let url = format!(
            "{}/data/mutate/{}",
            self.config.base_url(),
            self.config.dataset
        );
        let res = self
            .authorize(
                self.http
                    .post(&url)
                    .query(&[("returnIds", "true"), ("visibility", "sync")])
                    .json(&mutation_body(patch)),
            )
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let body = Self::check_status(res, Some(&patch.id))
            .await?
            .json::<MutateResponse>()
            .await
            .map_err(|e| StoreError::Serde(e.to_string()))?;

        debug!(
            document_id = %patch.id,
            transaction_id = %body.transaction_id,
            operation = ?body.results.first().and_then(|r| r.operation.as_deref()),
            "Sanity patch committed"
        );

        let id = body
            .results
            .into_iter()
            .next()
            .map(|result| result.id)
            .unwrap_or_else(|| patch.id.clone());

        // Sanity's transaction id becomes the document's new _rev
        Ok(CommitReceipt {
            id,
            revision: Some(body.transaction_id),
        })
    }
}
