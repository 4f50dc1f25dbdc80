//! Client for the registration backend.
//!
//! The backend is a PostgREST service (Supabase). Tables are read and
//! written under `/rest/v1/`, every request carries the project API key in
//! both the `apikey` and bearer `Authorization` headers, and HTTP 429 is
//! retried with exponential backoff. Payment is a separate POST to a
//! serverless function.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::{header, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::models::{
    Attendee, AttendeeId, GrandLodge, Lodge, RegistrationPayload, SubmissionResponse,
    TicketPackage,
};
use crate::cache::StampedAttendee;
use crate::store::{ChangeSet, PendingSync};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay for rate limiting; doubles on each retry.
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Attendees per upsert request.
const UPSERT_BATCH_SIZE: usize = 10;

/// Concurrent requests while syncing a change set.
const MAX_CONCURRENT_REQUESTS: usize = 4;

/// Lodge search results per query.
const SEARCH_LIMIT: usize = 20;

const ATTENDEES_TABLE: &str = "attendees";
const LODGES_TABLE: &str = "lodges";
const GRAND_LODGES_TABLE: &str = "grand_lodges";
const PACKAGES_TABLE: &str = "ticket_packages";

/// An attendee row as stored by the backend: the attendee plus its registration.
#[derive(Debug, Serialize)]
struct AttendeeRow<'a> {
    #[serde(rename = "registrationId")]
    registration_id: &'a str,
    #[serde(flatten)]
    attendee: &'a Attendee,
}

/// Outcome of pushing a change set. Failures are collected, not fatal.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub upserted: usize,
    pub deleted: usize,
    pub failures: Vec<String>,
    /// Records the backend did not accept, to be sent again.
    pub failed: PendingSync,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Backend client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    api_key: String,
    payment_url: Option<String>,
    initial_backoff: Duration,
}

impl BackendClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(ApiError::NotConfigured("LODGEFORM_SUPABASE_URL").into());
        }
        if api_key.trim().is_empty() {
            return Err(ApiError::NotConfigured("an API key").into());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            payment_url: None,
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    pub fn with_payment_url(mut self, payment_url: Option<String>) -> Self {
        self.payment_url = payment_url;
        self
    }

    /// Override the rate-limit backoff (tests use a few milliseconds).
    pub fn with_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert("apikey", header::HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        Ok(headers)
    }

    /// Ok(Some) on success, Ok(None) when rate limited, Err otherwise.
    async fn check_response_for_retry(response: reqwest::Response) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a request built by `build`, retrying on 429 with exponential backoff.
    async fn send<F>(&self, url: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = build()
                .headers(self.auth_headers()?)
                .send()
                .await
                .with_context(|| format!("Failed to send request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .send(url, || self.client.get(url).query(query))
            .await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    // ===== Lookups =====

    pub async fn fetch_grand_lodges(&self) -> Result<Vec<GrandLodge>> {
        let url = self.rest_url(GRAND_LODGES_TABLE);
        let query = [("select", "*".to_string()), ("order", "name.asc".to_string())];
        let grand_lodges: Vec<GrandLodge> = self.get(&url, &query).await?;
        debug!(count = grand_lodges.len(), "Fetched grand lodges");
        Ok(grand_lodges)
    }

    /// Lodges whose name contains `query`, optionally within one grand lodge.
    pub async fn search_lodges(&self, grand_lodge_id: Option<&str>, query: &str) -> Result<Vec<Lodge>> {
        let url = self.rest_url(LODGES_TABLE);
        let pattern: String = query
            .trim()
            .chars()
            .filter(|c| !matches!(c, '*' | ',' | '(' | ')'))
            .collect();

        let mut params = vec![
            ("select", "*".to_string()),
            ("name", format!("ilike.*{}*", pattern)),
            ("order", "name.asc".to_string()),
            ("limit", SEARCH_LIMIT.to_string()),
        ];
        if let Some(id) = grand_lodge_id {
            params.push(("grand_lodge_id", format!("eq.{}", id)));
        }

        let lodges: Vec<Lodge> = self.get(&url, &params).await?;
        debug!(query = %pattern, count = lodges.len(), "Lodge search");
        Ok(lodges)
    }

    pub async fn fetch_packages(&self, event_id: &str) -> Result<Vec<TicketPackage>> {
        let url = self.rest_url(PACKAGES_TABLE);
        let query = [
            ("select", "*".to_string()),
            ("event_id", format!("eq.{}", event_id)),
            ("order", "price_cents.asc".to_string()),
        ];
        self.get(&url, &query).await
    }

    // ===== Attendees =====

    /// Attendee rows for a registration, with the backend's last-update time.
    pub async fn fetch_attendees(&self, registration_id: &str) -> Result<Vec<StampedAttendee>> {
        let url = self.rest_url(ATTENDEES_TABLE);
        let query = [
            ("select", "*".to_string()),
            ("registrationId", format!("eq.{}", registration_id)),
        ];
        self.get(&url, &query).await
    }

    /// Insert or update attendee rows for a registration.
    pub async fn upsert_attendees(&self, registration_id: &str, attendees: &[Attendee]) -> Result<()> {
        if attendees.is_empty() {
            return Ok(());
        }

        let url = self.rest_url(ATTENDEES_TABLE);
        let rows: Vec<AttendeeRow<'_>> = attendees
            .iter()
            .map(|attendee| AttendeeRow {
                registration_id,
                attendee,
            })
            .collect();

        self.send(&url, || {
            self.client
                .request(Method::POST, &url)
                .query(&[("on_conflict", "id")])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&rows)
        })
        .await?;

        debug!(registration = registration_id, count = attendees.len(), "Upserted attendees");
        Ok(())
    }

    pub async fn delete_attendee(&self, attendee_id: &AttendeeId) -> Result<()> {
        let url = self.rest_url(ATTENDEES_TABLE);
        let filter = format!("eq.{}", attendee_id);
        self.send(&url, || {
            self.client
                .request(Method::DELETE, &url)
                .query(&[("id", filter.as_str())])
        })
        .await?;
        debug!(attendee = %attendee_id, "Deleted attendee");
        Ok(())
    }

    /// Push a store change set: batched upserts and per-record deletes, run
    /// with bounded concurrency. Individual failures are reported, not raised.
    pub async fn sync_changes(&self, registration_id: &str, changes: &ChangeSet) -> SyncReport {
        let mut report = SyncReport::default();

        let batches: Vec<Vec<Attendee>> = changes
            .upserts
            .chunks(UPSERT_BATCH_SIZE)
            .map(<[Attendee]>::to_vec)
            .collect();
        let upserts: Vec<(Vec<AttendeeId>, Result<()>)> = stream::iter(batches)
            .map(|batch| {
                let client = self.clone();
                let registration_id = registration_id.to_string();
                async move {
                    let result = client.upsert_attendees(&registration_id, &batch).await;
                    (batch.into_iter().map(|a| a.id).collect(), result)
                }
            })
            .buffer_unordered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        for (ids, result) in upserts {
            match result {
                Ok(()) => report.upserted += ids.len(),
                Err(e) => {
                    warn!(error = %e, count = ids.len(), "Attendee upsert failed");
                    report.failures.push(format!("{:#}", e));
                    report.failed.upserts.extend(ids);
                }
            }
        }

        let deletes: Vec<(AttendeeId, Result<()>)> = stream::iter(changes.deletes.clone())
            .map(|id| {
                let client = self.clone();
                async move {
                    let result = client.delete_attendee(&id).await;
                    (id, result)
                }
            })
            .buffer_unordered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        for (id, result) in deletes {
            match result {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!(attendee = %id, error = %e, "Attendee delete failed");
                    report.failures.push(format!("{:#}", e));
                    report.failed.deletes.push(id);
                }
            }
        }

        report
    }

    // ===== Payment =====

    pub async fn submit_registration(&self, payload: &RegistrationPayload) -> Result<SubmissionResponse> {
        let url = self
            .payment_url
            .clone()
            .ok_or(ApiError::NotConfigured("a payment endpoint"))?;

        let response = self
            .send(&url, || self.client.post(&url).json(payload))
            .await?;

        let submission: SubmissionResponse = response
            .json()
            .await
            .context("Failed to parse payment response")?;

        if submission.confirmation_number.trim().is_empty() {
            return Err(ApiError::InvalidResponse("missing confirmation number".to_string()).into());
        }
        Ok(submission)
    }
}
