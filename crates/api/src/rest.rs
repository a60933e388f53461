//! REST client for the Polylogue backend.
//!
//! [`BackendClient`] wraps a `reqwest::Client` and translates each backend
//! endpoint into a typed call, with automatic retry + exponential back-off
//! on transient (5xx / timeout) failures.  Streaming endpoints live in
//! [`crate::stream`] and are never retried.

use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use pl_domain::chat::{Conversation, Entity, MemoryItem, Message};
use pl_domain::config::BackendConfig;
use pl_domain::error::{Error, Result};
use pl_domain::trace::TraceEvent;

use crate::types::{
    ChatConfigDto, ConversationDetailDto, ConversationDto, ConversationListDto,
    CreateConversationRequest, EntityListDto, MemoryListDto, UpdateConversationRequest,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A REST-based client for the Polylogue backend.
///
/// Created once at startup and reused for the lifetime of the process;
/// the underlying `reqwest::Client` maintains a connection pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    /// Separate client for SSE requests: no overall timeout (a reply may
    /// stream for minutes), connect timeout only.
    stream_http: Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl BackendClient {
    /// Build a new client from the shared [`BackendConfig`].
    ///
    /// The API key falls back to the `PL_API_KEY` environment variable
    /// when the config leaves it unset.
    pub fn new(cfg: &BackendConfig) -> Result<Self> {
        let timeout = Duration::from_millis(cfg.timeout_ms);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        let stream_http = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let api_key = cfg
            .api_key
            .clone()
            .or_else(|| std::env::var("PL_API_KEY").ok());

        Ok(Self {
            http,
            stream_http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key,
            max_retries: cfg.max_retries,
        })
    }

    // ── request helpers ──────────────────────────────────────────────

    /// Decorate a `RequestBuilder` with the standard client headers.
    pub(crate) fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        let trace_id = Uuid::new_v4().to_string();
        let mut rb = rb
            .header("X-Client-Type", "polylogue")
            .header("X-Trace-Id", &trace_id);

        if let Some(ref key) = self.api_key {
            rb = rb.header("X-Api-Key", key);
        }
        rb
    }

    /// Build the full URL for a path like `/api/conversations`.
    pub(crate) fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn streaming_http(&self) -> &Client {
        &self.stream_http
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Execute a request with retry + exponential back-off on transient
    /// errors.
    ///
    /// * Retries on 5xx status codes and on timeouts/connection errors.
    /// * Does **not** retry on 4xx (client errors are permanent);
    ///   401/403 map to [`Error::Auth`].
    /// * Emits a [`TraceEvent::ApiCall`] after every attempt.
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let rb = self.decorate(build_request());
            let result = rb.send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    TraceEvent::ApiCall {
                        endpoint: endpoint.to_owned(),
                        status,
                        duration_ms,
                    }
                    .emit();

                    if resp.status().is_server_error() {
                        let message = resp.text().await.unwrap_or_default();
                        last_err = Some(Error::Api { status, message });
                        continue;
                    }

                    if resp.status().is_client_error() {
                        let resp_status = resp.status();
                        let message = resp.text().await.unwrap_or_default();
                        if resp_status == StatusCode::UNAUTHORIZED
                            || resp_status == StatusCode::FORBIDDEN
                        {
                            return Err(Error::Auth(format!(
                                "{endpoint} auth failed ({status}): {message}"
                            )));
                        }
                        return Err(Error::Api { status, message });
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    let status = e.status().map(|s| s.as_u16()).unwrap_or(0);

                    TraceEvent::ApiCall {
                        endpoint: endpoint.to_owned(),
                        status,
                        duration_ms,
                    }
                    .emit();

                    last_err = Some(from_reqwest(e));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Http(format!("{endpoint}: all retries exhausted"))))
    }

    /// Read and decode a JSON response body.
    async fn decode<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T> {
        let body = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Other(format!("failed to parse {endpoint} response: {e}: {body}")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl BackendClient {
    pub async fn list_conversations(&self, include_archived: bool) -> Result<Vec<Conversation>> {
        let url = self.endpoint_url("/api/conversations");
        let resp = self
            .execute_with_retry("GET /api/conversations", || {
                self.http
                    .get(&url)
                    .query(&[("includeArchived", include_archived)])
            })
            .await?;

        let list: ConversationListDto = Self::decode("GET /api/conversations", resp).await?;
        Ok(list.conversations.into_iter().map(Into::into).collect())
    }

    pub async fn get_conversation(&self, id: &str) -> Result<(Conversation, Vec<Message>)> {
        let url = self.endpoint_url(&format!("/api/conversations/{id}"));
        let resp = self
            .execute_with_retry("GET /api/conversations/{id}", || self.http.get(&url))
            .await?;

        let detail: ConversationDetailDto =
            Self::decode("GET /api/conversations/{id}", resp).await?;
        Ok((
            detail.conversation.into(),
            detail.messages.into_iter().map(Into::into).collect(),
        ))
    }

    pub async fn create_conversation(&self, req: &CreateConversationRequest) -> Result<Conversation> {
        let url = self.endpoint_url("/api/conversations");
        let resp = self
            .execute_with_retry("POST /api/conversations", || self.http.post(&url).json(req))
            .await?;

        let dto: ConversationDto = Self::decode("POST /api/conversations", resp).await?;
        Ok(dto.into())
    }

    /// Set the conversation title.  The backend rejects a second title
    /// write; callers go through the auto-titling path exactly once.
    pub async fn set_title(&self, id: &str, title: &str) -> Result<()> {
        let url = self.endpoint_url(&format!("/api/conversations/{id}"));
        let req = UpdateConversationRequest {
            title: Some(title.to_owned()),
        };
        self.execute_with_retry("PATCH /api/conversations/{id}", || {
            self.http.patch(&url).json(&req)
        })
        .await?;
        Ok(())
    }

    pub async fn delete_conversation(&self, id: &str) -> Result<()> {
        let url = self.endpoint_url(&format!("/api/conversations/{id}"));
        self.execute_with_retry("DELETE /api/conversations/{id}", || self.http.delete(&url))
            .await?;
        Ok(())
    }

    pub async fn archive_conversation(&self, id: &str) -> Result<()> {
        let url = self.endpoint_url(&format!("/api/conversations/{id}/archive"));
        self.execute_with_retry("POST /api/conversations/{id}/archive", || {
            self.http.post(&url)
        })
        .await?;
        Ok(())
    }

    pub async fn unarchive_conversation(&self, id: &str) -> Result<()> {
        let url = self.endpoint_url(&format!("/api/conversations/{id}/unarchive"));
        self.execute_with_retry("POST /api/conversations/{id}/unarchive", || {
            self.http.post(&url)
        })
        .await?;
        Ok(())
    }

    /// Fetch the backend-defined export blob for a conversation.
    ///
    /// The schema is owned by the backend; this client treats it as an
    /// opaque JSON document.
    pub async fn export_conversation(&self, id: &str) -> Result<serde_json::Value> {
        let url = self.endpoint_url(&format!("/api/conversations/{id}/export"));
        let resp = self
            .execute_with_retry("GET /api/conversations/{id}/export", || self.http.get(&url))
            .await?;

        Self::decode("GET /api/conversations/{id}/export", resp).await
    }

    /// Re-ingest a previously exported conversation blob.
    pub async fn import_conversation(&self, blob: &serde_json::Value) -> Result<Conversation> {
        let url = self.endpoint_url("/api/conversations/import");
        let resp = self
            .execute_with_retry("POST /api/conversations/import", || {
                self.http.post(&url).json(blob)
            })
            .await?;

        let dto: ConversationDto = Self::decode("POST /api/conversations/import", resp).await?;
        Ok(dto.into())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entities & chat configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl BackendClient {
    pub async fn list_entities(&self) -> Result<Vec<Entity>> {
        let url = self.endpoint_url("/api/entities");
        let resp = self
            .execute_with_retry("GET /api/entities", || self.http.get(&url))
            .await?;

        let list: EntityListDto = Self::decode("GET /api/entities", resp).await?;
        Ok(list.entities.into_iter().map(Into::into).collect())
    }

    pub async fn chat_config(&self) -> Result<ChatConfigDto> {
        let url = self.endpoint_url("/api/chat/config");
        let resp = self
            .execute_with_retry("GET /api/chat/config", || self.http.get(&url))
            .await?;

        Self::decode("GET /api/chat/config", resp).await
    }

    pub async fn health(&self) -> Result<serde_json::Value> {
        let url = self.endpoint_url("/api/health");
        let resp = self
            .execute_with_retry("GET /api/health", || self.http.get(&url))
            .await?;

        Self::decode("GET /api/health", resp).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memories
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl BackendClient {
    pub async fn list_memories(
        &self,
        entity_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<MemoryItem>> {
        let url = self.endpoint_url("/api/memories");
        let resp = self
            .execute_with_retry("GET /api/memories", || {
                let mut rb = self.http.get(&url).query(&[("limit", limit)]);
                if let Some(entity) = entity_id {
                    rb = rb.query(&[("entityId", entity)]);
                }
                rb
            })
            .await?;

        let list: MemoryListDto = Self::decode("GET /api/memories", resp).await?;
        Ok(list.memories.into_iter().map(Into::into).collect())
    }

    pub async fn search_memories(&self, query: &str, limit: u32) -> Result<Vec<MemoryItem>> {
        let url = self.endpoint_url("/api/memories/search");
        let resp = self
            .execute_with_retry("GET /api/memories/search", || {
                self.http
                    .get(&url)
                    .query(&[("q", query)])
                    .query(&[("limit", limit)])
            })
            .await?;

        let list: MemoryListDto = Self::decode("GET /api/memories/search", resp).await?;
        Ok(list.memories.into_iter().map(Into::into).collect())
    }

    pub async fn memory_stats(&self) -> Result<serde_json::Value> {
        let url = self.endpoint_url("/api/memories/stats");
        let resp = self
            .execute_with_retry("GET /api/memories/stats", || self.http.get(&url))
            .await?;

        Self::decode("GET /api/memories/stats", resp).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert a `reqwest::Error` into a domain [`Error`].
///
/// Timeout errors become [`Error::Timeout`]; everything else becomes
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
