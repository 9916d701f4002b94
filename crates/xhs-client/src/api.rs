//! REST client for the assistant backend.
//!
//! Every endpoint answers with a JSON envelope whose `status` is
//! `"success"` or `"error"`; an error envelope becomes
//! [`ClientError::Backend`] carrying the backend's `message`.  Validation
//! failures raised by the backend framework come back as non-2xx replies
//! with a `detail` field and are mapped the same way.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::protocol::{BrowserSnapshot, NoteResult, Task};
use crate::session::ClientId;

/// User agent sent with every request.
const USER_AGENT: &str = "xhs-assistant/0.1";

/// The backend operations a front end can invoke.
///
/// [`ApiClient`] is the HTTP implementation; tests substitute in-memory
/// fakes.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Ask the backend to bring its browser to the site's front page.
    async fn open_xiaohongshu(&self) -> Result<String>;

    /// Screenshot the backend browser and OCR it.
    async fn test_browser(&self) -> Result<BrowserSnapshot>;

    /// Plain keyword search.
    async fn search(&self, keyword: &str) -> Result<Vec<NoteResult>>;

    /// Open one note in the backend browser.
    async fn open_note(&self, note_id: &str, xsec_token: &str) -> Result<String>;

    /// Send a chat message.  The reply streams back over the WebSocket.
    async fn chat(&self, client_id: &ClientId, message: &str) -> Result<()>;

    /// All tasks the backend tracks for this session.
    async fn list_tasks(&self, client_id: &ClientId) -> Result<Vec<Task>>;

    async fn start_auto_search(
        &self,
        client_id: &ClientId,
        keywords: &str,
        task_id: &str,
    ) -> Result<String>;

    async fn cancel_auto_search(&self, client_id: &ClientId, task_id: &str) -> Result<String>;

    /// Answer a continue-search checkpoint.
    async fn submit_user_input(
        &self,
        client_id: &ClientId,
        task_id: &str,
        continue_search: bool,
    ) -> Result<String>;
}

/// HTTP implementation of [`Backend`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
}

impl ApiClient {
    /// Build a client for the configured base URL.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut base = config.base()?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { base, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.endpoint(path)?;
        debug!(endpoint = path, "GET");
        let response = self.http.get(url).query(query).send().await?;
        Self::parse_envelope(response, path).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.endpoint(path)?;
        debug!(endpoint = path, "POST");
        let response = self.http.post(url).json(body).send().await?;
        Self::parse_envelope(response, path).await
    }

    /// Unwrap the `status` envelope, mapping every failure shape to an error.
    async fn parse_envelope(response: reqwest::Response, endpoint: &str) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("detail").map(display_value));
            warn!(endpoint, status = status.as_u16(), "backend returned an error status");
            return Err(match detail {
                Some(message) => ClientError::Backend {
                    endpoint: endpoint.to_owned(),
                    message: Some(message),
                },
                None => ClientError::Status {
                    endpoint: endpoint.to_owned(),
                    status: status.as_u16(),
                },
            });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| ClientError::MalformedPayload(format!("`{endpoint}` reply: {e}")))?;

        if value.get("status").and_then(Value::as_str) == Some("error") {
            return Err(ClientError::Backend {
                endpoint: endpoint.to_owned(),
                message: value.get("message").map(display_value),
            });
        }
        Ok(value)
    }

    fn field<T: DeserializeOwned + Default>(value: &Value, key: &str, endpoint: &str) -> Result<T> {
        match value.get(key) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
                ClientError::MalformedPayload(format!("`{endpoint}` field `{key}`: {e}"))
            }),
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decode a task listing entry by entry; unreadable entries are skipped.
fn decode_tasks(raw: Vec<Value>) -> Vec<Task> {
    raw.into_iter()
        .filter_map(|entry| match serde_json::from_value::<Task>(entry) {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(error = %e, "skipping unreadable task in listing");
                None
            }
        })
        .collect()
}

fn message_of(value: &Value) -> String {
    value.get("message").map(display_value).unwrap_or_default()
}

#[async_trait]
impl Backend for ApiClient {
    async fn open_xiaohongshu(&self) -> Result<String> {
        let value = self.get("open_xiaohongshu", &[]).await?;
        Ok(message_of(&value))
    }

    async fn test_browser(&self) -> Result<BrowserSnapshot> {
        let value = self.get("test_browser", &[]).await?;
        serde_json::from_value(value)
            .map_err(|e| ClientError::MalformedPayload(format!("`test_browser` reply: {e}")))
    }

    async fn search(&self, keyword: &str) -> Result<Vec<NoteResult>> {
        let value = self
            .get("search_xiaohongshu", &[("keyword", keyword)])
            .await?;
        Self::field(&value, "results", "search_xiaohongshu")
    }

    async fn open_note(&self, note_id: &str, xsec_token: &str) -> Result<String> {
        let body = json!({ "note_id": note_id, "xsec_token": xsec_token });
        let value = self.post("open_note", &body).await?;
        Ok(message_of(&value))
    }

    async fn chat(&self, client_id: &ClientId, message: &str) -> Result<()> {
        let body = json!({ "message": message, "client_id": client_id });
        self.post("ai/chat", &body).await?;
        Ok(())
    }

    async fn list_tasks(&self, client_id: &ClientId) -> Result<Vec<Task>> {
        let path = format!("ai/search_tasks/{}", client_id.as_str());
        let value = self.get(&path, &[]).await?;
        let raw: Vec<Value> = Self::field(&value, "tasks", &path)?;
        Ok(decode_tasks(raw))
    }

    async fn start_auto_search(
        &self,
        client_id: &ClientId,
        keywords: &str,
        task_id: &str,
    ) -> Result<String> {
        let body = json!({
            "keywords": keywords.trim(),
            "client_id": client_id,
            "task_id": task_id,
        });
        let value = self.post("ai/start_auto_search", &body).await?;
        Ok(message_of(&value))
    }

    async fn cancel_auto_search(&self, client_id: &ClientId, task_id: &str) -> Result<String> {
        let body = json!({ "task_id": task_id, "client_id": client_id });
        let value = self.post("ai/cancel_auto_search", &body).await?;
        Ok(message_of(&value))
    }

    async fn submit_user_input(
        &self,
        client_id: &ClientId,
        task_id: &str,
        continue_search: bool,
    ) -> Result<String> {
        let body = json!({
            "task_id": task_id,
            "client_id": client_id,
            "input": { "continue_search": continue_search },
        });
        let value = self.post("ai/submit_user_input", &body).await?;
        Ok(message_of(&value))
    }
}
