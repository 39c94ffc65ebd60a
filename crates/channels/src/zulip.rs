//! Zulip channel: REST client over the Zulip server API.
//!
//! Incoming messages come from an event queue (`/register` + long-polled
//! `/events`). Replies go through `/messages`, and the same endpoint with a
//! narrow serves conversation history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, warn};
use zulipgpt_config::{SetContextPermission, ZulipCredentials};
use zulipgpt_core::channel::{
    AdminCheck, Channel, HistoryEntry, HistoryQuery, HistoryScope, HistorySource,
    IncomingMessage, Recipient, Sender,
};
use zulipgpt_core::error::ChannelError;

/// How long the server may hold an `/events` request open.
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(90);
/// Pause before retrying after a failed poll.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Thin wrapper over the Zulip REST endpoints the bot needs.
#[derive(Clone)]
pub struct ZulipApi {
    base_url: String,
    email: String,
    api_key: String,
    client: reqwest::Client,
}

impl ZulipApi {
    pub fn new(credentials: &ZulipCredentials) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: format!("{}/api/v1", credentials.site.trim_end_matches('/')),
            email: credentials.email.clone(),
            api_key: credentials.api_key.clone(),
            client,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .basic_auth(&self.email, Some(&self.api_key))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .basic_auth(&self.email, Some(&self.api_key))
    }

    /// Send a request and decode a `"result": "success"` payload.
    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ZulipApiError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ZulipApiError::Timeout(e.to_string())
            } else {
                ZulipApiError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ZulipApiError::Decode(format!("status {status}: {e}")))?;

        if body.get("result").and_then(|r| r.as_str()) != Some("success") {
            let code = body
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or("UNKNOWN")
                .to_string();
            let msg = body
                .get("msg")
                .and_then(|m| m.as_str())
                .unwrap_or_default()
                .to_string();
            return Err(ZulipApiError::Server { status, code, msg });
        }

        serde_json::from_value(body).map_err(|e| ZulipApiError::Decode(e.to_string()))
    }

    /// `GET /users/me`, used to verify the credentials at startup.
    pub async fn profile(&self) -> Result<Profile, ZulipApiError> {
        self.call(self.get("/users/me")).await
    }

    /// `GET /users/{id}`
    pub async fn user(&self, user_id: u64) -> Result<Profile, ZulipApiError> {
        let response: UserResponse = self.call(self.get(&format!("/users/{user_id}"))).await?;
        Ok(response.user)
    }

    /// Register a message event queue.
    pub async fn register(&self) -> Result<EventQueue, ZulipApiError> {
        self.call(self.post("/register").form(&[
            ("event_types", r#"["message"]"#),
            ("apply_markdown", "false"),
        ]))
        .await
    }

    /// Long-poll the queue for events after `last_event_id`.
    pub async fn events(&self, queue: &EventQueue) -> Result<Vec<Event>, ZulipApiError> {
        let last_event_id = queue.last_event_id.to_string();
        let response: EventsResponse = self
            .call(
                self.get("/events")
                    .query(&[
                        ("queue_id", queue.queue_id.as_str()),
                        ("last_event_id", last_event_id.as_str()),
                    ])
                    .timeout(LONG_POLL_TIMEOUT),
            )
            .await?;
        Ok(response.events)
    }

    /// Post a message to a private conversation or a stream topic.
    pub async fn send_message(&self, to: &Recipient, content: &str) -> Result<(), ZulipApiError> {
        let form: Vec<(&str, &str)> = match to {
            Recipient::Private { email } => vec![
                ("type", "private"),
                ("to", email.as_str()),
                ("content", content),
            ],
            Recipient::Stream { stream, topic } => vec![
                ("type", "stream"),
                ("to", stream.as_str()),
                ("topic", topic.as_str()),
                ("content", content),
            ],
        };
        let _: serde_json::Value = self.call(self.post("/messages").form(&form)).await?;
        Ok(())
    }

    /// Messages before `anchor` in the narrow, oldest first (server order).
    pub async fn messages_before(
        &self,
        narrow: &serde_json::Value,
        anchor: u64,
        num_before: usize,
    ) -> Result<Vec<ZulipMessage>, ZulipApiError> {
        let anchor = anchor.to_string();
        let num_before = num_before.to_string();
        let narrow = narrow.to_string();
        let response: MessagesResponse = self
            .call(self.get("/messages").query(&[
                ("anchor", anchor.as_str()),
                ("num_before", num_before.as_str()),
                ("num_after", "0"),
                ("include_anchor", "false"),
                ("apply_markdown", "false"),
                ("narrow", narrow.as_str()),
            ]))
            .await?;
        Ok(response.messages)
    }
}

/// Failure talking to the Zulip server.
#[derive(Debug, thiserror::Error)]
pub enum ZulipApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("{code} ({status}): {msg}")]
    Server { status: u16, code: String, msg: String },
}

impl ZulipApiError {
    fn is_bad_queue(&self) -> bool {
        matches!(self, Self::Server { code, .. } if code == "BAD_EVENT_QUEUE_ID")
    }

    fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Server { status: 401, .. })
            || matches!(self, Self::Server { code, .. } if code == "UNAUTHORIZED")
    }
}

impl From<ZulipApiError> for ChannelError {
    fn from(err: ZulipApiError) -> Self {
        match err {
            e if e.is_unauthorized() => ChannelError::Unauthorized(e.to_string()),
            ZulipApiError::Timeout(e) => ChannelError::Timeout(e),
            ZulipApiError::Network(e) => ChannelError::ConnectionLost(e),
            ZulipApiError::Decode(e) => ChannelError::InvalidPayload(e),
            e @ ZulipApiError::Server { .. } => ChannelError::DeliveryFailed {
                channel: "zulip".into(),
                reason: e.to_string(),
            },
        }
    }
}

// --- Zulip API types ---

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub user_id: u64,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_owner: bool,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: Profile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventQueue {
    pub queue_id: String,
    pub last_event_id: i64,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
pub struct Event {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: Option<ZulipMessage>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<ZulipMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZulipMessage {
    pub id: u64,
    pub sender_id: u64,
    pub sender_email: String,
    #[serde(default)]
    pub sender_full_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Stream name for stream messages, a list of users for private ones
    #[serde(default)]
    pub display_recipient: serde_json::Value,
    #[serde(default)]
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: i64,
}

impl ZulipMessage {
    fn into_incoming(self) -> IncomingMessage {
        let recipient = if self.kind == "private" {
            Recipient::Private {
                email: self.sender_email.clone(),
            }
        } else {
            Recipient::Stream {
                stream: self
                    .display_recipient
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                topic: self.subject.clone(),
            }
        };

        IncomingMessage {
            id: self.id,
            sender: Sender {
                id: self.sender_id,
                email: self.sender_email,
                name: self.sender_full_name,
            },
            recipient,
            content: self.content,
        }
    }

    fn into_history(self) -> HistoryEntry {
        HistoryEntry {
            id: self.id,
            sender_email: self.sender_email,
            content: self.content,
            timestamp: DateTime::<Utc>::from_timestamp(self.timestamp, 0).unwrap_or_default(),
        }
    }
}

/// Zulip narrow for a history scope.
pub fn narrow_for(scope: &HistoryScope) -> serde_json::Value {
    match scope {
        HistoryScope::Private { with } => serde_json::json!([
            {"operator": "pm-with", "operand": with}
        ]),
        HistoryScope::Stream { stream } => serde_json::json!([
            {"operator": "stream", "operand": stream}
        ]),
        HistoryScope::Topic { stream, topic } => serde_json::json!([
            {"operator": "stream", "operand": stream},
            {"operator": "topic", "operand": topic}
        ]),
    }
}

/// Zulip channel adapter.
pub struct ZulipChannel {
    api: Arc<ZulipApi>,
    permission: SetContextPermission,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

impl ZulipChannel {
    pub fn new(credentials: &ZulipCredentials, permission: SetContextPermission) -> Self {
        Self {
            api: Arc::new(ZulipApi::new(credentials)),
            permission,
            shutdown: Mutex::new(None),
        }
    }

    /// The bot account's email.
    pub fn email(&self) -> &str {
        self.api.email()
    }

    /// Check the credentials against the server.
    pub async fn verify(&self) -> Result<Profile, ChannelError> {
        let profile = self.api.profile().await?;
        debug!(user_id = profile.user_id, email = %profile.email, "Zulip profile");
        Ok(profile)
    }
}

/// Forward message events until shutdown or the receiver goes away.
async fn poll_events(
    api: Arc<ZulipApi>,
    mut queue: EventQueue,
    tx: mpsc::Sender<Result<IncomingMessage, ChannelError>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let polled = tokio::select! {
            _ = shutdown.changed() => break,
            polled = api.events(&queue) => polled,
        };

        match polled {
            Ok(events) => {
                for event in events {
                    queue.last_event_id = queue.last_event_id.max(event.id);
                    if event.kind != "message" {
                        continue;
                    }
                    let Some(message) = event.message else {
                        continue;
                    };
                    if tx.send(Ok(message.into_incoming())).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.is_bad_queue() => {
                info!("Zulip event queue expired, registering a new one");
                match api.register().await {
                    Ok(fresh) => queue = fresh,
                    Err(e) => {
                        warn!(error = %e, "Failed to re-register event queue");
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
            Err(e) if e.is_unauthorized() => {
                error!(error = %e, "Zulip rejected the credentials");
                let _ = tx.send(Err(e.into())).await;
                return;
            }
            Err(ZulipApiError::Timeout(_)) => {
                debug!("Event poll timed out, polling again");
            }
            Err(e) => {
                warn!(error = %e, "Event poll failed");
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
    debug!("Zulip event loop stopped");
}

#[async_trait]
impl Channel for ZulipChannel {
    fn name(&self) -> &str {
        "zulip"
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<IncomingMessage, ChannelError>>, ChannelError> {
        let queue = self.api.register().await?;
        info!(queue_id = %queue.queue_id, "Zulip event queue registered");

        let (tx, rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown.lock().await = Some(shutdown_tx);

        tokio::spawn(poll_events(self.api.clone(), queue, tx, shutdown_rx));
        Ok(rx)
    }

    async fn send(&self, to: &Recipient, content: &str) -> Result<(), ChannelError> {
        debug!(to = %to, content_len = content.len(), "Zulip send");
        self.api.send_message(to, content).await?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Zulip channel stopping");
        if let Some(tx) = self.shutdown.lock().await.take() {
            let _ = tx.send(true);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(self.api.profile().await.is_ok())
    }
}

#[async_trait]
impl HistorySource for ZulipChannel {
    async fn fetch_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, ChannelError> {
        let narrow = narrow_for(&query.scope);
        let messages = self
            .api
            .messages_before(&narrow, query.anchor, query.max_count)
            .await
            .map_err(|e| ChannelError::HistoryUnavailable(e.to_string()))?;

        Ok(messages
            .into_iter()
            .rev()
            .map(ZulipMessage::into_history)
            .collect())
    }
}

#[async_trait]
impl AdminCheck for ZulipChannel {
    async fn is_admin(&self, sender: &Sender) -> bool {
        match self.permission {
            SetContextPermission::Everyone => true,
            SetContextPermission::Admin => match self.api.user(sender.id).await {
                Ok(user) => user.is_admin || user.is_owner,
                Err(e) => {
                    warn!(sender = %sender.email, error = %e, "Admin lookup failed");
                    false
                }
            },
        }
    }
}
