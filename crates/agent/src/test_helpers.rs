//! Shared fakes for the pipeline tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use zulipgpt_core::channel::{
    AdminCheck, BotIdentity, Channel, HistoryEntry, HistoryQuery, HistorySource,
    IncomingMessage, Recipient, Sender,
};
use zulipgpt_core::error::{ChannelError, ProviderError};
use zulipgpt_core::message::ChatTurn;
use zulipgpt_core::provider::{CompletionRequest, CompletionResponse, Provider};

use crate::error::TokenError;
use crate::token::TokenCounter;

pub fn bot() -> BotIdentity {
    BotIdentity::new("GPT", "gpt-bot@zulip.example.com")
}

pub fn sender() -> Sender {
    Sender {
        id: 11,
        email: "alice@example.com".into(),
        name: "Alice".into(),
    }
}

pub fn private_message(id: u64, content: &str) -> IncomingMessage {
    IncomingMessage {
        id,
        sender: sender(),
        recipient: Recipient::Private {
            email: "alice@example.com".into(),
        },
        content: content.into(),
    }
}

pub fn stream_message(id: u64, content: &str) -> IncomingMessage {
    IncomingMessage {
        id,
        sender: sender(),
        recipient: Recipient::Stream {
            stream: "general".into(),
            topic: "lunch".into(),
        },
        content: content.into(),
    }
}

pub fn history_entry(id: u64, sender_email: &str, content: &str) -> HistoryEntry {
    HistoryEntry {
        id,
        sender_email: sender_email.into(),
        content: content.into(),
        timestamp: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
    }
}

/// Counts whitespace-separated words, plus fixed framing.
pub struct WordCounter {
    pub per_turn: usize,
    pub priming: usize,
}

impl WordCounter {
    /// No framing at all: a turn costs exactly its word count.
    pub fn bare() -> Self {
        Self {
            per_turn: 0,
            priming: 0,
        }
    }
}

impl Default for WordCounter {
    fn default() -> Self {
        Self {
            per_turn: 4,
            priming: 2,
        }
    }
}

impl TokenCounter for WordCounter {
    fn count_turn(&self, _model: &str, turn: &ChatTurn) -> Result<usize, TokenError> {
        Ok(self.per_turn + turn.content.split_whitespace().count())
    }

    fn reply_priming(&self) -> usize {
        self.priming
    }
}

/// History source returning a fixed list, most recent first.
pub struct FixedHistory {
    entries: Result<Vec<HistoryEntry>, String>,
    delay: Option<Duration>,
    calls: Arc<Mutex<usize>>,
    queries: Arc<Mutex<Vec<HistoryQuery>>>,
}

impl FixedHistory {
    pub fn new(entries: Vec<HistoryEntry>) -> Self {
        Self {
            entries: Ok(entries),
            delay: None,
            calls: Arc::new(Mutex::new(0)),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            entries: Err("server unavailable".into()),
            ..Self::new(vec![])
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Arc<Mutex<usize>> {
        self.calls.clone()
    }

    pub fn queries(&self) -> Arc<Mutex<Vec<HistoryQuery>>> {
        self.queries.clone()
    }
}

#[async_trait]
impl HistorySource for FixedHistory {
    async fn fetch_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, ChannelError> {
        *self.calls.lock().unwrap() += 1;
        self.queries.lock().unwrap().push(query.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.entries
            .clone()
            .map(|entries| entries.into_iter().take(query.max_count).collect())
            .map_err(ChannelError::HistoryUnavailable)
    }
}

/// Admin predicate with a fixed answer.
pub struct StaticAdmin(pub bool);

#[async_trait]
impl AdminCheck for StaticAdmin {
    async fn is_admin(&self, _sender: &Sender) -> bool {
        self.0
    }
}

/// A provider that returns scripted results in order, repeating the last.
pub struct ScriptedProvider {
    results: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(results: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn text(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut results = self.results.lock().unwrap();
            if results.len() > 1 {
                results.remove(0)
            } else {
                results
                    .first()
                    .cloned()
                    .unwrap_or_else(|| Err(ProviderError::NotConfigured("no script".into())))
            }
        };

        result.map(|content| CompletionResponse {
            content,
            model,
            usage: None,
        })
    }
}

/// Channel that records everything sent through it.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(Recipient, String)>>,
}

impl RecordingChannel {
    pub fn sent(&self) -> Vec<(Recipient, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<IncomingMessage, ChannelError>>, ChannelError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(&self, to: &Recipient, content: &str) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.clone(), content.to_string()));
        Ok(())
    }
}
