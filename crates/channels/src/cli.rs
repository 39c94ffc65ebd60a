//! CLI channel — interactive terminal-based chat.
//!
//! Reads from stdin, writes to stdout. Every line is a private message from
//! the local user, so the full pipeline (directives, contexts, history) can
//! be exercised without a Zulip server. Used for `zulipgpt chat`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use zulipgpt_core::channel::{
    AdminCheck, Channel, HistoryEntry, HistoryQuery, HistorySource, IncomingMessage, Recipient,
    Sender,
};
use zulipgpt_core::error::ChannelError;

/// Email used for the local terminal user.
pub const LOCAL_USER_EMAIL: &str = "you@localhost";

/// Earlier messages kept for history by default.
pub const DEFAULT_TRANSCRIPT_LIMIT: usize = 100;

/// Session transcript, oldest first, bounded in length.
struct Transcript {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Transcript {
    /// Room for `history_limit` earlier messages plus the one being answered.
    fn new(history_limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: history_limit + 1,
        }
    }

    fn push(&mut self, entry: HistoryEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    bot_email: String,
    next_id: Arc<AtomicU64>,
    transcript: Arc<Mutex<Transcript>>,
}

impl CliChannel {
    pub fn new(bot_email: impl Into<String>) -> Self {
        Self {
            bot_email: bot_email.into(),
            next_id: Arc::new(AtomicU64::new(1)),
            transcript: Arc::new(Mutex::new(Transcript::new(DEFAULT_TRANSCRIPT_LIMIT))),
        }
    }

    /// Keep at most `limit` earlier messages for history.
    pub fn with_transcript_limit(mut self, limit: usize) -> Self {
        self.transcript = Arc::new(Mutex::new(Transcript::new(limit)));
        self
    }

    fn local_user() -> Sender {
        Sender {
            id: 0,
            email: LOCAL_USER_EMAIL.into(),
            name: "You".into(),
        }
    }

    /// Record a line typed by the local user and turn it into a message.
    pub async fn record_input(&self, line: &str) -> IncomingMessage {
        input_message(&self.next_id, &self.transcript, line).await
    }
}

/// Append to the transcript, returning the new message ID.
async fn record(
    next_id: &AtomicU64,
    transcript: &Mutex<Transcript>,
    sender_email: &str,
    content: &str,
) -> u64 {
    let id = next_id.fetch_add(1, Ordering::SeqCst);
    transcript.lock().await.push(HistoryEntry {
        id,
        sender_email: sender_email.to_string(),
        content: content.to_string(),
        timestamp: Utc::now(),
    });
    id
}

async fn input_message(
    next_id: &AtomicU64,
    transcript: &Mutex<Transcript>,
    line: &str,
) -> IncomingMessage {
    let id = record(next_id, transcript, LOCAL_USER_EMAIL, line).await;
    IncomingMessage {
        id,
        sender: CliChannel::local_user(),
        recipient: Recipient::Private {
            email: LOCAL_USER_EMAIL.into(),
        },
        content: line.to_string(),
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<IncomingMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let next_id = self.next_id.clone();
        let transcript = self.transcript.clone();

        tokio::spawn(async move {
            let stdin = io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }

                        if matches!(line.as_str(), "exit" | "quit" | "/exit" | "/quit" | ":q") {
                            break;
                        }

                        let msg = input_message(&next_id, &transcript, &line).await;
                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, _to: &Recipient, content: &str) -> Result<(), ChannelError> {
        record(&self.next_id, &self.transcript, &self.bot_email, content).await;
        println!("{content}\n");
        Ok(())
    }
}

#[async_trait]
impl HistorySource for CliChannel {
    async fn fetch_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, ChannelError> {
        // One conversation only, so the scope doesn't narrow anything.
        Ok(self
            .transcript
            .lock()
            .await
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.id < query.anchor)
            .take(query.max_count)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AdminCheck for CliChannel {
    async fn is_admin(&self, _sender: &Sender) -> bool {
        true // the local user owns the catalog
    }
}
