//! Channel traits — the abstraction over the chat transport.
//!
//! A Channel connects zulipgpt to a messaging platform (Zulip, the local
//! terminal). It delivers incoming messages, sends replies back to the
//! originating conversation, and, through [`HistorySource`], lets the
//! pipeline look at earlier messages of the same conversation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;

/// Who sent an incoming message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Platform user ID
    pub id: u64,

    /// Email address (Zulip's stable user handle)
    pub email: String,

    /// Human-readable display name
    #[serde(default)]
    pub name: String,
}

/// Where a message was posted, and therefore where the reply goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recipient {
    /// A one-to-one conversation with the given user
    Private { email: String },
    /// A topic within a stream
    Stream { stream: String, topic: String },
}

impl Recipient {
    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private { .. })
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Private { email } => write!(f, "pm:{email}"),
            Self::Stream { stream, topic } => write!(f, "#{stream}>{topic}"),
        }
    }
}

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Platform message ID (history anchor)
    pub id: u64,

    /// The author
    pub sender: Sender,

    /// The conversation the message belongs to
    pub recipient: Recipient,

    /// Raw text content
    pub content: String,
}

impl IncomingMessage {
    pub fn is_private(&self) -> bool {
        self.recipient.is_private()
    }

    /// Where the reply to this message should be posted.
    ///
    /// Private messages are answered to the sender, stream messages in the
    /// same stream and topic.
    pub fn reply_target(&self) -> Recipient {
        match &self.recipient {
            Recipient::Private { .. } => Recipient::Private {
                email: self.sender.email.clone(),
            },
            stream => stream.clone(),
        }
    }
}

/// Which earlier messages count as "the same conversation".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryScope {
    /// Private messages exchanged with this user
    Private { with: String },
    /// Every topic of a stream
    Stream { stream: String },
    /// A single topic of a stream
    Topic { stream: String, topic: String },
}

/// A request for earlier messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub scope: HistoryScope,
    /// Message ID to look back from (exclusive)
    pub anchor: u64,
    /// Maximum number of messages to return
    pub max_count: usize,
}

/// One earlier message of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub sender_email: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// The bot's own identity on the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    /// Display name used in mentions
    pub name: String,
    /// Email of the bot account
    pub email: String,
}

impl BotIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    fn mention_forms(&self) -> [String; 2] {
        [format!("@**{}**", self.name), format!("@{}", self.name)]
    }

    /// Whether the text mentions the bot.
    pub fn is_mentioned_in(&self, text: &str) -> bool {
        self.mention_forms().iter().any(|m| text.contains(m.as_str()))
    }

    /// Remove every mention of the bot and trim the result.
    pub fn strip_mentions(&self, text: &str) -> String {
        // The bold form first, so the plain form doesn't leave `**` behind.
        let mut out = text.to_string();
        for mention in self.mention_forms() {
            out = out.replace(&mention, "");
        }
        out.trim().to_string()
    }

    /// Whether a message author is the bot itself.
    pub fn is_self(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email)
    }
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic and message
/// formatting.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "zulip", "cli").
    fn name(&self) -> &str;

    /// Start listening for incoming messages.
    ///
    /// Returns a receiver that yields incoming messages one at a time.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<IncomingMessage, ChannelError>>,
        ChannelError,
    >;

    /// Send a message to a conversation.
    async fn send(
        &self,
        to: &Recipient,
        content: &str,
    ) -> std::result::Result<(), ChannelError>;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Health check — is the channel connected and operational?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}

/// Access to earlier messages of a conversation.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch up to `query.max_count` messages before the anchor,
    /// most recent first.
    async fn fetch_history(
        &self,
        query: &HistoryQuery,
    ) -> std::result::Result<Vec<HistoryEntry>, ChannelError>;
}

/// Authorization check for privileged commands.
#[async_trait]
pub trait AdminCheck: Send + Sync {
    /// Whether the sender may create or delete named contexts.
    async fn is_admin(&self, sender: &Sender) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot() -> BotIdentity {
        BotIdentity::new("GPT", "gpt-bot@zulip.example.com")
    }

    fn sender() -> Sender {
        Sender {
            id: 7,
            email: "alice@example.com".into(),
            name: "Alice".into(),
        }
    }

    #[test]
    fn strip_bold_and_plain_mentions() {
        let b = bot();
        assert_eq!(b.strip_mentions("@**GPT** hello"), "hello");
        assert_eq!(b.strip_mentions("  @GPT hello @**GPT**  "), "hello");
        assert_eq!(b.strip_mentions("no mention"), "no mention");
    }

    #[test]
    fn mention_detection() {
        let b = bot();
        assert!(b.is_mentioned_in("hey @**GPT** what's up"));
        assert!(b.is_mentioned_in("@GPT"));
        assert!(!b.is_mentioned_in("hey GPT"));
    }

    #[test]
    fn self_detection_ignores_case() {
        assert!(bot().is_self("GPT-bot@zulip.example.com"));
        assert!(!bot().is_self("alice@example.com"));
    }

    #[test]
    fn private_reply_goes_to_sender() {
        let msg = IncomingMessage {
            id: 1,
            sender: sender(),
            recipient: Recipient::Private {
                email: "gpt-bot@zulip.example.com".into(),
            },
            content: "hi".into(),
        };
        assert!(msg.is_private());
        assert_eq!(
            msg.reply_target(),
            Recipient::Private {
                email: "alice@example.com".into()
            }
        );
    }

    #[test]
    fn stream_reply_stays_in_topic() {
        let recipient = Recipient::Stream {
            stream: "general".into(),
            topic: "lunch".into(),
        };
        let msg = IncomingMessage {
            id: 1,
            sender: sender(),
            recipient: recipient.clone(),
            content: "hi".into(),
        };
        assert!(!msg.is_private());
        assert_eq!(msg.reply_target(), recipient);
        assert_eq!(recipient.to_string(), "#general>lunch");
    }
}
