//! Conversation-window assembly.
//!
//! The window sent to the model is laid out as
//!
//! ```text
//! [system role] [context 1 .. context n] [history, oldest first] [user turn]
//! ```
//!
//! The system, context, and user turns are irreducible. History fills the
//! remaining budget newest-first, so when the budget runs out it is the
//! oldest messages that are left behind.

use crate::directive::{Directive, DirectiveSet, ParsedMessage};
use crate::error::BuildError;
use crate::model::ModelProfile;
use crate::token::TokenCounter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use zulipgpt_core::channel::{
    BotIdentity, HistoryEntry, HistoryQuery, HistoryScope, HistorySource, IncomingMessage,
    Recipient,
};
use zulipgpt_core::context::NamedContext;
use zulipgpt_core::message::ChatTurn;

/// Earlier messages requested per chat turn.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;
/// How long a history fetch may take before it is abandoned.
pub const DEFAULT_HISTORY_TIMEOUT: Duration = Duration::from_secs(30);

// ── Types ─────────────────────────────────────────────────────────────────

/// Everything the builder needs for one chat turn.
pub struct BuildRequest<'a> {
    pub message: &'a IncomingMessage,
    pub parsed: &'a ParsedMessage,
    /// The full catalog, in catalog order
    pub contexts: &'a [NamedContext],
    pub model: ModelProfile,
}

/// The ordered turns for one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationWindow {
    pub turns: Vec<ChatTurn>,
    pub model: ModelProfile,
    /// Token cost of `turns`, as measured by the counter
    pub total_tokens: usize,
    /// Names of the contexts that were applied, in order
    pub contexts_applied: Vec<String>,
    /// Number of history turns included
    pub history_turns: usize,
    /// Number of fetched history messages left out for budget
    pub history_dropped: usize,
}

// ── Builder ───────────────────────────────────────────────────────────────

/// Assembles conversation windows within a model's input budget.
pub struct ConversationBuilder {
    role: String,
    bot: BotIdentity,
    counter: Arc<dyn TokenCounter>,
    history: Arc<dyn HistorySource>,
    history_limit: usize,
    history_timeout: Duration,
}

impl ConversationBuilder {
    pub fn new(
        role: impl Into<String>,
        bot: BotIdentity,
        counter: Arc<dyn TokenCounter>,
        history: Arc<dyn HistorySource>,
    ) -> Self {
        Self {
            role: role.into(),
            bot,
            counter,
            history,
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_timeout: DEFAULT_HISTORY_TIMEOUT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_history_timeout(mut self, timeout: Duration) -> Self {
        self.history_timeout = timeout;
        self
    }

    /// History scope for a message: the private conversation, or the topic
    /// unless `!stream` widens it to the whole stream.
    pub fn scope_for(message: &IncomingMessage, directives: &DirectiveSet) -> HistoryScope {
        match &message.recipient {
            Recipient::Private { .. } => HistoryScope::Private {
                with: message.sender.email.clone(),
            },
            Recipient::Stream { stream, topic } => {
                if directives.contains(&Directive::Stream) {
                    HistoryScope::Stream {
                        stream: stream.clone(),
                    }
                } else {
                    HistoryScope::Topic {
                        stream: stream.clone(),
                        topic: topic.clone(),
                    }
                }
            }
        }
    }

    /// Context snippets named by the directives, in directive order.
    pub fn select_contexts<'c>(
        directives: &DirectiveSet,
        contexts: &'c [NamedContext],
    ) -> Vec<&'c NamedContext> {
        directives
            .iter()
            .filter_map(Directive::context_name)
            .filter_map(|name| {
                contexts
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(name))
            })
            .collect()
    }

    /// Build the window for one chat turn.
    pub async fn build(&self, request: BuildRequest<'_>) -> Result<ConversationWindow, BuildError> {
        let model = request.model;
        let budget = model.input_token_budget;

        let selected = Self::select_contexts(&request.parsed.directives, request.contexts);
        let mut head = Vec::with_capacity(selected.len() + 1);
        head.push(ChatTurn::system(&self.role));
        head.extend(selected.iter().map(|c| ChatTurn::system(&c.value)));
        let user = ChatTurn::user(&request.parsed.text);

        let mut total = self.counter.reply_priming();
        for turn in head.iter().chain(std::iter::once(&user)) {
            total += self.counter.count_turn(model.name, turn)?;
        }
        if total > budget {
            return Err(BuildError::IrreducibleOverBudget {
                model: model.name.to_string(),
                tokens: total,
                budget,
            });
        }

        let contexts_applied = selected.iter().map(|c| c.name.clone()).collect();

        if request.parsed.has(&Directive::New) {
            debug!(model = model.name, tokens = total, "Fresh conversation, no history");
            head.push(user);
            return Ok(ConversationWindow {
                turns: head,
                model,
                total_tokens: total,
                contexts_applied,
                history_turns: 0,
                history_dropped: 0,
            });
        }

        let query = HistoryQuery {
            scope: Self::scope_for(request.message, &request.parsed.directives),
            anchor: request.message.id,
            max_count: self.history_limit,
        };
        let entries = self.fetch_history(&query).await;
        let fetched = entries.len();

        // Newest first until the first turn that no longer fits.
        let mut history = Vec::new();
        for entry in entries {
            let turn = self.history_turn(entry);
            let cost = self.counter.count_turn(model.name, &turn)?;
            if total + cost > budget {
                break;
            }
            total += cost;
            history.push(turn);
        }
        history.reverse();

        let history_turns = history.len();
        debug!(
            model = model.name,
            tokens = total,
            budget,
            history_turns,
            history_dropped = fetched - history_turns,
            "Conversation window assembled"
        );

        let mut turns = head;
        turns.extend(history);
        turns.push(user);

        Ok(ConversationWindow {
            turns,
            model,
            total_tokens: total,
            contexts_applied,
            history_turns,
            history_dropped: fetched - history_turns,
        })
    }

    /// Fetch history, falling back to none on failure or timeout.
    async fn fetch_history(&self, query: &HistoryQuery) -> Vec<HistoryEntry> {
        match tokio::time::timeout(self.history_timeout, self.history.fetch_history(query)).await
        {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                warn!(scope = ?query.scope, error = %e, "History fetch failed, continuing without history");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    scope = ?query.scope,
                    timeout_secs = self.history_timeout.as_secs(),
                    "History fetch timed out, continuing without history"
                );
                Vec::new()
            }
        }
    }

    fn history_turn(&self, entry: HistoryEntry) -> ChatTurn {
        let content = self.bot.strip_mentions(&entry.content);
        if self.bot.is_self(&entry.sender_email) {
            ChatTurn::assistant(content)
        } else {
            ChatTurn::user(content)
        }
    }
}
