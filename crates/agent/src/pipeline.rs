//! The message pipeline: from an incoming chat message to the reply.
//!
//! 1. **Filter** messages the bot must not answer
//! 2. **Parse** directives out of the mention-stripped text
//! 3. **Route** control commands, which are answered directly
//! 4. **Select** a model and **build** the conversation window
//! 5. **Dispatch** to the completion API and post the reply

use crate::builder::{BuildRequest, ConversationBuilder};
use crate::command::{CommandRouter, Routed};
use crate::directive::{self, ParsedMessage};
use crate::dispatcher::ResponseDispatcher;
use crate::error::BuildError;
use crate::model::ModelSelector;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use zulipgpt_core::channel::{BotIdentity, Channel, IncomingMessage};
use zulipgpt_core::context::ContextCatalog;
use zulipgpt_core::error::ChannelError;

/// Reply when something other than the completion call goes wrong.
pub const INTERNAL_ERROR_REPLY: &str =
    "Sorry, something went wrong while preparing the answer. Please try again later.";

/// Why a message got no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Sent by the bot itself
    OwnMessage,
    /// A stream message that doesn't mention the bot
    NotMentioned,
}

/// Outcome of handling one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    Replied(String),
}

pub struct MessagePipeline {
    bot: BotIdentity,
    channel: Arc<dyn Channel>,
    catalog: Arc<dyn ContextCatalog>,
    router: CommandRouter,
    selector: ModelSelector,
    builder: ConversationBuilder,
    dispatcher: ResponseDispatcher,
}

impl MessagePipeline {
    pub fn new(
        bot: BotIdentity,
        channel: Arc<dyn Channel>,
        catalog: Arc<dyn ContextCatalog>,
        router: CommandRouter,
        selector: ModelSelector,
        builder: ConversationBuilder,
        dispatcher: ResponseDispatcher,
    ) -> Self {
        Self {
            bot,
            channel,
            catalog,
            router,
            selector,
            builder,
            dispatcher,
        }
    }

    /// Whether the message must be left unanswered.
    pub fn ignore_reason(&self, message: &IncomingMessage) -> Option<IgnoreReason> {
        if self.bot.is_self(&message.sender.email) {
            return Some(IgnoreReason::OwnMessage);
        }
        if !message.is_private() && !self.bot.is_mentioned_in(&message.content) {
            return Some(IgnoreReason::NotMentioned);
        }
        None
    }

    /// Compute the reply for a message without sending it.
    pub async fn respond(&self, message: &IncomingMessage) -> Outcome {
        if let Some(reason) = self.ignore_reason(message) {
            debug!(id = message.id, ?reason, "Ignoring message");
            return Outcome::Ignored(reason);
        }

        let parsed = directive::parse(&self.bot.strip_mentions(&message.content));
        info!(
            sender = %message.sender.email,
            conversation = %message.recipient,
            directives = %parsed.directives.names(),
            prompt = %parsed.text,
            "Prompt received"
        );

        let reply = match self.router.dispatch(&message.sender, &parsed).await {
            Ok(Routed::Reply(text)) => text,
            Ok(Routed::Chat) => self.chat(message, &parsed).await,
            Err(e) => {
                error!(error = %e, "Context catalog failure");
                INTERNAL_ERROR_REPLY.to_string()
            }
        };
        Outcome::Replied(reply)
    }

    async fn chat(&self, message: &IncomingMessage, parsed: &ParsedMessage) -> String {
        let contexts = match self.catalog.list_all().await {
            Ok(contexts) => contexts,
            Err(e) => {
                error!(error = %e, "Context catalog failure");
                return INTERNAL_ERROR_REPLY.to_string();
            }
        };

        let model = self.selector.select(&parsed.directives);
        let request = BuildRequest {
            message,
            parsed,
            contexts: &contexts,
            model,
        };

        match self.builder.build(request).await {
            Ok(window) => {
                debug!(
                    model = window.model.name,
                    tokens = window.total_tokens,
                    turns = window.turns.len(),
                    contexts = ?window.contexts_applied,
                    "Dispatching conversation window"
                );
                self.dispatcher.reply(&window).await
            }
            Err(BuildError::IrreducibleOverBudget {
                model,
                tokens,
                budget,
            }) => {
                warn!(%model, tokens, budget, "Prompt over budget");
                format!(
                    "Sorry, your message is too long for {model}: it needs {tokens} tokens but at most {budget} are allowed. Please shorten it or drop some contexts."
                )
            }
            Err(e) => {
                error!(error = %e, "Conversation window assembly failed");
                INTERNAL_ERROR_REPLY.to_string()
            }
        }
    }

    /// Handle one message and post the reply, if any.
    pub async fn process(&self, message: &IncomingMessage) -> Result<Outcome, ChannelError> {
        let outcome = self.respond(message).await;
        if let Outcome::Replied(reply) = &outcome {
            self.channel.send(&message.reply_target(), reply).await?;
        }
        Ok(outcome)
    }

    /// Handle messages until the channel closes.
    ///
    /// Per-message failures are logged and skipped; only a rejected
    /// credential ends the loop early.
    pub async fn run(
        &self,
        mut rx: mpsc::Receiver<Result<IncomingMessage, ChannelError>>,
    ) -> Result<(), ChannelError> {
        info!(bot = %self.bot.name, channel = self.channel.name(), "Pipeline started");
        while let Some(incoming) = rx.recv().await {
            match incoming {
                Ok(message) => {
                    if let Err(e) = self.process(&message).await {
                        error!(id = message.id, error = %e, "Failed to deliver reply");
                    }
                }
                Err(e @ ChannelError::Unauthorized(_)) => return Err(e),
                Err(e) => warn!(error = %e, "Channel error"),
            }
        }
        info!("Channel closed, pipeline stopped");
        Ok(())
    }
}
