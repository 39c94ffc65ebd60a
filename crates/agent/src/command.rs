//! Control commands: help, context listing, and context management.
//!
//! A message is routed to exactly one [`Command`] by checking its
//! directives in a fixed priority order. Everything that isn't a control
//! command is a chat turn and is left to the conversation builder.

use crate::directive::{Directive, ParsedMessage};
use crate::help::help_text;
use std::sync::Arc;
use tracing::{debug, info};
use zulipgpt_core::channel::{AdminCheck, Sender};
use zulipgpt_core::context::{ContextCatalog, NamedContext};
use zulipgpt_core::error::StoreError;

/// Keyword that must follow `!set` / `!unset`.
pub const CONTEXT_KEYWORD: &str = "context";

pub const DENIED_REPLY: &str = "Sorry, only admins can un/set contexts";
pub const NOT_IMPLEMENTED_REPLY: &str = "This functionality is not implemented yet.";
pub const SET_USAGE_REPLY: &str = "Usage: `!set context <name> <value>`";
pub const UNSET_USAGE_REPLY: &str = "Usage: `!unset context <name>`";

/// What a message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    ListContexts,
    Me,
    /// `!set context <name> <value...>`; missing parts are `None`
    SetContext {
        name: Option<String>,
        value: Option<String>,
    },
    /// `!unset context <name>`
    UnsetContext { name: Option<String> },
    /// An ordinary chat turn
    Chat,
}

impl Command {
    /// Route a parsed message; the first matching rule wins.
    pub fn route(parsed: &ParsedMessage) -> Self {
        let words: Vec<&str> = parsed.text.split_whitespace().collect();
        let is_context_command = words
            .first()
            .is_some_and(|w| w.eq_ignore_ascii_case(CONTEXT_KEYWORD));

        if parsed.has(&Directive::Help) {
            Self::Help
        } else if parsed.has(&Directive::Contexts) {
            Self::ListContexts
        } else if parsed.has(&Directive::Me) {
            Self::Me
        } else if parsed.has(&Directive::Set) && is_context_command {
            let value = words.get(2..).map(|rest| rest.join(" "));
            Self::SetContext {
                name: words.get(1).map(|n| n.to_lowercase()),
                value: value.filter(|v| !v.is_empty()),
            }
        } else if parsed.has(&Directive::Unset) && is_context_command {
            Self::UnsetContext {
                name: words.get(1).map(|n| n.to_lowercase()),
            }
        } else {
            Self::Chat
        }
    }

    pub fn is_chat(&self) -> bool {
        matches!(self, Self::Chat)
    }
}

/// Result of running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Answer the sender with this text; nothing else happens
    Reply(String),
    /// Continue with model selection and window assembly
    Chat,
}

/// Format the `!contexts` listing.
pub fn format_listing(contexts: &[NamedContext]) -> String {
    if contexts.is_empty() {
        return "No contexts are defined yet. Add one with `!set context <name> <value>`.".into();
    }
    let mut listing = String::from("Available contexts:\n");
    for context in contexts {
        listing.push_str(&format!("- `!{}`: {}\n", context.name, context.value));
    }
    listing
}

/// Executes control commands against the context catalog.
pub struct CommandRouter {
    bot_name: String,
    catalog: Arc<dyn ContextCatalog>,
    admin: Arc<dyn AdminCheck>,
}

impl CommandRouter {
    pub fn new(
        bot_name: impl Into<String>,
        catalog: Arc<dyn ContextCatalog>,
        admin: Arc<dyn AdminCheck>,
    ) -> Self {
        Self {
            bot_name: bot_name.into(),
            catalog,
            admin,
        }
    }

    /// Route and run. Only catalog failures are errors; denials and bad
    /// arguments are replies.
    pub async fn dispatch(
        &self,
        sender: &Sender,
        parsed: &ParsedMessage,
    ) -> Result<Routed, StoreError> {
        let command = Command::route(parsed);
        debug!(?command, sender = %sender.email, "Routed message");

        let reply = match command {
            Command::Chat => return Ok(Routed::Chat),
            Command::Help => help_text(&self.bot_name),
            Command::ListContexts => format_listing(&self.catalog.list_all().await?),
            Command::Me => NOT_IMPLEMENTED_REPLY.to_string(),
            Command::SetContext { name, value } => {
                if !self.admin.is_admin(sender).await {
                    info!(sender = %sender.email, "Denied !set context");
                    return Ok(Routed::Reply(DENIED_REPLY.into()));
                }
                let (Some(name), Some(value)) = (name, value) else {
                    return Ok(Routed::Reply(SET_USAGE_REPLY.into()));
                };
                self.set_context(sender, &name, &value).await?
            }
            Command::UnsetContext { name } => {
                if !self.admin.is_admin(sender).await {
                    info!(sender = %sender.email, "Denied !unset context");
                    return Ok(Routed::Reply(DENIED_REPLY.into()));
                }
                let Some(name) = name else {
                    return Ok(Routed::Reply(UNSET_USAGE_REPLY.into()));
                };
                self.unset_context(sender, &name).await?
            }
        };

        Ok(Routed::Reply(reply))
    }

    async fn set_context(
        &self,
        sender: &Sender,
        name: &str,
        value: &str,
    ) -> Result<String, StoreError> {
        if !self.catalog.upsert(name, value).await? {
            return Ok(format!(
                "Sorry, you can't set context for {name}: it is a reserved name"
            ));
        }
        info!(name, sender = %sender.email, "Context set");
        Ok(format!("I have set !{name} to: {value}"))
    }

    async fn unset_context(&self, sender: &Sender, name: &str) -> Result<String, StoreError> {
        if !self.catalog.delete(name).await? {
            return Ok(format!(
                "Sorry, you can't unset context for {name}: it is a reserved name"
            ));
        }
        info!(name, sender = %sender.email, "Context unset");
        Ok(format!("I have unset !{name}"))
    }
}
