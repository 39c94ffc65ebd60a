//! The zulipgpt message pipeline.
//!
//! For every incoming chat message:
//!
//! 1. **Parse** inline `!directives` out of the text
//! 2. **Route** control commands (`!help`, `!contexts`, `!set context`, ...)
//! 3. **Select** the model from the directives and the configured default
//! 4. **Build** the conversation window: system role, named contexts,
//!    as much history as the model's prompt budget allows, the user turn
//! 5. **Dispatch** the window to the completion API and post the reply
//!
//! Control commands never reach steps 3 to 5.

pub mod builder;
pub mod command;
pub mod directive;
pub mod dispatcher;
pub mod error;
pub mod help;
pub mod model;
pub mod pipeline;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use builder::{BuildRequest, ConversationBuilder, ConversationWindow};
pub use command::{Command, CommandRouter, Routed};
pub use directive::{Directive, DirectiveSet, ParsedMessage, parse};
pub use dispatcher::{API_ERROR_REPLY, ResponseDispatcher};
pub use error::{BuildError, ModelError, TokenError};
pub use help::help_text;
pub use model::{ModelProfile, ModelSelector};
pub use pipeline::{IgnoreReason, MessagePipeline, Outcome};
pub use token::{TiktokenCounter, TokenCounter};
