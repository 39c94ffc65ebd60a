//! # zulipgpt Core
//!
//! Domain types, capability traits, and error definitions for the zulipgpt
//! chat assistant. This crate has **zero framework dependencies**: it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping the transport, store, or completion backend via configuration
//! - Testing the message pipeline with fakes
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod channel;
pub mod context;

// Re-export key types at crate root for ergonomics
pub use error::{ChannelError, ProviderError, StoreError};
pub use message::{ChatTurn, Role};
pub use provider::{CompletionRequest, CompletionResponse, Provider, Usage};
pub use channel::{
    AdminCheck, BotIdentity, Channel, HistoryEntry, HistoryQuery, HistoryScope, HistorySource,
    IncomingMessage, Recipient, Sender,
};
pub use context::{ContextCatalog, NamedContext, RESERVED_CONTEXT_NAMES, is_reserved, normalize_name};
