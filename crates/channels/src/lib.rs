//! Chat transport implementations for zulipgpt.
//!
//! Each channel delivers incoming messages, posts replies, serves
//! conversation history, and answers the admin check for context commands.
//!
//! Available channels:
//! - **Zulip** — Zulip REST API (event queue long-polling)
//! - **CLI** — Interactive terminal chat (stdin/stdout)

pub mod cli;
pub mod zulip;

pub use cli::CliChannel;
pub use zulip::{ZulipApi, ZulipChannel};
