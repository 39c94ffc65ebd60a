//! Subcommand implementations.

pub mod chat;
pub mod check;
pub mod contexts;
pub mod init;
pub mod run;

use std::sync::Arc;
use std::time::Duration;
use zulipgpt_agent::{
    CommandRouter, ConversationBuilder, MessagePipeline, ModelSelector, ResponseDispatcher,
    TiktokenCounter,
};
use zulipgpt_config::AppConfig;
use zulipgpt_core::channel::{AdminCheck, BotIdentity, Channel, HistorySource};
use zulipgpt_core::context::ContextCatalog;

/// Transport capabilities the pipeline runs against.
pub struct Transport {
    pub channel: Arc<dyn Channel>,
    pub history: Arc<dyn HistorySource>,
    pub admin: Arc<dyn AdminCheck>,
}

/// Wire the message pipeline from configuration.
pub fn build_pipeline(
    config: &AppConfig,
    bot: BotIdentity,
    transport: Transport,
    catalog: Arc<dyn ContextCatalog>,
) -> Result<MessagePipeline, Box<dyn std::error::Error>> {
    let selector = ModelSelector::new(config.model.default_model.as_deref())?;
    let counter = Arc::new(TiktokenCounter::new()?);

    let provider = zulipgpt_providers::build_from_config(config)?;
    let dispatcher = ResponseDispatcher::new(Arc::new(provider))
        .with_temperature(config.model.temperature)
        .with_timeout(Duration::from_secs(config.openai.timeout_secs));

    let builder = ConversationBuilder::new(&config.bot.role, bot.clone(), counter, transport.history)
        .with_history_limit(config.history.max_messages)
        .with_history_timeout(Duration::from_secs(config.history.timeout_secs));

    let router = CommandRouter::new(&config.bot.name, catalog.clone(), transport.admin);

    Ok(MessagePipeline::new(
        bot,
        transport.channel,
        catalog,
        router,
        selector,
        builder,
        dispatcher,
    ))
}
