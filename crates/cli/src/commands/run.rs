//! `zulipgpt run` — Connect to Zulip and answer messages until interrupted.

use super::{Transport, build_pipeline};
use std::sync::Arc;
use tracing::info;
use zulipgpt_channels::ZulipChannel;
use zulipgpt_config::AppConfig;
use zulipgpt_core::channel::{BotIdentity, Channel};

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.require_api_key()?;
    let credentials = config.zulip.credentials()?;

    let channel = Arc::new(ZulipChannel::new(
        &credentials,
        config.permissions.set_context,
    ));
    let profile = channel
        .verify()
        .await
        .map_err(|e| format!("Zulip rejected the bot credentials: {e}"))?;
    info!(
        site = %credentials.site,
        email = %profile.email,
        user_id = profile.user_id,
        "Connected to Zulip"
    );

    let catalog = zulipgpt_store::open(&config.store).await?;
    let bot = BotIdentity::new(&config.bot.name, channel.email());
    let pipeline = build_pipeline(
        &config,
        bot,
        Transport {
            channel: channel.clone(),
            history: channel.clone(),
            admin: channel.clone(),
        },
        catalog,
    )?;

    let rx = channel.start().await?;
    info!(bot = %config.bot.name, "Listening for messages (Ctrl+C to stop)");

    tokio::select! {
        result = pipeline.run(rx) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    channel.stop().await?;
    Ok(())
}
