//! `zulipgpt chat` — Talk to the pipeline from the terminal.
//!
//! Each line is a private message from the local user, who may manage
//! contexts. History is the transcript of the current session.

use super::{Transport, build_pipeline};
use std::io::Write;
use std::sync::Arc;
use zulipgpt_agent::{MessagePipeline, Outcome};
use zulipgpt_channels::CliChannel;
use zulipgpt_config::AppConfig;
use zulipgpt_core::channel::{BotIdentity, Channel};

const BOT_EMAIL: &str = "zulipgpt@localhost";

pub async fn run(config: AppConfig, message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    config.require_api_key()?;

    let channel = Arc::new(
        CliChannel::new(BOT_EMAIL).with_transcript_limit(config.history.max_messages),
    );
    let catalog = zulipgpt_store::open(&config.store).await?;
    let bot = BotIdentity::new(&config.bot.name, BOT_EMAIL);
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

    if let Some(text) = message {
        let incoming = channel.record_input(&text).await;
        if let Outcome::Replied(reply) = pipeline.respond(&incoming).await {
            println!("{reply}");
        }
        return Ok(());
    }

    interactive(&config, &channel, &pipeline).await
}

async fn interactive(
    config: &AppConfig,
    channel: &CliChannel,
    pipeline: &MessagePipeline,
) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║         zulipgpt — Interactive Chat          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Bot:       {}", config.bot.name);
    println!(
        "  Model:     {}",
        config.model.default_model.as_deref().unwrap_or("(built-in default)")
    );
    println!("  Contexts:  {} ({})", config.store.backend, config.store.path.display());
    println!();
    println!("  Type a message and press Enter. Try !help.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut rx = channel
        .start()
        .await
        .map_err(|e| format!("Channel error: {e}"))?;

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(result) = rx.recv().await {
        match result {
            Ok(incoming) => {
                if let Err(e) = pipeline.process(&incoming).await {
                    eprintln!("  [Error] {e}");
                }
                print!("  You > ");
                std::io::stdout().flush()?;
            }
            Err(e) => {
                eprintln!("  [Channel Error] {e}");
                break;
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
