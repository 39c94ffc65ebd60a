//! `zulipgpt check` — Validate configuration, tokenizer, store and credentials.

use std::path::Path;
use zulipgpt_agent::{ModelSelector, TiktokenCounter};
use zulipgpt_channels::ZulipChannel;
use zulipgpt_config::{AppConfig, ConfigError};
use zulipgpt_core::Provider;
use zulipgpt_core::context::ContextCatalog;

pub async fn run(
    path: &Path,
    loaded: Result<AppConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("zulipgpt check");
    println!("==============\n");

    let config = match loaded {
        Ok(config) => {
            if path.exists() {
                println!("  ✅ Config file valid: {}", path.display());
            } else {
                println!("  ⚠️  No config file at {}, using defaults and environment", path.display());
            }
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            return Err("configuration check failed".into());
        }
    };

    let mut issues = 0;

    match ModelSelector::new(config.model.default_model.as_deref()) {
        Ok(selector) => println!("  ✅ Default model: {}", selector.default_model().name),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    match TiktokenCounter::new() {
        Ok(_) => println!("  ✅ Tokenizer loaded"),
        Err(e) => {
            println!("  ❌ Tokenizer unavailable: {e}");
            issues += 1;
        }
    }

    match zulipgpt_store::open(&config.store).await {
        Ok(catalog) => match catalog.list_all().await {
            Ok(contexts) => println!(
                "  ✅ Context store ({}): {} context(s)",
                catalog.name(),
                contexts.len()
            ),
            Err(e) => {
                println!("  ❌ Context store unreadable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Context store failed to open: {e}");
            issues += 1;
        }
    }

    match zulipgpt_providers::build_from_config(&config) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Completion API reachable"),
            Ok(false) => println!("  ⚠️  Completion API answered but reported unhealthy"),
            Err(e) => {
                println!("  ❌ Completion API: {e}");
                issues += 1;
            }
        },
        Err(_) => {
            println!("  ❌ No API key: set OPENAI_API_KEY or openai.api_key");
            issues += 1;
        }
    }

    match config.zulip.credentials() {
        Ok(credentials) => {
            let channel = ZulipChannel::new(&credentials, config.permissions.set_context);
            match channel.verify().await {
                Ok(profile) => println!(
                    "  ✅ Zulip: signed in as {} on {}",
                    profile.email, credentials.site
                ),
                Err(e) => {
                    println!("  ❌ Zulip rejected the bot credentials: {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ❌ Zulip credentials incomplete: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
        Ok(())
    } else {
        println!("  {issues} issue(s) found. See above for details.");
        Err(format!("{issues} check(s) failed").into())
    }
}
