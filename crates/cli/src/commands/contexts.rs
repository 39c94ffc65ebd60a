//! `zulipgpt contexts` — Manage the context catalog without a running bot.

use zulipgpt_agent::command::format_listing;
use zulipgpt_config::AppConfig;
use zulipgpt_core::context::{ContextCatalog, normalize_name};

pub async fn list(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = zulipgpt_store::open(&config.store).await?;
    print!("{}", format_listing(&catalog.list_all().await?));
    Ok(())
}

pub async fn set(config: &AppConfig, name: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = zulipgpt_store::open(&config.store).await?;
    let name = normalize_name(name);
    if !catalog.upsert(&name, value).await? {
        return Err(format!("'{name}' is a reserved name and can't be used for a context").into());
    }
    println!("Set !{name} to: {value}");
    Ok(())
}

pub async fn unset(config: &AppConfig, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = zulipgpt_store::open(&config.store).await?;
    let name = normalize_name(name);
    if !catalog.delete(&name).await? {
        return Err(format!("'{name}' is a reserved name and can't be removed").into());
    }
    println!("Unset !{name}");
    Ok(())
}
