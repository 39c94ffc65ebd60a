//! `zulipgpt init` — Write a default config file.

use std::path::Path;
use zulipgpt_config::AppConfig;

pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        println!("⚠️  Config already exists at: {}", path.display());
        println!("   Edit it manually or delete it and re-run init.");
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    println!("✅ Created {}", path.display());
    println!("\nNext steps:");
    println!("   1. Set OPENAI_API_KEY (or openai.api_key)");
    println!("   2. Point zulip.zuliprc at the bot's .zuliprc, or set ZULIP_SITE / ZULIP_EMAIL / ZULIP_API_KEY");
    println!("   3. Run: zulipgpt check && zulipgpt run");

    Ok(())
}
