//! Completion API provider implementations for zulipgpt.
//!
//! All providers implement the `zulipgpt_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use std::time::Duration;
use zulipgpt_config::AppConfig;
use zulipgpt_core::error::ProviderError;

/// Build the completion provider described by the configuration.
pub fn build_from_config(config: &AppConfig) -> Result<OpenAiCompatProvider, ProviderError> {
    let api_key = config
        .openai
        .api_key
        .clone()
        .ok_or_else(|| ProviderError::NotConfigured("openai.api_key is not set".into()))?;

    Ok(OpenAiCompatProvider::with_timeout(
        "openai",
        config.openai.api_url.clone(),
        api_key,
        Duration::from_secs(config.openai.timeout_secs),
    ))
}
