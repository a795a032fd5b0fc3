use crate::config::Config;
use crate::error::{AgentError, Result};
use crate::providers::{MistralProvider, OpenAiProvider};
use crate::traits::Provider;
use std::sync::Arc;

pub fn create_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let provider_name = config.provider.as_deref().unwrap_or("openai");

    match provider_name.to_lowercase().as_str() {
        "openai" => {
            let api_key = resolve_api_key_with_fallback(
                &["OPENAI_API_KEY", "TABQ_OPENAI_API_KEY"],
                &config.api_key,
            )?;
            let mut provider = OpenAiProvider::new(api_key)
                .with_model(config.model.clone())
                .with_temperature(config.temperature);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        "mistral" => {
            let api_key = resolve_api_key_with_fallback(
                &["MISTRAL_API_KEY", "TABQ_MISTRAL_API_KEY"],
                &config.api_key,
            )?;
            let mut provider = MistralProvider::new(api_key)
                .with_model(config.model.clone())
                .with_temperature(config.temperature);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        _ => Err(AgentError::Config(format!(
            "Unknown provider: {}. Available: openai, mistral",
            provider_name
        ))),
    }
}

fn resolve_api_key_with_fallback(env_vars: &[&str], config_key: &str) -> Result<String> {
    for var_name in env_vars {
        if let Ok(key) = std::env::var(var_name)
            && !key.is_empty()
        {
            return Ok(key);
        }
    }
    if !config_key.is_empty() {
        Ok(config_key.to_string())
    } else {
        Err(AgentError::Config(format!(
            "No API key found: set {} or add api_key to the config file",
            env_vars[0]
        )))
    }
}
