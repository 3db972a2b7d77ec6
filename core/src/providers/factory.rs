use crate::config::Config;
use crate::providers::{OpenAiTransport, RetryPolicy, RetryingProvider, SamplingParams};
use crate::traits::Provider;
use std::sync::Arc;
use std::time::Duration;

const API_KEY_ENV_VARS: &[&str] = &["RELAY_API_KEY", "OPENAI_API_KEY"];

pub fn create_provider(config: &Config) -> Arc<dyn Provider> {
    let mut transport = OpenAiTransport::new(config.api_url.clone())
        .with_model(config.model.clone())
        .with_timeout(Duration::from_secs(config.timeout_secs))
        .with_sampling(SamplingParams {
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        });

    match resolve_api_key(API_KEY_ENV_VARS, &config.api_key) {
        Some(api_key) => transport = transport.with_api_key(api_key),
        None => tracing::debug!("No API key configured, sending unauthenticated requests"),
    }

    let policy = RetryPolicy::default().with_max_retries(config.max_retries);
    Arc::new(RetryingProvider::new(transport).with_policy(policy))
}

fn resolve_api_key(env_vars: &[&str], config_key: &str) -> Option<String> {
    env_vars
        .iter()
        .find_map(|var_name| std::env::var(var_name).ok().filter(|key| !key.is_empty()))
        .or_else(|| (!config_key.is_empty()).then(|| config_key.to_string()))
}
