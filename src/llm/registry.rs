use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, LlmConfig};
use crate::errors::{TrigWatchError, TrigWatchResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

pub const ROLE_SELECTOR: &str = "selector";
pub const ROLE_KEYWORDS: &str = "keywords";

const DEFAULT_TEMPERATURE: f64 = 0.1;

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn new(active: String) -> Self {
        Self {
            providers: HashMap::new(),
            active,
            llm_config: LlmConfig::default(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    fn active_provider(&self) -> TrigWatchResult<Arc<dyn LlmProvider>> {
        self.lookup(&self.active)
    }

    fn lookup(&self, id: &str) -> TrigWatchResult<Arc<dyn LlmProvider>> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| TrigWatchError::Config(format!("LLM provider '{id}' is not registered")))
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Provider and call settings for a planner role. An `[llm.roles.<role>]`
    /// table wins; otherwise the active provider runs with its own model.
    pub fn call_config_for_role(&self, role: &str) -> TrigWatchResult<(Arc<dyn LlmProvider>, CallConfig)> {
        let roles = &self.llm_config.roles;
        let configured = match role {
            ROLE_SELECTOR => roles.selector.as_ref(),
            ROLE_KEYWORDS => roles.keywords.as_ref(),
            _ => None,
        };

        let Some(entry) = configured else {
            let provider = self.active_provider()?;
            let (model, temperature) = self
                .llm_config
                .providers
                .get(&self.active)
                .map_or((String::new(), DEFAULT_TEMPERATURE), |p| (p.model.clone(), p.temperature));
            tracing::debug!(role, provider = %self.active, model = %model, "role uses active provider");
            return Ok((provider, CallConfig { model, temperature, json_mode: true }));
        };

        let provider = self.lookup(&entry.provider)?;
        let temperature = entry
            .temperature
            .or_else(|| self.llm_config.providers.get(&entry.provider).map(|p| p.temperature))
            .unwrap_or(DEFAULT_TEMPERATURE);
        tracing::debug!(role, provider = %entry.provider, model = %entry.model, temperature, "role configured");
        Ok((
            provider,
            CallConfig {
                model: entry.model.clone(),
                temperature,
                json_mode: true,
            },
        ))
    }

    /// Build a registry from the loaded app config.
    /// API keys are read from environment variables named `TRIGWATCH_<ID>_API_KEY`.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
            active: config.llm.active_provider.clone(),
            llm_config: config.llm.clone(),
        };
        let timeout = Duration::from_secs(config.llm.request_timeout_secs);
        for (id, entry) in &config.llm.providers {
            let api_key = std::env::var(format!("TRIGWATCH_{}_API_KEY", id.to_uppercase()))
                .unwrap_or_else(|_| entry.api_key.clone().unwrap_or_default());
            match OpenAiCompatibleProvider::new(id.clone(), entry.api_base.clone(), api_key, timeout) {
                Ok(provider) => registry.register(Arc::new(provider)),
                Err(e) => tracing::error!(provider = %id, error = %e, "failed to build provider"),
            }
        }
        registry
    }
}
