use crate::openai_compat::OpenAiCompatClient;
use safeagree_core::{
    ChatMessage, CompletionProvider, Error, GenerationParams, ProviderAttempt, Result,
};
use tracing::{info, warn};

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Ordered list of completion providers tried in turn until one succeeds.
///
/// Ordering encodes a cost/latency/quality tradeoff (fast-cheap model first,
/// larger fallback after), so attempts are strictly sequential; parallel
/// speculative calls would multiply cost for no correctness benefit under
/// first-success-wins semantics.
pub struct FailoverChain {
    providers: Vec<Box<dyn CompletionProvider>>,
}

impl FailoverChain {
    pub fn new(providers: Vec<Box<dyn CompletionProvider>>) -> Self {
        Self { providers }
    }

    /// Build the chain from process environment. A provider whose credential
    /// is absent is absent from the chain entirely.
    ///
    /// Priority order:
    /// 1. Groq (`GROQ_API_KEY`) - fast, cheap 8B model
    /// 2. SambaNova (`SAMBANOVA_API_KEY`) - larger 70B fallback
    /// 3. Generic OpenAI-compatible last resort
    ///    (`SAFEAGREE_OPENAI_COMPAT_BASE_URL` / `_API_KEY` / `_MODEL`)
    pub fn from_env(client: reqwest::Client) -> Self {
        let mut providers: Vec<Box<dyn CompletionProvider>> = Vec::new();

        if let Some(key) = env("GROQ_API_KEY") {
            providers.push(Box::new(OpenAiCompatClient::new(
                client.clone(),
                "groq",
                env("GROQ_BASE_URL").unwrap_or_else(|| "https://api.groq.com/openai".to_string()),
                Some(key),
                env("GROQ_MODEL").unwrap_or_else(|| "llama-3.1-8b-instant".to_string()),
            )));
        }
        if let Some(key) = env("SAMBANOVA_API_KEY") {
            providers.push(Box::new(OpenAiCompatClient::new(
                client.clone(),
                "sambanova",
                env("SAMBANOVA_BASE_URL")
                    .unwrap_or_else(|| "https://api.sambanova.ai".to_string()),
                Some(key),
                env("SAMBANOVA_MODEL")
                    .unwrap_or_else(|| "Meta-Llama-3.1-70B-Instruct".to_string()),
            )));
        }
        if let (Some(base), Some(model)) = (
            env("SAFEAGREE_OPENAI_COMPAT_BASE_URL"),
            env("SAFEAGREE_OPENAI_COMPAT_MODEL"),
        ) {
            providers.push(Box::new(OpenAiCompatClient::new(
                client,
                "openai_compat",
                base,
                env("SAFEAGREE_OPENAI_COMPAT_API_KEY"),
                model,
            )));
        }

        Self::new(providers)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Try providers in priority order; first non-empty completion wins.
    ///
    /// Failures (transport error, non-2xx, empty content, timeout) advance to
    /// the next provider with no same-provider retry. The accumulated attempt
    /// log is diagnostics only and must never reach an end user.
    pub async fn run(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String> {
        let mut attempts: Vec<ProviderAttempt> = Vec::new();

        for provider in &self.providers {
            match provider.complete(messages, params).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!(
                        provider = provider.name(),
                        chars = text.chars().count(),
                        "completion succeeded"
                    );
                    return Ok(text);
                }
                Ok(_) => {
                    warn!(provider = provider.name(), "provider returned empty content");
                    attempts.push(ProviderAttempt {
                        provider: provider.name().to_string(),
                        error: "empty completion".to_string(),
                    });
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "provider attempt failed");
                    attempts.push(ProviderAttempt {
                        provider: provider.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if attempts.is_empty() {
            attempts.push(ProviderAttempt {
                provider: "none".to_string(),
                error: "no providers configured".to_string(),
            });
        }
        Err(Error::AllProvidersExhausted(attempts))
    }
}

impl std::fmt::Debug for FailoverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverChain")
            .field("providers", &self.provider_names())
            .finish()
    }
}
