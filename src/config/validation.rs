use crate::config::types::{
    ContentFilterKind, CrawlConfig, DispatcherConfig, LlmConfig, MarkdownConfig, PruningConfig,
    RateLimiterConfig, ThresholdKind,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// This is the fatal error gate of the system: any problem found here
/// surfaces before a single fetch is issued. Per-page failures later in the
/// crawl are never fatal.
pub fn validate(config: &CrawlConfig) -> Result<(), ConfigError> {
    validate_start_url(&config.start_url)?;
    validate_dispatcher(&config.dispatcher)?;
    validate_rate_limiter(&config.rate_limiter)?;
    validate_markdown(&config.markdown)?;

    match config.content_filter {
        ContentFilterKind::Pruning => validate_pruning(&config.pruning)?,
        ContentFilterKind::Bm25 => {
            if config.bm25.threshold < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "bm25 threshold must be non-negative, got {}",
                    config.bm25.threshold
                )));
            }
        }
        ContentFilterKind::Llm => validate_llm(&config.llm)?,
        ContentFilterKind::None => {}
    }

    Ok(())
}

fn validate_start_url(start_url: &str) -> Result<(), ConfigError> {
    if start_url.is_empty() {
        return Err(ConfigError::Validation(
            "start-url is required".to_string(),
        ));
    }

    let url = Url::parse(start_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start-url '{}': {}", start_url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "start-url must be http or https, got scheme '{}'",
            url.scheme()
        )));
    }

    Ok(())
}

fn validate_dispatcher(config: &DispatcherConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if config.memory_threshold_percent <= 0.0 || config.memory_threshold_percent > 100.0 {
        return Err(ConfigError::Validation(format!(
            "memory-threshold-percent must be in (0, 100], got {}",
            config.memory_threshold_percent
        )));
    }

    if config.check_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "check-interval-ms must be at least 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_rate_limiter(config: &RateLimiterConfig) -> Result<(), ConfigError> {
    let (min, max) = config.base_delay_ms;
    if min > max {
        return Err(ConfigError::Validation(format!(
            "base-delay-ms range is inverted: [{}, {}]",
            min, max
        )));
    }

    if config.max_delay_ms < max {
        return Err(ConfigError::Validation(format!(
            "max-delay-ms ({}) must not be below the base delay ceiling ({})",
            config.max_delay_ms, max
        )));
    }

    Ok(())
}

fn validate_markdown(config: &MarkdownConfig) -> Result<(), ConfigError> {
    // A wrap width under 20 chars produces degenerate output
    if config.body_width != 0 && config.body_width < 20 {
        return Err(ConfigError::Validation(format!(
            "body-width must be 0 (no wrapping) or at least 20, got {}",
            config.body_width
        )));
    }

    Ok(())
}

fn validate_pruning(config: &PruningConfig) -> Result<(), ConfigError> {
    if config.threshold <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "pruning threshold must be positive, got {}",
            config.threshold
        )));
    }

    if config.threshold_type == ThresholdKind::Fixed && config.threshold > 1.0 {
        return Err(ConfigError::Validation(format!(
            "fixed pruning threshold must be at most 1.0, got {}",
            config.threshold
        )));
    }

    Ok(())
}

fn validate_llm(config: &LlmConfig) -> Result<(), ConfigError> {
    if config.chunk_token_threshold == 0 {
        return Err(ConfigError::Validation(
            "chunk-token-threshold must be at least 1".to_string(),
        ));
    }

    resolve_llm_token(config).map(|_| ())
}

/// Resolves the API credential for the LLM filter
///
/// An explicit token wins; otherwise the `<PROVIDER>_API_KEY` environment
/// variable is consulted, where `<PROVIDER>` is the uppercased part of the
/// provider identifier before the first `/` (e.g. `OPENAI_API_KEY` for
/// "openai/gpt-4o", `GROQ_API_KEY` for "groq/llama-3.1-70b").
pub fn resolve_llm_token(config: &LlmConfig) -> Result<String, ConfigError> {
    if let Some(token) = &config.api_token {
        if !token.is_empty() {
            return Ok(token.clone());
        }
    }

    let env_var = llm_token_env_var(&config.provider);
    match std::env::var(&env_var) {
        Ok(token) if !token.is_empty() => Ok(token),
        _ => Err(ConfigError::MissingCredential {
            provider: config.provider.clone(),
            env_var,
        }),
    }
}

/// Derives the credential environment variable name for a provider
pub fn llm_token_env_var(provider: &str) -> String {
    let prefix = provider.split('/').next().unwrap_or(provider);
    format!("{}_API_KEY", prefix.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::CrawlConfig;

    fn create_test_config() -> CrawlConfig {
        CrawlConfig::new("https://example.com/")
    }

    #[test]
    fn test_valid_default_config() {
        let config = create_test_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_start_url() {
        let config = CrawlConfig::default();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_start_url_scheme() {
        let config = CrawlConfig::new("ftp://example.com/");
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = create_test_config();
        config.dispatcher.max_concurrent = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_excessive_concurrency_rejected() {
        let mut config = create_test_config();
        config.dispatcher.max_concurrent = 500;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_memory_threshold_bounds() {
        let mut config = create_test_config();
        config.dispatcher.memory_threshold_percent = 0.0;
        assert!(validate(&config).is_err());

        config.dispatcher.memory_threshold_percent = 120.0;
        assert!(validate(&config).is_err());

        config.dispatcher.memory_threshold_percent = 85.0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_inverted_delay_range_rejected() {
        let mut config = create_test_config();
        config.rate_limiter.base_delay_ms = (3000, 1000);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_max_delay_below_base_rejected() {
        let mut config = create_test_config();
        config.rate_limiter.base_delay_ms = (1000, 3000);
        config.rate_limiter.max_delay_ms = 2000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_narrow_body_width_rejected() {
        let mut config = create_test_config();
        config.markdown.body_width = 5;
        assert!(validate(&config).is_err());

        config.markdown.body_width = 0;
        assert!(validate(&config).is_ok());

        config.markdown.body_width = 80;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_fixed_pruning_threshold_above_one_rejected() {
        let mut config = create_test_config();
        config.content_filter = ContentFilterKind::Pruning;
        config.pruning.threshold = 1.5;
        config.pruning.threshold_type = ThresholdKind::Fixed;
        assert!(validate(&config).is_err());

        // Dynamic thresholds scale the page mean, so > 1 is meaningful
        config.pruning.threshold_type = ThresholdKind::Dynamic;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_llm_filter_requires_credential() {
        let mut config = create_test_config();
        config.content_filter = ContentFilterKind::Llm;
        config.llm.provider = "nosuchprovider/model-x".to_string();
        config.llm.api_token = None;

        // The NOSUCHPROVIDER_API_KEY variable is not set
        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ConfigError::MissingCredential { .. })
        ));
    }

    #[test]
    fn test_llm_filter_accepts_explicit_token() {
        let mut config = create_test_config();
        config.content_filter = ContentFilterKind::Llm;
        config.llm.api_token = Some("sk-test".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_token_env_var_derivation() {
        assert_eq!(llm_token_env_var("openai/gpt-4o"), "OPENAI_API_KEY");
        assert_eq!(llm_token_env_var("groq/llama-3.1-70b"), "GROQ_API_KEY");
        assert_eq!(llm_token_env_var("bare"), "BARE_API_KEY");
    }
}
