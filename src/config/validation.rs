use crate::config::types::{
    Config, CrawlerConfig, FetchConfig, FetcherRuleConfig, ParserRuleConfig, SelectorConfig,
    UserAgentConfig,
};
use crate::url::{normalize_url, DomainPattern, MatchMode};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_fetch_config(&config.fetch)?;

    if let Some(cache) = &config.cache {
        if cache.database_path.is_empty() {
            return Err(ConfigError::Validation(
                "database_path cannot be empty".to_string(),
            ));
        }
    }

    if let Some(parser) = &config.parser {
        validate_selectors("parser", parser)?;
    }

    for seed in &config.seeds {
        validate_crawl_url("seed", seed)?;
    }

    validate_fetcher_rules(&config.fetcher_rules)?;
    validate_parser_rules(&config.parser_rules)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 256 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 256, got {}",
            config.workers
        )));
    }

    if config.queue_size < 1 {
        return Err(ConfigError::Validation(
            "queue_size must be >= 1".to_string(),
        ));
    }

    if config.max_urls == Some(0) {
        return Err(ConfigError::Validation(
            "max_urls must be >= 1 when set".to_string(),
        ));
    }

    if config.progress_interval == Some(0) {
        return Err(ConfigError::Validation(
            "progress_interval must be >= 1s when set".to_string(),
        ));
    }

    if config.idle_poll_interval < 10 {
        return Err(ConfigError::Validation(format!(
            "idle_poll_interval must be >= 10ms, got {}ms",
            config.idle_poll_interval
        )));
    }

    for known in &config.known_urls {
        validate_crawl_url("known", known)?;
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout < 1 || config.connect_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "fetch timeouts must be >= 1s, got timeout={}s connect_timeout={}s",
            config.timeout, config.connect_timeout
        )));
    }

    Ok(())
}

fn validate_fetcher_rules(rules: &[FetcherRuleConfig]) -> Result<(), ConfigError> {
    for rule in rules {
        validate_rule_pattern(&rule.pattern, rule.mode)?;

        if rule.timeout == Some(0) {
            return Err(ConfigError::Validation(format!(
                "fetcher rule '{}' timeout must be >= 1s",
                rule.pattern
            )));
        }

        if matches!(&rule.user_agent, Some(ua) if ua.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "fetcher rule '{}' user-agent cannot be empty",
                rule.pattern
            )));
        }
    }
    Ok(())
}

fn validate_parser_rules(rules: &[ParserRuleConfig]) -> Result<(), ConfigError> {
    for rule in rules {
        validate_rule_pattern(&rule.pattern, rule.mode)?;
        validate_selectors(&rule.pattern, &rule.selectors)?;
    }
    Ok(())
}

/// Checks that a rule pattern compiles in its match mode
fn validate_rule_pattern(pattern: &str, mode: MatchMode) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    DomainPattern::compile(pattern, mode)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern(e.to_string()))
}

fn validate_selectors(owner: &str, config: &SelectorConfig) -> Result<(), ConfigError> {
    for (name, css) in &config.fields {
        Selector::parse(css).map_err(|e| {
            ConfigError::InvalidSelector(format!("{} field '{}' ({}): {}", owner, name, css, e))
        })?;
    }

    for required in &config.required {
        if !config.fields.contains_key(required) {
            return Err(ConfigError::Validation(format!(
                "{} requires field '{}' which has no selector",
                owner, required
            )));
        }
    }

    Ok(())
}

/// Checks that an address is crawlable (http or https with a host)
fn validate_crawl_url(kind: &str, url: &str) -> Result<(), ConfigError> {
    normalize_url(url)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} URL '{}': {}", kind, url, e)))
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn selectors(fields: &[(&str, &str)], required: &[&str]) -> SelectorConfig {
        SelectorConfig {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            required: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_validate_rule_pattern() {
        assert!(validate_rule_pattern("example.com", MatchMode::Exact).is_ok());
        assert!(validate_rule_pattern("*.example.com", MatchMode::Glob).is_ok());
        assert!(validate_rule_pattern(r"^shop\.", MatchMode::Regex).is_ok());

        assert!(validate_rule_pattern("", MatchMode::Exact).is_err());
        assert!(validate_rule_pattern("node[0-9", MatchMode::Glob).is_err());
        assert!(validate_rule_pattern("(open", MatchMode::Regex).is_err());
    }

    #[test]
    fn test_validate_selectors() {
        assert!(validate_selectors("parser", &selectors(&[("title", "h1")], &["title"])).is_ok());
        assert!(matches!(
            validate_selectors("parser", &selectors(&[("title", "h1[")], &[])),
            Err(ConfigError::InvalidSelector(_))
        ));
        assert!(matches!(
            validate_selectors("parser", &selectors(&[("title", "h1")], &["price"])),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_crawl_url() {
        assert!(validate_crawl_url("seed", "https://example.com/").is_ok());
        assert!(validate_crawl_url("seed", "http://example.com").is_ok());
        assert!(validate_crawl_url("seed", "ftp://example.com/").is_err());
        assert!(validate_crawl_url("seed", "not a url").is_err());
    }

    #[test]
    fn test_validate_crawler_config() {
        assert!(validate_crawler_config(&CrawlerConfig::default()).is_ok());

        let too_many = CrawlerConfig {
            workers: 1000,
            ..CrawlerConfig::default()
        };
        assert!(validate_crawler_config(&too_many).is_err());

        let fast_poll = CrawlerConfig {
            idle_poll_interval: 1,
            ..CrawlerConfig::default()
        };
        assert!(validate_crawler_config(&fast_poll).is_err());

        let bad_known = CrawlerConfig {
            known_urls: vec!["mailto:someone@example.com".to_string()],
            ..CrawlerConfig::default()
        };
        assert!(matches!(
            validate_crawler_config(&bad_known),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }
}
