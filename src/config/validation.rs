use crate::config::types::{Config, HarvestConfig, OutputConfig, SourceConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Placeholder substituted with the page number in index URL templates
pub(crate) const PAGE_PLACEHOLDER: &str = "{page}";

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_source_config(&config.source)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates harvest configuration
///
/// Also used for configurations assembled in code rather than loaded from a file.
pub fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.group_size < 1 {
        return Err(ConfigError::Validation(format!(
            "group_size must be >= 1, got {}",
            config.group_size
        )));
    }

    if config.start_page < 1 {
        return Err(ConfigError::Validation(format!(
            "start_page must be >= 1, got {}",
            config.start_page
        )));
    }

    for (name, marker) in [
        ("resume_from", &config.resume_from),
        ("stop_before", &config.stop_before),
    ] {
        if matches!(marker.as_deref(), Some("")) {
            return Err(ConfigError::Validation(format!(
                "{} cannot be empty when set",
                name
            )));
        }
    }

    if config.resume_from.is_some() && config.resume_from == config.stop_before {
        return Err(ConfigError::Validation(
            "resume_from and stop_before cannot name the same report".to_string(),
        ));
    }

    Ok(())
}

/// Validates the remote listing configuration
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    if config.index_url.matches(PAGE_PLACEHOLDER).count() != 1 {
        return Err(ConfigError::Validation(format!(
            "index_url must contain exactly one {} placeholder, got '{}'",
            PAGE_PLACEHOLDER, config.index_url
        )));
    }

    let sample = config.index_url.replace(PAGE_PLACEHOLDER, "1");
    let url = Url::parse(&sample)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid index_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "index_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.items_field.is_empty() {
        return Err(ConfigError::Validation(
            "items_field cannot be empty".to_string(),
        ));
    }

    if config.total_pages_field.is_empty() {
        return Err(ConfigError::Validation(
            "total_pages_field cannot be empty".to_string(),
        ));
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

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
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
