use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Upstream section has a URL and credentials (presence enforced by serde)
/// - Server port is not 0
/// - Sync batch size is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.upstream.api_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "upstream.api_url cannot be empty".to_string(),
        ));
    }

    if config.sync.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "sync.batch_size cannot be 0".to_string(),
        ));
    }

    Ok(())
}
