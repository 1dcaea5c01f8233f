//! Configuration validation for the PETSI gateway.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use thiserror::Error;

use crate::config::{
    AuthConfig, Config, GatewayConfig, ObservabilityConfig, SessionConfig, UpstreamConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

/// Longest accepted chatbot session lifetime (one day).
pub const MAX_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Longest accepted access token lifetime (one year).
pub const MAX_TOKEN_EXPIRE_MINUTES: u64 = 365 * 24 * 60;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const VALID_LOG_FORMATS: &[&str] = &["json", "pretty"];

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let results = [
            self.gateway.validate(),
            self.upstream.validate(),
            self.session.validate(),
            self.auth.validate(),
            self.observability.validate(),
        ];

        let mut errors: Vec<ValidationError> =
            results.into_iter().filter_map(Result::err).collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load (with environment overrides) and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for GatewayConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "gateway.port".into(),
            });
        }
        if self.host.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "gateway.host".into(),
            });
        }
        Ok(())
    }
}

impl Validate for UpstreamConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "upstream.base_url".into(),
            });
        }

        let url = url::Url::parse(&self.base_url).map_err(|e| ValidationError::InvalidValue {
            field: "upstream.base_url".into(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidValue {
                field: "upstream.base_url".into(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        for (field, secs) in [
            ("upstream.short_timeout_secs", self.short_timeout_secs),
            ("upstream.standard_timeout_secs", self.standard_timeout_secs),
            ("upstream.long_timeout_secs", self.long_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    reason: "timeout must be greater than 0".into(),
                });
            }
        }

        if self.max_upload_bytes == 0 {
            return Err(ValidationError::InvalidValue {
                field: "upstream.max_upload_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for SessionConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.ttl_secs == 0 || self.ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ValidationError::InvalidValue {
                field: "session.ttl_secs".into(),
                reason: format!("must be between 1 and {MAX_SESSION_TTL_SECS}"),
            });
        }
        if self.cookie_name.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "session.cookie_name".into(),
            });
        }
        Ok(())
    }
}

impl Validate for AuthConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.access_token_expire_minutes == 0
            || self.access_token_expire_minutes > MAX_TOKEN_EXPIRE_MINUTES
        {
            return Err(ValidationError::InvalidValue {
                field: "auth.access_token_expire_minutes".into(),
                reason: format!("must be between 1 and {MAX_TOKEN_EXPIRE_MINUTES}"),
            });
        }

        for (i, user) in self.users.iter().enumerate() {
            if user.username.trim().is_empty() {
                return Err(ValidationError::MissingField {
                    field: format!("auth.users[{i}].username"),
                });
            }
            if user.password.is_none() && user.password_hash.is_none() {
                return Err(ValidationError::MissingField {
                    field: format!("auth.users[{i}].password"),
                });
            }
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", VALID_LOG_LEVELS.join(", ")),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.log_format.as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", VALID_LOG_FORMATS.join(", ")),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_http_upstream() {
        let mut config = Config::default();
        config.upstream.base_url = "ftp://files.example.com".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let session = SessionConfig {
            ttl_secs: 0,
            ..Default::default()
        };
        assert!(session.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_lifetimes() {
        let session = SessionConfig {
            ttl_secs: u64::MAX,
            ..Default::default()
        };
        assert!(session.validate().is_err());

        let session = SessionConfig {
            ttl_secs: MAX_SESSION_TTL_SECS,
            ..Default::default()
        };
        assert!(session.validate().is_ok());

        let auth = AuthConfig {
            access_token_expire_minutes: MAX_TOKEN_EXPIRE_MINUTES + 1,
            ..Default::default()
        };
        assert!(matches!(
            auth.validate(),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_user_without_password() {
        let auth = AuthConfig {
            users: vec![UserConfig {
                id: 1,
                username: "admin@gmail.com".into(),
                full_name: "Admin".into(),
                password: None,
                password_hash: None,
                active: true,
            }],
            ..Default::default()
        };
        assert!(matches!(
            auth.validate(),
            Err(ValidationError::MissingField { .. })
        ));
    }

    #[test]
    fn test_collects_multiple_errors() {
        let mut config = Config::default();
        config.gateway.port = 0;
        config.observability.log_level = "loud".into();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Multiple(errors)) if errors.len() == 2
        ));
    }
}
