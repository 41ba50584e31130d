//! Configuration validation.

use url::Url;

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_upstream(config, &mut result);
        Self::validate_render(config, &mut result);
        Self::validate_gate(config, &mut result);

        Ok(result)
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_upstream(config: &Config, result: &mut ValidationResult) {
        match Url::parse(&config.upstream.url) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(ValidationError::new(
                        "upstream.url",
                        format!("Unsupported scheme '{}'", url.scheme()),
                    ));
                }
            }
            Err(e) => {
                result.add_error(ValidationError::new(
                    "upstream.url",
                    format!("Not a valid URL: {}", e),
                ));
            }
        }
    }

    fn validate_render(config: &Config, result: &mut ValidationResult) {
        if Url::parse(&config.render.devtools_url).is_err() {
            result.add_error(ValidationError::new(
                "render.devtools_url",
                "Not a valid URL",
            ));
        }

        if config.render.content_types.is_empty() {
            result.add_error(ValidationError::new(
                "render.content_types",
                "At least one content type is required",
            ));
        }

        if config.render.content_types.iter().any(|t| t.is_empty()) {
            result.add_error(ValidationError::new(
                "render.content_types",
                "Empty entries match every response",
            ));
        }

        if let Some(scheme) = &config.render.forced_scheme {
            if scheme != "http" && scheme != "https" {
                result.add_error(ValidationError::new(
                    "render.forced_scheme",
                    "Must be \"http\" or \"https\"",
                ));
            }
        }

        if config.render.navigation_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "render.navigation_timeout_secs",
                "Timeout must be greater than 0",
            ));
        }

        if config.render.navigation_timeout_secs > 300 {
            result.add_warning(ValidationWarning::new(
                "render.navigation_timeout_secs",
                "Timeout above 300s holds client connections open for a long time",
            ));
        }

        if config.render.max_body_bytes == 0 {
            result.add_error(ValidationError::new(
                "render.max_body_bytes",
                "Body limit must be greater than 0",
            ));
        }
    }

    fn validate_gate(config: &Config, result: &mut ValidationResult) {
        if config.gate.enabled && !config.gate.uri.starts_with('/') {
            result.add_error(ValidationError::new(
                "gate.uri",
                "Gate URI must be an absolute path",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
