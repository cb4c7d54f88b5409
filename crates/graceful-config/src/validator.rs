//! Configuration validation.

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
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_coordinator(config, &mut result);
        Self::validate_signal(config, &mut result);

        result
    }

    /// Validate and turn the first error into a [`ConfigError`].
    pub fn ensure_valid(config: &Config) -> Result<ValidationResult, ConfigError> {
        let result = Self::validate(config);
        match result.errors.first() {
            Some(error) => Err(ConfigError::InvalidValue {
                field: error.path.clone(),
                message: error.message.clone(),
            }),
            None => Ok(result),
        }
    }

    fn validate_coordinator(config: &Config, result: &mut ValidationResult) {
        let coordinator = &config.coordinator;

        if coordinator.name.trim().is_empty() {
            result.add_error(ValidationError::new(
                "coordinator.name",
                "Coordinator name cannot be empty",
            ));
        }

        if coordinator.callback_timeout_secs == Some(0) {
            result.add_error(ValidationError::new(
                "coordinator.callback_timeout_secs",
                "callback_timeout_secs must be greater than 0 when set",
            ));
        }

        if !coordinator.guard_repeated_triggers {
            result.add_warning(ValidationWarning::new(
                "coordinator.guard_repeated_triggers",
                "Repeated triggers will run the shutdown sequence more than once",
            ));
        }
    }

    fn validate_signal(config: &Config, result: &mut ValidationResult) {
        let signal = &config.signal;

        if signal.signals.is_empty() {
            result.add_error(ValidationError::new(
                "signal.signals",
                "At least one signal must be configured",
            ));
        }

        for (i, sig) in signal.signals.iter().enumerate() {
            if signal.signals[..i].contains(sig) {
                result.add_warning(ValidationWarning::new(
                    "signal.signals",
                    format!("Signal {} is listed more than once", sig),
                ));
            }
        }

        if !(0..=255).contains(&signal.exit_code) {
            result.add_error(ValidationError::new(
                "signal.exit_code",
                "exit_code must be between 0 and 255",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
