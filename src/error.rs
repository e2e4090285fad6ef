//! Unified error types for the Cloud Run component.

use thiserror::Error;

/// Unified error type for deployments.
#[derive(Error, Debug)]
pub enum DeployError {
    /// Environment configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Config file could not be read or was not a JSON object.
    #[error("failed to load config file {path}: {reason}")]
    ConfigFile {
        /// Path of the config file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Input validation error.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Engine rejected or failed a submission.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Output resolution error.
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while turning a raw configuration bag into a `ConfigInput`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent or blank.
    #[error("missing required field `{field}`")]
    MissingRequiredField {
        /// Offending field name.
        field: String,
    },

    /// A numeric field is outside the platform limits.
    #[error("`{field}` = {value} is out of range (allowed {allowed})")]
    OutOfRangeValue {
        /// Offending field name.
        field: String,
        /// The rejected value as given.
        value: String,
        /// Human readable allowed range.
        allowed: String,
    },

    /// A quantity is not `<number><unit>` with a known unit.
    #[error("`{field}` = {value:?} is not a quantity like 512Mi or 1Gi (units: Ki, Mi, Gi)")]
    MalformedQuantity {
        /// Offending field name.
        field: String,
        /// The rejected value.
        value: String,
    },

    /// A field has the wrong type.
    #[error("`{field}` must be {expected}")]
    InvalidType {
        /// Offending field name.
        field: String,
        /// Expected type description.
        expected: &'static str,
    },

    /// The image URL is not a valid container reference.
    #[error("`imageUrl` = {value:?} is not a valid container image reference")]
    InvalidImageReference {
        /// The rejected reference.
        value: String,
    },
}

impl ValidationError {
    /// Name of the field the error refers to.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingRequiredField { field }
            | ValidationError::OutOfRangeValue { field, .. }
            | ValidationError::MalformedQuantity { field, .. }
            | ValidationError::InvalidType { field, .. } => field,
            ValidationError::InvalidImageReference { .. } => "imageUrl",
        }
    }
}

/// Errors reported by a resource engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine refused a spec or registration.
    #[error("engine rejected {resource}: {diagnostic}")]
    Rejected {
        /// Resource or component name.
        resource: String,
        /// Engine diagnostic, passed through verbatim.
        diagnostic: String,
    },

    /// The engine could not be reached.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// A submitted resource failed while settling.
    #[error("resource {resource} failed: {reason}")]
    StatusFailed {
        /// Resource identity.
        resource: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Errors raised while resolving deferred outputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    /// The service settled without any status entries.
    #[error("service {resource} resolved with an empty status list")]
    EmptyStatusList {
        /// Service identity.
        resource: String,
    },

    /// The status entry carried something that is not an absolute URL.
    #[error("service {resource} reported an invalid url {value:?}")]
    InvalidUrl {
        /// Service identity.
        resource: String,
        /// The rejected value.
        value: String,
    },

    /// The engine failed to settle the dependency.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, DeployError>;
