use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error-modbot-config-1 Invalid port number: {port}")]
    InvalidPortNumber { port: String },

    #[error("error-modbot-config-2 Invalid timeout value: {value}")]
    InvalidTimeout { value: String },

    #[error("error-modbot-config-3 Invalid cache size: {value}")]
    InvalidCacheSize { value: String },

    #[error("error-modbot-config-4 Invalid statsd address: {value}")]
    InvalidStatsdAddress { value: String },
}

/// Errors raised while deserializing or validating a persisted rule tree.
///
/// These are configuration errors in the error taxonomy: the stored rule set
/// is invalid and must be fixed out-of-band. They are never retried.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("error-modbot-rule-1 Unknown check referenced by rule: {name}")]
    UnknownCheck { name: String },

    #[error("error-modbot-rule-2 Malformed rule tree: {details}")]
    MalformedTree { details: String },

    #[error("error-modbot-rule-3 Invalid arguments for check {check}: {details}")]
    InvalidArgs { check: String, details: String },

    #[error("error-modbot-rule-4 Check {check} may not be used in the {rule_set} rule set")]
    CategoryMismatch { check: String, rule_set: String },

    #[error("error-modbot-rule-5 Check {check} may only appear once in a rule tree")]
    DuplicateCheck { check: String },

    #[error("error-modbot-rule-6 Check {check} is not available for this channel")]
    GatedCheck { check: String },
}

/// Errors raised while executing an individual check.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("error-modbot-check-1 Check {check} failed: {details}")]
    ExecutionFailed { check: String, details: String },

    #[error("error-modbot-check-2 Check {check} timed out after {timeout_ms}ms")]
    TimedOut { check: String, timeout_ms: u64 },

    /// The backing service has not finished computing an answer yet. The
    /// caller should surface this for upstream redelivery rather than
    /// treating it as a boolean result.
    #[error("error-modbot-check-3 Check {check} result not ready: {details}")]
    Transient { check: String, details: String },

    #[error("error-modbot-check-4 Provider call failed for check {check}: {details}")]
    ProviderFailed { check: String, details: String },
}

impl CheckError {
    /// Whether the error signals a transient condition that upstream
    /// redelivery is expected to resolve.
    pub fn is_transient(&self) -> bool {
        matches!(self, CheckError::Transient { .. })
    }
}

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("error-modbot-action-1 Action {action} failed: {details}")]
    ExecutionFailed { action: String, details: String },

    #[error("error-modbot-action-2 Action {action} requires a cast but none was provided")]
    CastRequired { action: String },

    #[error("error-modbot-action-3 Backend call failed for action {action}: {details}")]
    BackendFailed { action: String, details: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("error-modbot-storage-1 Database query failed: {source}")]
    QueryFailed {
        #[source]
        source: sqlx::Error,
    },

    #[error("error-modbot-storage-2 Invalid input: {details}")]
    InvalidInput { details: String },

    #[error("error-modbot-storage-3 Record not found: {details}")]
    NotFound { details: String },

    #[error("error-modbot-storage-4 Serialization failed: {details}")]
    SerializationFailed { details: String },
}

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("error-modbot-metrics-1 Failed to create statsd client: {details}")]
    ClientCreationFailed { details: String },
}
