use thiserror::Error;

use crate::contracts::Operation;
use crate::types::AdapterKind;

#[derive(Error, Debug)]
pub enum JobFlowError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Adapter error: {message}")]
    Adapter { message: String },

    /// Two adapters claimed the same platform key. Registration-time, fatal.
    #[error("duplicate platform key '{key}': already registered as '{existing}'")]
    DuplicateKey { key: String, existing: String },

    /// A constructed adapter does not expose every operation its declared
    /// kind requires. Registration-time, fatal to that one registration.
    #[error(
        "adapter '{key}' does not satisfy the {kind} contract; missing operations: {}",
        Operation::join(missing)
    )]
    ContractViolation {
        key: String,
        kind: AdapterKind,
        missing: Vec<Operation>,
    },

    /// An enabled platform key has no registry entry. Configuration-time,
    /// fatal pre-flight: raised before any browser or network resource exists.
    #[error("unknown platform '{key}'; valid platforms: {}", valid.join(", "))]
    UnknownPlatform { key: String, valid: Vec<String> },

    /// Operator declined a semi-auto submission. Recoverable: the run
    /// records a non-submission and moves to the next job.
    #[error("operator declined submission for '{job}'")]
    HumanAbort { job: String },
}

pub type Result<T> = std::result::Result<T, JobFlowError>;
