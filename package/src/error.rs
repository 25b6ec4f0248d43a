//! Error types for the recipe library

use thiserror::Error;

/// Result type alias for recipe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Recipe errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Invalid version range: {0}")]
    InvalidVersionRange(String),

    #[error("Unknown version {version} for {package}")]
    UnknownVersion { package: String, version: String },

    #[error("Failed to parse condition '{input}': {reason}")]
    ConditionParse { input: String, reason: String },

    #[error("Unknown variant '{variant}' for {package}")]
    UnknownVariant { package: String, variant: String },

    #[error("Condition references undeclared variant: {0}")]
    UndeclaredVariant(String),

    #[error("Invalid value '{value}' for variant {variant}: {reason}")]
    InvalidVariantValue {
        variant: String,
        value: String,
        reason: String,
    },

    #[error("Variant {variant} is not applicable: requires {condition}")]
    VariantNotApplicable { variant: String, condition: String },

    #[error("Conflict '{constraint}': {message}")]
    Conflict { constraint: String, message: String },

    #[error("Requirement '{requirement}' not met: {message}")]
    RequirementNotMet { requirement: String, message: String },

    #[error("Dependency {package} {found} does not satisfy {required}")]
    UnsatisfiedDependency {
        package: String,
        required: String,
        found: String,
    },

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Build failed for {package}: {message}")]
    BuildFailed { package: String, message: String },

    #[error("Build tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Walk directory error: {0}")]
    WalkDirError(#[from] walkdir::Error),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
