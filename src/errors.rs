use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Referential integrity violated: {0}")]
    ReferentialIntegrity(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Duplicate id '{id}' in {collection}")]
    DuplicateId { collection: &'static str, id: String },

    #[error("Id '{id}' is used by both {first} and {second}")]
    SharedId { id: String, first: &'static str, second: &'static str },

    #[error("Unknown {kind} '{id}'")]
    UnknownEntity { kind: &'static str, id: String },

    #[error("Hosting chain of '{0}' contains a cycle")]
    HostingCycle(String),

    #[error("Invalid JSON model: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML model: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error reading {file}: {source}")]
    Io { file: PathBuf, source: std::io::Error },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {file}: {source}")]
    Io { file: PathBuf, source: std::io::Error },

    #[error("Malformed config {file}: {source}")]
    Toml { file: PathBuf, source: toml::de::Error },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Referential integrity violated: {0}")]
    ReferentialIntegrity(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Endpoint '{entity}' is missing required property '{property}'")]
    MissingProperty { entity: String, property: &'static str },

    #[error("Unresolved {kind} reference '{reference}'")]
    UnresolvedReference { kind: &'static str, reference: String },

    #[error("Name '{name}' sanitizes to an empty key")]
    EmptyKey { name: String },

    #[error("No free key left for candidate '{0}'")]
    KeyCollisionExhausted(String),

    #[error("Duplicate {namespace} key '{key}'")]
    DuplicateKey { namespace: &'static str, key: String },

    #[error("Template '{key}' has no type")]
    MissingTypeTag { key: String },

    #[error("Encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Model(ModelError),
}

impl From<ModelError> for ExportError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::ReferentialIntegrity(msg) => ExportError::ReferentialIntegrity(msg),
            ModelError::TypeMismatch { expected, found } => ExportError::TypeMismatch { expected, found },
            other => ExportError::Model(other),
        }
    }
}
