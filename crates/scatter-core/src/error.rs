use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScatterError {
    // IO
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Config
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found at {0} — run `scatter init` first")]
    ConfigNotFound(String),

    // Providers
    #[error("no live storage providers available")]
    NoProvidersAvailable,

    #[error("provider '{provider}' unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("Invalid provider type: {0}")]
    InvalidProviderType(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(i64),

    // Transfer
    #[error("chunk {index} upload failed after retries: {reason}")]
    ChunkUploadFailed { index: u32, reason: String },

    #[error("upload cancelled by caller")]
    Cancelled,

    // Integrity
    #[error("checksum mismatch for {0}: expected {1}, got {2}")]
    ChecksumMismatch(String, String, String),

    #[error("missing chunk {1} of version {0}")]
    MissingChunk(i64, u32),

    // Manifest
    #[error("version {0} incomplete: {1}")]
    IncompleteVersion(i64, String),

    #[error("version not found: {0}")]
    VersionNotFound(i64),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Database
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    // Serialization
    #[error("TOML deserialization error: {0}")]
    TomlDe(String),

    #[error("TOML serialization error: {0}")]
    TomlSer(String),
}

pub type Result<T> = std::result::Result<T, ScatterError>;
