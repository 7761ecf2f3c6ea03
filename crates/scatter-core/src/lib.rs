//! Chunked multi-provider storage engine.
//!
//! Files are split into fixed-size chunks and scattered across storage
//! providers; a SQLite manifest is the sole source of truth for what
//! exists and where it lives. Versions are immutable snapshots of a
//! file's chunk set, and a version becomes visible only once every one
//! of its chunks is durably written.

pub mod chunker;
pub mod config;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod placement;
pub mod provider;
pub mod types;

pub use config::ScatterConfig;
pub use engine::{CancelFlag, EngineOptions, StorageEngine};
pub use error::{Result, ScatterError};
pub use manifest::ManifestDb;
pub use provider::{ProviderAdapter, ProviderHandle};
pub use types::{ChunkHash, FileRecord, ProviderInfo, ProviderType, VersionRecord};
