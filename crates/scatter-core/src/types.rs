use serde::{Deserialize, Serialize};
use std::fmt;

/// SHA-256 digest of a chunk's content (or of a whole file).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkHash(pub [u8; 32]);

impl ChunkHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded digest string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> crate::error::Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| crate::error::ScatterError::InvalidState(format!("bad checksum: {e}")))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            crate::error::ScatterError::InvalidState("checksum must be 32 bytes".to_string())
        })?;
        Ok(ChunkHash(arr))
    }
}

impl fmt::Debug for ChunkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ChunkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Provider identity as registered in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: i64,
    pub name: String,
    pub provider_type: ProviderType,
    /// Destination root: bucket, container or base directory.
    pub root: String,
    pub region: Option<String>,
    pub weight: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    Local,
    S3,
    /// S3-compatible: MinIO, Garage, Ceph RGW, SeaweedFS, etc.
    S3Compatible,
    Azure,
    Gcs,
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::Local => write!(f, "local"),
            ProviderType::S3 => write!(f, "s3"),
            ProviderType::S3Compatible => write!(f, "s3compatible"),
            ProviderType::Azure => write!(f, "azure"),
            ProviderType::Gcs => write!(f, "gcs"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = crate::error::ScatterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(ProviderType::Local),
            "s3" => Ok(ProviderType::S3),
            "s3compatible" | "s3-compatible" | "minio" | "garage" => Ok(ProviderType::S3Compatible),
            "azure" => Ok(ProviderType::Azure),
            "gcs" => Ok(ProviderType::Gcs),
            _ => Err(crate::error::ScatterError::InvalidProviderType(
                s.to_string(),
            )),
        }
    }
}

/// Lifecycle state of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionState {
    /// Chunks are still being written; not user-visible.
    Uploading,
    /// All chunks durably written and verified.
    Complete,
    /// Aborted before ever becoming current.
    Dead,
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionState::Uploading => write!(f, "uploading"),
            VersionState::Complete => write!(f, "complete"),
            VersionState::Dead => write!(f, "dead"),
        }
    }
}

impl std::str::FromStr for VersionState {
    type Err = crate::error::ScatterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(VersionState::Uploading),
            "complete" => Ok(VersionState::Complete),
            "dead" => Ok(VersionState::Dead),
            _ => Err(crate::error::ScatterError::InvalidState(s.to_string())),
        }
    }
}

/// Where one chunk of one version lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    pub version_id: i64,
    /// Zero-based position within the version.
    pub index: u32,
    pub size: u64,
    pub checksum: ChunkHash,
    pub provider_id: i64,
    /// Opaque locator returned by the provider on write.
    pub locator: String,
}

/// One immutable snapshot of a file's chunk set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: i64,
    pub file_id: String,
    pub state: VersionState,
    pub notes: String,
    pub chunk_count: u32,
    pub total_size: u64,
    /// Whole-file SHA-256, set at commit.
    pub checksum: Option<String>,
    pub created_at: String,
    pub is_current: bool,
}

/// Logical file identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub current_version: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Row of `scatter ls`: a file plus the chunk count of its current version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileListing {
    pub id: String,
    pub name: String,
    pub chunk_count: u32,
}

/// Placement strategy selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum PlacementStrategy {
    RoundRobin,
    Weighted,
}

impl Default for PlacementStrategy {
    fn default() -> Self {
        PlacementStrategy::RoundRobin
    }
}
