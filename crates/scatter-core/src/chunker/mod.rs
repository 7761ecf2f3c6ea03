use sha2::{Digest, Sha256};
use std::io::Read;

use crate::error::{Result, ScatterError};
use crate::types::{ChunkDescriptor, ChunkHash};

/// Compute the SHA-256 hash of a byte slice.
pub fn compute_checksum(data: &[u8]) -> ChunkHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    ChunkHash(hasher.finalize().into())
}

/// One chunk produced by `Chunker::split`, ready for upload.
#[derive(Debug)]
pub struct ChunkPayload {
    pub index: u32,
    pub data: Vec<u8>,
    pub checksum: ChunkHash,
}

/// Splits a byte stream into ordered fixed-size chunks.
pub struct Chunker {
    chunk_size: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ScatterError::Config(
                "chunk_size must be positive".to_string(),
            ));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `reader` into chunks of exactly `chunk_size` bytes (last one may
    /// be shorter). The source is read once; an empty source yields exactly
    /// one zero-length chunk so every file has at least one chunk.
    pub fn split<R: Read>(&self, reader: R) -> ChunkStream<R> {
        ChunkStream {
            reader,
            chunk_size: self.chunk_size,
            next_index: 0,
            file_hasher: Sha256::new(),
            total_bytes: 0,
            done: false,
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: 4 * 1024 * 1024, // 4 MB
        }
    }
}

/// Iterator over the chunks of one source stream. Not restartable.
pub struct ChunkStream<R> {
    reader: R,
    chunk_size: usize,
    next_index: u32,
    file_hasher: Sha256,
    total_bytes: u64,
    done: bool,
}

impl<R: Read> ChunkStream<R> {
    /// Fill a buffer of `chunk_size` bytes, stopping early only at EOF.
    fn read_chunk(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut total_read = 0;
        while total_read < self.chunk_size {
            match self.reader.read(&mut buf[total_read..]) {
                Ok(0) => break,
                Ok(n) => total_read += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(total_read);
        Ok(buf)
    }

    /// Whole-file checksum and byte count. Valid once the stream is exhausted.
    pub fn finish(self) -> (ChunkHash, u64) {
        (
            ChunkHash(self.file_hasher.finalize().into()),
            self.total_bytes,
        )
    }
}

impl<R: Read> Iterator for ChunkStream<R> {
    type Item = Result<ChunkPayload>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let data = match self.read_chunk() {
            Ok(d) => d,
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        };

        if data.is_empty() {
            self.done = true;
            // An empty source still yields one zero-length chunk.
            if self.next_index == 0 {
                let checksum = compute_checksum(&data);
                self.next_index = 1;
                return Some(Ok(ChunkPayload {
                    index: 0,
                    data,
                    checksum,
                }));
            }
            return None;
        }

        self.file_hasher.update(&data);
        self.total_bytes += data.len() as u64;
        if data.len() < self.chunk_size {
            self.done = true;
        }

        let index = self.next_index;
        self.next_index += 1;
        let checksum = compute_checksum(&data);
        Some(Ok(ChunkPayload {
            index,
            data,
            checksum,
        }))
    }
}

/// Reassemble downloaded chunks into the original byte stream.
///
/// Sorts by index, requires a contiguous 0..N-1 range and verifies each
/// chunk's recomputed checksum against its descriptor.
pub fn reassemble(
    version_id: i64,
    expected_chunks: u32,
    mut parts: Vec<(ChunkDescriptor, Vec<u8>)>,
) -> Result<Vec<u8>> {
    parts.sort_by_key(|(desc, _)| desc.index);

    for want in 0..expected_chunks {
        match parts.get(want as usize) {
            Some((desc, _)) if desc.index == want => {}
            _ => return Err(ScatterError::MissingChunk(version_id, want)),
        }
    }

    let mut out = Vec::with_capacity(parts.iter().map(|(_, d)| d.len()).sum());
    for (desc, data) in &parts {
        let actual = compute_checksum(data);
        if actual != desc.checksum {
            return Err(ScatterError::ChecksumMismatch(
                format!("chunk {}", desc.index),
                desc.checksum.to_hex(),
                actual.to_hex(),
            ));
        }
        out.extend_from_slice(data);
    }
    Ok(out)
}
