//! Chunk persistence: the single source of truth for canvas state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mural_core::config::Rgba;
use mural_core::{MuralError, Result};

use crate::geometry::CanvasGeometry;

/// Durable key/value storage of canvas chunks.
///
/// `set_chunk` replaces a whole chunk atomically; there is no partial-write
/// primitive, so callers read-modify-write entire chunks.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Read one chunk. Fails with `ChunkNotFound` for indices that were never
    /// initialized or are out of range.
    async fn get_chunk(&self, index: u32) -> Result<Vec<u8>>;

    /// Replace one chunk. The byte length must equal the chunk size.
    async fn set_chunk(&self, index: u32, bytes: &[u8]) -> Result<()>;

    /// Whether the store has been populated for this canvas.
    async fn is_initialized(&self) -> Result<bool>;

    /// Create every chunk filled with the default color. Overwrites existing
    /// content; callers gate on `is_initialized` to avoid clobbering a
    /// populated store.
    async fn initialize(&self) -> Result<()>;

    fn geometry(&self) -> &CanvasGeometry;
}

/// One pixel paint, already bounds-checked and color-resolved.
#[derive(Debug, Clone, Copy)]
pub struct PixelWrite {
    pub x: u32,
    pub y: u32,
    pub color: Rgba,
}

/// Apply a batch of pixel writes, read-modify-writing each affected chunk
/// once. Writes hitting the same chunk are coalesced into a single store
/// round trip.
pub async fn apply_pixels(
    store: &dyn ChunkStore,
    writes: &[PixelWrite],
) -> Result<()> {
    let geometry = *store.geometry();
    let mut by_chunk: BTreeMap<u32, Vec<(usize, Rgba)>> = BTreeMap::new();
    for write in writes {
        let (chunk, offset) = geometry.locate(write.x, write.y);
        by_chunk.entry(chunk).or_default().push((offset, write.color));
    }

    for (index, edits) in by_chunk {
        let mut bytes = store.get_chunk(index).await?;
        for (offset, color) in edits {
            bytes[offset..offset + 4].copy_from_slice(&color);
        }
        store.set_chunk(index, &bytes).await?;
    }
    Ok(())
}

/// Store metadata written at initialization and verified on open.
#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    width: u32,
    height: u32,
    chunk_width: u32,
    chunk_height: u32,
    fill: Rgba,
    created_at: DateTime<Utc>,
}

/// File-backed chunk store.
///
/// Layout:
/// - `<base>/manifest.json`: canvas geometry and fill color
/// - `<base>/chunks/<index>`: base64-encoded chunk blob
pub struct FsChunkStore {
    base: PathBuf,
    geometry: CanvasGeometry,
    fill: Rgba,
}

impl FsChunkStore {
    /// Open a store directory, verifying any existing manifest against the
    /// running geometry. A store written with different dimensions would be
    /// silently misaddressed, so a mismatch is a config error.
    pub async fn open(base: PathBuf, geometry: CanvasGeometry, fill: Rgba) -> Result<Self> {
        let store = Self {
            base,
            geometry,
            fill,
        };
        if let Some(manifest) = store.read_manifest().await? {
            let stored = CanvasGeometry::new(
                manifest.width,
                manifest.height,
                manifest.chunk_width,
                manifest.chunk_height,
            )?;
            if stored != geometry {
                return Err(MuralError::Config(format!(
                    "store at {} was created for a {}x{} canvas in {}x{} chunks, \
                     which does not match the configured geometry",
                    store.base.display(),
                    stored.width,
                    stored.height,
                    stored.chunk_width,
                    stored.chunk_height,
                )));
            }
        }
        Ok(store)
    }

    fn manifest_path(&self) -> PathBuf {
        self.base.join("manifest.json")
    }

    fn chunk_dir(&self) -> PathBuf {
        self.base.join("chunks")
    }

    fn chunk_path(&self, index: u32) -> PathBuf {
        self.chunk_dir().join(index.to_string())
    }

    async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.base)
            .await
            .map_err(unavailable)?;
        tokio::fs::create_dir_all(self.chunk_dir())
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn read_manifest(&self) -> Result<Option<Manifest>> {
        let path = self.manifest_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => {
                let manifest: Manifest = serde_json::from_str(&data).map_err(|e| {
                    MuralError::StoreUnavailable(format!("corrupt manifest: {e}"))
                })?;
                Ok(Some(manifest))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(e)),
        }
    }

    /// Atomic write: temp file then rename. Concurrent writers to the same
    /// chunk race at the rename, so one of them wins wholesale, never a torn
    /// mix of both.
    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let tmp = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, data).await.map_err(unavailable)?;
        tokio::fs::rename(&tmp, path).await.map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(e: std::io::Error) -> MuralError {
    MuralError::StoreUnavailable(e.to_string())
}

#[async_trait]
impl ChunkStore for FsChunkStore {
    async fn get_chunk(&self, index: u32) -> Result<Vec<u8>> {
        if index >= self.geometry.total_chunks() {
            return Err(MuralError::ChunkNotFound(index));
        }
        let data = match tokio::fs::read_to_string(self.chunk_path(index)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MuralError::ChunkNotFound(index));
            }
            Err(e) => return Err(unavailable(e)),
        };
        base64::engine::general_purpose::STANDARD
            .decode(data.trim_end())
            .map_err(|e| MuralError::StoreUnavailable(format!("corrupt chunk {index}: {e}")))
    }

    async fn set_chunk(&self, index: u32, bytes: &[u8]) -> Result<()> {
        if index >= self.geometry.total_chunks() {
            return Err(MuralError::ChunkNotFound(index));
        }
        if bytes.len() != self.geometry.chunk_size() {
            return Err(MuralError::Malformed(format!(
                "chunk {index} write of {} bytes, expected {}",
                bytes.len(),
                self.geometry.chunk_size()
            )));
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.write_atomic(&self.chunk_path(index), encoded.as_bytes())
            .await?;
        debug!(index, "Chunk written");
        Ok(())
    }

    async fn is_initialized(&self) -> Result<bool> {
        Ok(self.read_manifest().await?.is_some())
    }

    async fn initialize(&self) -> Result<()> {
        self.ensure_dirs().await?;

        let mut chunk = vec![0u8; self.geometry.chunk_size()];
        for pixel in chunk.chunks_exact_mut(4) {
            pixel.copy_from_slice(&self.fill);
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(&chunk);

        for index in 0..self.geometry.total_chunks() {
            self.write_atomic(&self.chunk_path(index), encoded.as_bytes())
                .await?;
        }

        // Manifest written last: its presence marks the store initialized.
        let manifest = Manifest {
            width: self.geometry.width,
            height: self.geometry.height,
            chunk_width: self.geometry.chunk_width,
            chunk_height: self.geometry.chunk_height,
            fill: self.fill,
            created_at: Utc::now(),
        };
        let data = serde_json::to_string_pretty(&manifest)?;
        self.write_atomic(&self.manifest_path(), data.as_bytes())
            .await?;

        info!(
            chunks = self.geometry.total_chunks(),
            path = %self.base.display(),
            "Canvas store initialized"
        );
        Ok(())
    }

    fn geometry(&self) -> &CanvasGeometry {
        &self.geometry
    }
}
