//! Viewport snapshot assembly for joining clients.

use mural_core::{MuralError, Result};

use crate::store::ChunkStore;

/// Build the pixel buffer for a joining client's viewport.
///
/// Reads chunks `0..ceil(4*width*height / chunk_size)` in index order,
/// concatenates them, and truncates to exactly `4 * width * height` bytes.
/// The region served is therefore the top-aligned, full-canvas-width prefix
/// of the flattened canvas covering that many bytes, not a sub-rectangle
/// extraction at arbitrary offsets. Every call re-reads the store; snapshots
/// happen once per join, not per frame.
pub async fn assemble_viewport(
    store: &dyn ChunkStore,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let geometry = store.geometry();
    let size = 4 * width as u64 * height as u64;
    if size == 0 || size > geometry.canvas_bytes() {
        return Err(MuralError::Malformed(format!(
            "viewport {width}x{height} outside canvas {}x{}",
            geometry.width, geometry.height
        )));
    }

    let chunk_size = geometry.chunk_size() as u64;
    let chunks_needed = size.div_ceil(chunk_size) as u32;

    let mut texture = Vec::with_capacity((chunks_needed as u64 * chunk_size) as usize);
    for index in 0..chunks_needed {
        texture.extend_from_slice(&store.get_chunk(index).await?);
    }
    texture.truncate(size as usize);
    Ok(texture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CanvasGeometry;
    use crate::store::{ChunkStore, FsChunkStore, PixelWrite, apply_pixels};

    const FILL: [u8; 4] = [33, 33, 33, 255];

    async fn initialized_store(
        dir: &tempfile::TempDir,
        geometry: CanvasGeometry,
    ) -> FsChunkStore {
        let store = FsChunkStore::open(dir.path().to_path_buf(), geometry, FILL)
            .await
            .unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_full_canvas_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let geometry = CanvasGeometry::new(4, 4, 4, 4).unwrap();
        let store = initialized_store(&dir, geometry).await;

        let texture = assemble_viewport(&store, 4, 4).await.unwrap();
        assert_eq!(texture.len(), 64);
        assert!(texture.chunks_exact(4).all(|px| px == FILL));
    }

    #[tokio::test]
    async fn test_truncates_to_requested_bytes() {
        let dir = tempfile::tempdir().unwrap();
        // Two chunks of 128 bytes; a 8x6 viewport needs 192 bytes of both.
        let geometry = CanvasGeometry::new(8, 8, 8, 4).unwrap();
        let store = initialized_store(&dir, geometry).await;

        let texture = assemble_viewport(&store, 8, 6).await.unwrap();
        assert_eq!(texture.len(), 192);
        assert!(texture.chunks_exact(4).all(|px| px == FILL));
    }

    #[tokio::test]
    async fn test_snapshot_reflects_painted_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let geometry = CanvasGeometry::new(4, 4, 4, 4).unwrap();
        let store = initialized_store(&dir, geometry).await;

        let red = [255, 0, 0, 255];
        apply_pixels(&store, &[PixelWrite { x: 1, y: 1, color: red }])
            .await
            .unwrap();

        let texture = assemble_viewport(&store, 4, 4).await.unwrap();
        assert_eq!(&texture[20..24], &red);
        assert_eq!(&texture[0..4], &FILL);
    }

    #[tokio::test]
    async fn test_rejects_oversized_viewport() {
        let dir = tempfile::tempdir().unwrap();
        let geometry = CanvasGeometry::new(4, 4, 4, 4).unwrap();
        let store = initialized_store(&dir, geometry).await;

        assert!(assemble_viewport(&store, 8, 8).await.is_err());
        assert!(assemble_viewport(&store, 0, 4).await.is_err());
    }

    #[tokio::test]
    async fn test_uninitialized_store_errors() {
        let dir = tempfile::tempdir().unwrap();
        let geometry = CanvasGeometry::new(4, 4, 4, 4).unwrap();
        let store = FsChunkStore::open(dir.path().to_path_buf(), geometry, FILL)
            .await
            .unwrap();

        assert!(assemble_viewport(&store, 4, 4).await.is_err());
    }
}
