//! Chunked canvas storage for Mural.
//!
//! The canvas is never held contiguously; it is partitioned into fixed-size
//! byte-range chunks which are the unit of persistence, read-modify-write,
//! and snapshot assembly.

pub mod geometry;
pub mod store;
pub mod viewport;

pub use geometry::CanvasGeometry;
pub use store::{ChunkStore, FsChunkStore, PixelWrite, apply_pixels};
pub use viewport::assemble_viewport;
