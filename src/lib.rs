//! In-place FAT32 manipulation of raw disk images.
//!
//! The `fs` module is the engine: on-disk records, the mirrored
//! allocation table, cluster chains, and long-file-name directory
//! handling, all mutated with crash-tolerant write ordering. The `shell`
//! module binds the engine's typed API to an interactive prompt.

pub mod error;
pub mod fs;
pub mod shell;

pub use error::FatError;
pub use fs::volume::Fat32Volume;
