//! Error taxonomy.
//!
//! Routine conditions — stale handles, out-of-range slots — are never errors;
//! callers see `None`/no-op rather than a panic. Only conditions that leave the
//! world in a state no caller can recover from get a variant here.

use thiserror::Error;

/// Fatal conditions that must bubble to the host rather than being silently
/// recovered. Recoverable conditions (stale handle, out-of-range slot) are
/// represented as `Option::None` at their call sites, not as `CoreError`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// `allocate` was called on a full table with no eviction policy configured.
    #[error("table {table} is at capacity {capacity} and has no eviction policy")]
    CapacityExhausted { table: &'static str, capacity: u32 },

    /// A snapshot's embedded schema fingerprint (or length) disagreed with the
    /// loading table; the world refuses to load and remains in its prior state.
    #[error("snapshot schema mismatch for table {table}: expected fingerprint {expected:#x}, got {found:#x}")]
    LoadMismatch { table: &'static str, expected: u64, found: u64 },

    /// A chunked spatial index exceeded its configured `MaxChunks`.
    #[error("chunked spatial index for table {table} exceeded max_chunks {max_chunks}")]
    ChunkOverflow { table: &'static str, max_chunks: u32 },
}

pub type CoreResult<T> = Result<T, CoreError>;
