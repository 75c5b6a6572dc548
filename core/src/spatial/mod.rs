//! Embedded spatial indexing for tables whose schema declares a `Position` field.
//!
//! [`grid::Grid`] is the bounded single-grid mode; [`chunked::ChunkedIndex`] is
//! the pooled-chunk mode for worlds too large for one fixed grid.

pub mod chunked;
pub mod grid;
