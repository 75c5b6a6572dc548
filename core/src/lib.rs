//! `sim_core`: the deterministic simulation core.
//!
//! A lockstep engine replays identical input streams into identical state
//! across machines. That requires float-free math ([`fixed`]), a fixed
//! row layout per schema ([`table`]), byte-exact snapshots ([`codec`],
//! [`fingerprint`]), and an order-stable tick driver ([`driver`]). Everything
//! else in this crate exists to keep those four properties from leaking
//! non-determinism in at the edges: spatial queries walk a sorted index
//! rather than a hash map ([`spatial`]), the multi-table union query
//! dispatches through a single `table_id` map rather than enum matching at
//! every call site ([`query`]), and derived caches pull their invalidation
//! from version counters rather than being pushed events ([`derived`]).

pub mod codec;
pub mod derived;
pub mod driver;
pub mod error;
pub mod fingerprint;
pub mod fixed;
pub mod handle;
pub mod hash;
pub mod query;
pub mod slotmap;
pub mod spatial;
pub mod table;
pub mod world;

pub use error::{CoreError, CoreResult};
pub use fixed::{Fx, FxVec2};
pub use handle::{Handle, TableId};
pub use world::World;
