//! Multi-table union queries: a projection interface over a common field
//! subset spanning an explicit participant set of tables.
//!
//! [`damageable`] is the one concrete union this crate ships: `{position,
//! health}` over `unit` and `building`, the pair of spatial schemas that share
//! those fields. Additional unions follow the same shape.

pub mod damageable;
