//! Schema fingerprinting for snapshot versioning.
//!
//! Each table embeds a 64-bit FNV hash of `{name, (field_name, field_type,
//! array_length) list}` in its snapshot meta. A reader refuses to load a
//! snapshot whose fingerprint disagrees with the schema it was compiled with —
//! see [`crate::error::CoreError::LoadMismatch`].

use std::hash::Hasher;

use fnv::FnvHasher;

/// Describes one column for fingerprinting purposes. `array_len` is `1` for a
/// scalar column, `Len` for a 1-D array column, and `Rows*Cols` for a 2-D one.
pub struct FieldDescriptor {
    pub name: &'static str,
    pub type_name: &'static str,
    pub array_len: u32,
}

pub const fn field(name: &'static str, type_name: &'static str, array_len: u32) -> FieldDescriptor {
    FieldDescriptor { name, type_name, array_len }
}

/// Computes the schema fingerprint for one table from its name and ordered
/// authoritative field list.
pub fn schema_fingerprint(table_name: &str, fields: &[FieldDescriptor]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(table_name.as_bytes());
    for f in fields {
        hasher.write(f.name.as_bytes());
        hasher.write(f.type_name.as_bytes());
        hasher.write(&f.array_len.to_le_bytes());
    }
    hasher.finish()
}
