//! Little-endian byte encoding shared by the snapshot writer and the state hasher.
//!
//! Every authoritative column type implements [`Encode`]/[`Decode`] once here, so
//! `Table::save_to` and `Table::compute_state_hash` read exactly the same bytes
//! for a given value — a fixed per-type byte encoding so hashes agree regardless
//! of host platform. The style — small macro-free trait impls around LE byte
//! arrays — generalizes `men-among-gods-reforged/core/src/byte_operations.rs`'s
//! `read_u32!`-family helpers into traits instead of call-site macros, so
//! generic table code can encode a column without knowing its concrete type.

use crate::fixed::{Fx, FxVec2};
use crate::handle::Handle;

/// A type that can be appended to a byte buffer in a fixed, little-endian layout.
pub trait Encode {
    /// Number of bytes this value always occupies. Every `Encode` impl in this
    /// crate is fixed-size, which is what lets `Table` lay out column arrays at
    /// constant offsets.
    const SIZE: usize;

    fn encode(&self, out: &mut Vec<u8>);
}

/// The inverse of [`Encode`]: reconstructs a value from a byte slice of exactly
/// `Self::SIZE` bytes.
pub trait Decode: Sized {
    fn decode(bytes: &[u8]) -> Self;
}

macro_rules! impl_int_codec {
    ($t:ty, $size:expr) => {
        impl Encode for $t {
            const SIZE: usize = $size;
            #[inline]
            fn encode(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }

        impl Decode for $t {
            #[inline]
            fn decode(bytes: &[u8]) -> Self {
                let mut buf = [0u8; $size];
                buf.copy_from_slice(&bytes[..$size]);
                <$t>::from_le_bytes(buf)
            }
        }
    };
}

impl_int_codec!(i8, 1);
impl_int_codec!(u8, 1);
impl_int_codec!(i16, 2);
impl_int_codec!(u16, 2);
impl_int_codec!(i32, 4);
impl_int_codec!(u32, 4);
impl_int_codec!(i64, 8);
impl_int_codec!(u64, 8);

impl Encode for bool {
    const SIZE: usize = 1;
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(if *self { 1 } else { 0 });
    }
}

impl Decode for bool {
    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

impl Encode for Fx {
    const SIZE: usize = 8;
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        self.to_raw().encode(out);
    }
}

impl Decode for Fx {
    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        Fx::from_raw(i64::decode(bytes))
    }
}

impl Encode for FxVec2 {
    const SIZE: usize = Fx::SIZE * 2;
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        self.x.encode(out);
        self.y.encode(out);
    }
}

impl Decode for FxVec2 {
    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        FxVec2::new(Fx::decode(&bytes[0..8]), Fx::decode(&bytes[8..16]))
    }
}

impl Encode for Handle {
    const SIZE: usize = 8;
    #[inline]
    fn encode(&self, out: &mut Vec<u8>) {
        self.pack().encode(out);
    }
}

impl Decode for Handle {
    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        Handle::unpack(u64::decode(bytes))
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    const SIZE: usize = T::SIZE * N;
    fn encode(&self, out: &mut Vec<u8>) {
        for item in self.iter() {
            item.encode(out);
        }
    }
}

impl<T: Decode + Copy + Default, const N: usize> Decode for [T; N] {
    fn decode(bytes: &[u8]) -> Self {
        let mut out = [T::default(); N];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = T::decode(&bytes[i * T::SIZE..(i + 1) * T::SIZE]);
        }
        out
    }
}

/// Writes a sequential little-endian buffer, tracking the running offset —
/// a small reusable cursor type in place of `$offset += N` call-site macros.
#[derive(Default)]
pub struct Writer {
    pub buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer { buf: Vec::new() }
    }

    #[inline]
    pub fn write<T: Encode>(&mut self, value: &T) {
        value.encode(&mut self.buf);
    }

    /// Writes `count` raw zero bytes — used to pad a column's unused capacity.
    pub fn write_zeros(&mut self, count: usize) {
        self.buf.resize(self.buf.len() + count, 0);
    }
}

/// Reads sequentially from a byte slice, tracking an internal cursor.
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, offset: 0 }
    }

    #[inline]
    pub fn read<T: Decode>(&mut self, size: usize) -> T {
        let value = T::decode(&self.bytes[self.offset..self.offset + size]);
        self.offset += size;
        value
    }

    pub fn skip(&mut self, count: usize) {
        self.offset += count;
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.offset..]
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}
