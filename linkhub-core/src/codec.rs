//! Binary codec helpers
//!
//! Fixed-width integer conversions used when framing and parsing packets.
//! Reads tolerate short slices by treating missing bytes as zero, so a
//! truncated reply degrades to a small value instead of a panic.

#[inline]
fn padded<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let len = bytes.len().min(N);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// Read a little-endian u16 from the first two bytes
#[inline]
pub fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes(padded(bytes))
}

/// Read a big-endian u16 from the first two bytes
#[inline]
pub fn read_u16_be(bytes: &[u8]) -> u16 {
    u16::from_be_bytes(padded(bytes))
}

/// Read a little-endian u32 from the first four bytes
///
/// Three-byte property values are read through this as well; the missing
/// high byte is zero.
#[inline]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(padded(bytes))
}

/// Read a big-endian u32, zero-padding short input to four bytes first
///
/// ```
/// use linkhub_core::codec::read_u32_be;
///
/// assert_eq!(read_u32_be(&[0x01, 0x02]), 0x0102_0000);
/// ```
#[inline]
pub fn read_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes(padded(bytes))
}

/// Encode a u16 as little-endian bytes
#[inline]
pub fn write_u16_le(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

/// Encode a u16 as big-endian bytes
#[inline]
pub fn write_u16_be(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// Encode a u32 as little-endian bytes
#[inline]
pub fn write_u32_le(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Encode a u32 as big-endian bytes
#[inline]
pub fn write_u32_be(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

/// Encode the low 24 bits of a value as three little-endian bytes
///
/// Property values travel as three bytes on the wire.
#[inline]
pub fn write_u24_le(value: u32) -> [u8; 3] {
    let [b0, b1, b2, _] = value.to_le_bytes();
    [b0, b1, b2]
}
