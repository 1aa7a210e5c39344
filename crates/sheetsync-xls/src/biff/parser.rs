//! Low-level binary parsing helpers for BIFF8 records.
//!
//! All multi-byte integers in BIFF8 are little-endian. Every reader takes the
//! record body and a cursor it advances on success.

use crate::error::{XlsError, XlsResult};

fn take<const N: usize>(data: &[u8], offset: &mut usize) -> XlsResult<[u8; N]> {
    let bytes = data
        .get(*offset..*offset + N)
        .and_then(|s| <[u8; N]>::try_from(s).ok())
        .ok_or_else(|| {
            XlsError::Parse(format!(
                "unexpected end of data at offset {}, need {} bytes",
                *offset, N
            ))
        })?;
    *offset += N;
    Ok(bytes)
}

#[inline]
pub fn read_u8(data: &[u8], offset: &mut usize) -> XlsResult<u8> {
    take::<1>(data, offset).map(|b| b[0])
}

#[inline]
pub fn read_u16(data: &[u8], offset: &mut usize) -> XlsResult<u16> {
    take::<2>(data, offset).map(u16::from_le_bytes)
}

#[inline]
pub fn read_u32(data: &[u8], offset: &mut usize) -> XlsResult<u32> {
    take::<4>(data, offset).map(u32::from_le_bytes)
}

#[inline]
pub fn read_f64(data: &[u8], offset: &mut usize) -> XlsResult<f64> {
    take::<8>(data, offset).map(f64::from_le_bytes)
}

/// Decode an RK-encoded number.
///
/// RK encoding (4 bytes):
/// - Bit 0: if 1, the decoded number is divided by 100
/// - Bit 1: if 1, bits 2..31 are a signed 30-bit integer,
///   otherwise they are the upper 30 bits of an IEEE 754 double
#[inline]
pub fn decode_rk(rk: u32) -> f64 {
    let div100 = (rk & 0x01) != 0;
    let is_integer = (rk & 0x02) != 0;

    let value = if is_integer {
        ((rk as i32) >> 2) as f64
    } else {
        f64::from_bits(((rk & 0xFFFF_FFFC) as u64) << 32)
    };

    if div100 {
        value / 100.0
    } else {
        value
    }
}

#[inline]
pub fn read_rk(data: &[u8], offset: &mut usize) -> XlsResult<f64> {
    read_u32(data, offset).map(decode_rk)
}

/// Row, column and XF index that open every cell record.
///
/// Rows and columns come back 1-based.
pub fn read_cell_header(data: &[u8], offset: &mut usize) -> XlsResult<(u32, u32, u16)> {
    let row = read_u16(data, offset)? as u32 + 1;
    let col = read_u16(data, offset)? as u32 + 1;
    let xf = read_u16(data, offset)?;
    Ok((row, col, xf))
}
