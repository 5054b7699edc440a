//! Big-endian fixed-width reads and writes over code buffers
//!
//! All multi-byte values in the class container format are big-endian. Every
//! accessor here is bounds checked and reports a [`Error::Format`] rather than
//! panicking, since the buffers come from untrusted compiled class files.

use crate::error::{Error, Result};

/// Read one signed byte at `at`
pub fn read_i8(code: &[u8], at: usize) -> Result<i8> {
    code.get(at)
        .map(|b| *b as i8)
        .ok_or_else(|| truncated(at, 1, code.len()))
}

/// Read a signed big-endian 16-bit value at `at`
pub fn read_i16(code: &[u8], at: usize) -> Result<i16> {
    let bytes: [u8; 2] = code
        .get(at..at + 2)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| truncated(at, 2, code.len()))?;
    Ok(i16::from_be_bytes(bytes))
}

/// Read an unsigned big-endian 16-bit value at `at`
pub fn read_u16(code: &[u8], at: usize) -> Result<u16> {
    read_i16(code, at).map(|v| v as u16)
}

/// Read a signed big-endian 32-bit value at `at`
pub fn read_i32(code: &[u8], at: usize) -> Result<i32> {
    let bytes: [u8; 4] = code
        .get(at..at + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| truncated(at, 4, code.len()))?;
    Ok(i32::from_be_bytes(bytes))
}

/// Write one signed byte at `at`
pub fn write_i8(code: &mut [u8], at: usize, value: i8) -> Result<()> {
    let len = code.len();
    let slot = code.get_mut(at).ok_or_else(|| truncated(at, 1, len))?;
    *slot = value as u8;
    Ok(())
}

/// Write a signed big-endian 16-bit value at `at`
pub fn write_i16(code: &mut [u8], at: usize, value: i16) -> Result<()> {
    let len = code.len();
    let slot = code
        .get_mut(at..at + 2)
        .ok_or_else(|| truncated(at, 2, len))?;
    slot.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Write an unsigned big-endian 16-bit value at `at`
pub fn write_u16(code: &mut [u8], at: usize, value: u16) -> Result<()> {
    write_i16(code, at, value as i16)
}

/// Write a signed big-endian 32-bit value at `at`
pub fn write_i32(code: &mut [u8], at: usize, value: i32) -> Result<()> {
    let len = code.len();
    let slot = code
        .get_mut(at..at + 4)
        .ok_or_else(|| truncated(at, 4, len))?;
    slot.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

fn truncated(at: usize, width: usize, len: usize) -> Error {
    Error::format(
        at,
        format!("{width}-byte value at offset {at} runs past buffer end ({len} bytes)"),
    )
}
