//! Binary encoding helpers for the estimator's on-disk format (§6): a small,
//! self-describing length-prefixed framing over little-endian primitives.
//!
//! Length prefixes use a compact variable-length encoding (1 byte for values
//! below 0xfd, widening to 3/5/9 bytes for larger counts) rather than a flat
//! `u64`, matching the variable-length-integer convention the binary format
//! documents without tying every bucket count to 8 bytes on disk.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{EstimatorError, Result};

pub fn write_varint<W: Write>(w: &mut W, n: u64) -> io::Result<()> {
    if n < 0xfd {
        w.write_u8(n as u8)
    } else if n <= 0xffff {
        w.write_u8(0xfd)?;
        w.write_u16::<LittleEndian>(n as u16)
    } else if n <= 0xffff_ffff {
        w.write_u8(0xfe)?;
        w.write_u32::<LittleEndian>(n as u32)
    } else {
        w.write_u8(0xff)?;
        w.write_u64::<LittleEndian>(n)
    }
}

pub fn read_varint<R: Read>(r: &mut R) -> io::Result<u64> {
    let tag = r.read_u8()?;
    match tag {
        0xfd => Ok(u64::from(r.read_u16::<LittleEndian>()?)),
        0xfe => Ok(u64::from(r.read_u32::<LittleEndian>()?)),
        0xff => r.read_u64::<LittleEndian>(),
        n => Ok(u64::from(n)),
    }
}

pub fn write_f64<W: Write>(w: &mut W, v: f64) -> io::Result<()> {
    w.write_f64::<LittleEndian>(v)
}

pub fn read_f64<R: Read>(r: &mut R) -> io::Result<f64> {
    r.read_f64::<LittleEndian>()
}

pub fn write_i32<W: Write>(w: &mut W, v: i32) -> io::Result<()> {
    w.write_i32::<LittleEndian>(v)
}

pub fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    r.read_i32::<LittleEndian>()
}

pub fn write_u64<W: Write>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_u64::<LittleEndian>(v)
}

pub fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    r.read_u64::<LittleEndian>()
}

/// Writes `values.len()` as a varint, then each value as a little-endian
/// `f64`.
pub fn write_f64_slice<W: Write>(w: &mut W, values: &[f64]) -> io::Result<()> {
    write_varint(w, values.len() as u64)?;
    for v in values {
        write_f64(w, *v)?;
    }
    Ok(())
}

/// Reads a length-prefixed `f64` vector. If `expected_len` is `Some(k)`, a
/// length other than `k` is reported as corruption rather than silently
/// accepted.
pub fn read_f64_vec<R: Read>(r: &mut R, expected_len: Option<usize>) -> Result<Vec<f64>> {
    let len = read_varint(r)? as usize;
    if let Some(expected) = expected_len {
        if len != expected {
            return Err(EstimatorError::CorruptEstimatesFile(format!(
                "expected {} values, found {}",
                expected, len
            )));
        }
    }
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_f64(r)?);
    }
    Ok(out)
}

/// Reads exactly `rows` consecutive length-prefixed `f64[K]` vectors with no
/// outer length prefix (the legacy `conf_avg` layout, §6).
pub fn read_f64_rows_flat<R: Read>(r: &mut R, rows: usize, k: usize) -> Result<Vec<Vec<f64>>> {
    let mut out = Vec::with_capacity(rows);
    for _ in 0..rows {
        out.push(read_f64_vec(r, Some(k))?);
    }
    Ok(out)
}

/// Writes one length-prefixed sequence of length-prefixed `f64[K]` rows (the
/// modern `conf_avg` layout, §6).
pub fn write_f64_rows<W: Write>(w: &mut W, rows: &[Vec<f64>]) -> io::Result<()> {
    write_varint(w, rows.len() as u64)?;
    for row in rows {
        write_f64_slice(w, row)?;
    }
    Ok(())
}

/// Reads the modern `conf_avg` layout: an outer length-prefixed sequence of
/// length-prefixed `f64[K]` rows.
pub fn read_f64_rows<R: Read>(r: &mut R, k: usize) -> Result<Vec<Vec<f64>>> {
    let rows = read_varint(r)? as usize;
    read_f64_rows_flat(r, rows, k)
}
