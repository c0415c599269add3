//! Little-endian primitives shared by the store formats.

use std::io::{Read, Write};

use crate::error::{Error, Result};

pub(crate) fn write_u8<W: Write>(w: &mut W, value: u8) -> Result<()> {
    Ok(w.write_all(&[value])?)
}

pub(crate) fn write_u16<W: Write>(w: &mut W, value: u16) -> Result<()> {
    Ok(w.write_all(&value.to_le_bytes())?)
}

pub(crate) fn write_u32<W: Write>(w: &mut W, value: u32) -> Result<()> {
    Ok(w.write_all(&value.to_le_bytes())?)
}

pub(crate) fn write_f64<W: Write>(w: &mut W, value: f64) -> Result<()> {
    Ok(w.write_all(&value.to_le_bytes())?)
}

pub(crate) fn write_str<W: Write>(w: &mut W, value: &str) -> Result<()> {
    write_len(w, value.len())?;
    Ok(w.write_all(value.as_bytes())?)
}

pub(crate) fn write_opt_str<W: Write>(w: &mut W, value: Option<&str>) -> Result<()> {
    match value {
        Some(s) => {
            write_u8(w, 1)?;
            write_str(w, s)
        }
        None => write_u8(w, 0),
    }
}

pub(crate) fn write_opt_f64<W: Write>(w: &mut W, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) => {
            write_u8(w, 1)?;
            write_f64(w, v)
        }
        None => write_u8(w, 0),
    }
}

pub(crate) fn write_opt_u32<W: Write>(w: &mut W, value: Option<u32>) -> Result<()> {
    match value {
        Some(v) => {
            write_u8(w, 1)?;
            write_u32(w, v)
        }
        None => write_u8(w, 0),
    }
}

/// Collection and string lengths are stored as u32; larger values were
/// already rejected when the model was built.
pub(crate) fn write_len<W: Write>(w: &mut W, len: usize) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| Error::MalformedTimetable(format!("length {len} exceeds the store format")))?;
    write_u32(w, len)
}

pub(crate) fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn read_u16<R: Read>(r: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub(crate) fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_f64<R: Read>(r: &mut R) -> Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

pub(crate) fn read_len<R: Read>(r: &mut R) -> Result<usize> {
    Ok(read_u32(r)? as usize)
}

pub(crate) fn read_str<R: Read>(r: &mut R) -> Result<String> {
    let len = read_len(r)?;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|_| Error::MalformedTimetable("non-UTF-8 string in store".to_string()))
}

pub(crate) fn read_opt_str<R: Read>(r: &mut R) -> Result<Option<String>> {
    Ok(match read_u8(r)? {
        0 => None,
        _ => Some(read_str(r)?),
    })
}

pub(crate) fn read_opt_f64<R: Read>(r: &mut R) -> Result<Option<f64>> {
    Ok(match read_u8(r)? {
        0 => None,
        _ => Some(read_f64(r)?),
    })
}

pub(crate) fn read_opt_u32<R: Read>(r: &mut R) -> Result<Option<u32>> {
    Ok(match read_u8(r)? {
        0 => None,
        _ => Some(read_u32(r)?),
    })
}

/// Check the leading version string of a store.
pub(crate) fn expect_version<R: Read>(r: &mut R, expected: &'static str) -> Result<()> {
    let found = read_str(r)?;
    if found != expected {
        return Err(Error::UnsupportedVersion { expected, found });
    }
    Ok(())
}
