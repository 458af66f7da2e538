//! Little-endian primitives of the binary forest and option format.
//!
//! Lengths and indices are stored as `u64`, floating point values as
//! their IEEE-754 bit pattern so a round trip is bit exact.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use errors::*;
use std::io::{Read, Write};

type End = LittleEndian;

/// Preallocate at most this many elements before the data is actually read,
/// so a corrupt length cannot exhaust memory.
const MAX_PREALLOC: usize = 1 << 16;

pub fn write_magic<W: Write>(writer: &mut W, magic: &[u8; 4], version: u32) -> Result<()> {
    writer.write_all(magic)?;
    writer.write_u32::<End>(version)?;
    Ok(())
}

/// Reads a block header and returns its version.
pub fn read_magic<R: Read>(reader: &mut R, magic: &[u8; 4]) -> Result<u32> {
    let mut found = [0u8; 4];
    reader.read_exact(&mut found)?;
    if &found != magic {
        bail!(ErrorKind::CorruptStream(format!("expected block {:?}, found {:?}",
                                               String::from_utf8_lossy(magic),
                                               String::from_utf8_lossy(&found))));
    }
    Ok(reader.read_u32::<End>()?)
}

pub fn write_usize<W: Write>(writer: &mut W, value: usize) -> Result<()> {
    writer.write_u64::<End>(value as u64)?;
    Ok(())
}

pub fn read_usize<R: Read>(reader: &mut R) -> Result<usize> {
    let value = reader.read_u64::<End>()?;
    if value > usize::max_value() as u64 {
        bail!(ErrorKind::CorruptStream(format!("value {} does not fit into usize", value)));
    }
    Ok(value as usize)
}

pub fn write_f64<W: Write>(writer: &mut W, value: f64) -> Result<()> {
    writer.write_u64::<End>(value.to_bits())?;
    Ok(())
}

pub fn read_f64<R: Read>(reader: &mut R) -> Result<f64> {
    Ok(f64::from_bits(reader.read_u64::<End>()?))
}

pub fn write_bool<W: Write>(writer: &mut W, value: bool) -> Result<()> {
    writer.write_u8(if value { 1 } else { 0 })?;
    Ok(())
}

pub fn read_bool<R: Read>(reader: &mut R) -> Result<bool> {
    match reader.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        x => bail!(ErrorKind::CorruptStream(format!("invalid boolean tag {}", x))),
    }
}

pub fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<()> {
    writer.write_u32::<End>(value)?;
    Ok(())
}

pub fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    Ok(reader.read_u32::<End>()?)
}

pub fn write_u64<W: Write>(writer: &mut W, value: u64) -> Result<()> {
    writer.write_u64::<End>(value)?;
    Ok(())
}

pub fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    Ok(reader.read_u64::<End>()?)
}

pub fn write_opt_usize<W: Write>(writer: &mut W, value: Option<usize>) -> Result<()> {
    write_bool(writer, value.is_some())?;
    write_usize(writer, value.unwrap_or(0))
}

pub fn read_opt_usize<R: Read>(reader: &mut R) -> Result<Option<usize>> {
    let present = read_bool(reader)?;
    let value = read_usize(reader)?;
    Ok(if present { Some(value) } else { None })
}

pub fn write_opt_f64<W: Write>(writer: &mut W, value: Option<f64>) -> Result<()> {
    write_bool(writer, value.is_some())?;
    write_f64(writer, value.unwrap_or(0.0))
}

pub fn read_opt_f64<R: Read>(reader: &mut R) -> Result<Option<f64>> {
    let present = read_bool(reader)?;
    let value = read_f64(reader)?;
    Ok(if present { Some(value) } else { None })
}

pub fn write_opt_u64<W: Write>(writer: &mut W, value: Option<u64>) -> Result<()> {
    write_bool(writer, value.is_some())?;
    write_u64(writer, value.unwrap_or(0))
}

pub fn read_opt_u64<R: Read>(reader: &mut R) -> Result<Option<u64>> {
    let present = read_bool(reader)?;
    let value = read_u64(reader)?;
    Ok(if present { Some(value) } else { None })
}

pub fn write_usizes<W: Write>(writer: &mut W, values: &[usize]) -> Result<()> {
    write_usize(writer, values.len())?;
    for &v in values {
        write_usize(writer, v)?;
    }
    Ok(())
}

pub fn read_usizes<R: Read>(reader: &mut R) -> Result<Vec<usize>> {
    let len = read_usize(reader)?;
    let mut res = Vec::with_capacity(len.min(MAX_PREALLOC));
    for _ in 0..len {
        res.push(read_usize(reader)?);
    }
    Ok(res)
}

pub fn write_f64s<W: Write>(writer: &mut W, values: &[f64]) -> Result<()> {
    write_usize(writer, values.len())?;
    for &v in values {
        write_f64(writer, v)?;
    }
    Ok(())
}

pub fn read_f64s<R: Read>(reader: &mut R) -> Result<Vec<f64>> {
    let len = read_usize(reader)?;
    let mut res = Vec::with_capacity(len.min(MAX_PREALLOC));
    for _ in 0..len {
        res.push(read_f64(reader)?);
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_primitives() {
        let mut buf = vec![];
        write_magic(&mut buf, b"TEST", 3).unwrap();
        write_opt_usize(&mut buf, Some(17)).unwrap();
        write_opt_usize(&mut buf, None).unwrap();
        write_f64s(&mut buf, &[0.1, -2.5, ::std::f64::consts::PI]).unwrap();
        write_bool(&mut buf, true).unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_magic(&mut cursor, b"TEST").unwrap(), 3);
        assert_eq!(read_opt_usize(&mut cursor).unwrap(), Some(17));
        assert_eq!(read_opt_usize(&mut cursor).unwrap(), None);
        assert_eq!(read_f64s(&mut cursor).unwrap(), vec![0.1, -2.5, ::std::f64::consts::PI]);
        assert!(read_bool(&mut cursor).unwrap());
        // Stream exhausted
        assert!(read_usize(&mut cursor).is_err());
    }

    #[test]
    fn test_wrong_magic() {
        let mut buf = vec![];
        write_magic(&mut buf, b"ABCD", 1).unwrap();
        let err = read_magic(&mut Cursor::new(buf), b"HGHF").unwrap_err();
        match *err.kind() {
            ErrorKind::CorruptStream(_) => (),
            ref x => panic!("Expected a corrupt stream error, got {}", x),
        }
    }

    #[test]
    fn test_truncated_vector() {
        let mut buf = vec![];
        write_usize(&mut buf, 1 << 40).unwrap();
        write_f64(&mut buf, 1.0).unwrap();
        assert!(read_f64s(&mut Cursor::new(buf)).is_err());
    }
}
