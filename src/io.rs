//! I/O utilities
use std::io::{self, Read, Write};

/// Little endian `u32` reader
#[inline]
pub(crate) fn rdu32le<R: Read>(r: &mut R) -> Result<u32, io::Error> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Little endian `u32` writer
#[inline]
pub(crate) fn wru32le<W: Write>(w: &mut W, v: u32) -> Result<(), io::Error> {
    w.write_all(&v.to_le_bytes())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn intread() -> Result<(), io::Error> {
        let buf = &mut b"\x05\x06\x07\x08".as_slice();
        assert_eq!(rdu32le(buf)?, 0x08070605);
        assert_eq!(buf.len(), 0);
        assert!(rdu32le(buf).is_err());
        Ok(())
    }

    #[test]
    fn intwrite() -> Result<(), io::Error> {
        let mut buf: Vec<u8> = Vec::new();
        wru32le(&mut buf, 0x08070605)?;
        wru32le(&mut buf, 0xcafebeef)?;
        assert_eq!(buf.as_slice(), b"\x05\x06\x07\x08\xef\xbe\xfe\xca");
        Ok(())
    }
}
