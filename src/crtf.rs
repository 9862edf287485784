//! Compressed RTF writer
//!
//! Produces RtfCompressed streams in the uncompressed container format
//! described in [MS-OXRTFCP]; readers accept it wherever the LZFu
//! compressed form is expected
use crate::io::*;
use std::io::{self, Write};

const COMPTYPE_UNCOMPRESSED: u32 = 0x414c454d;
// An uncompressed container carries no checksum
const CRC_UNCOMPRESSED: u32 = 0;

/// A writer producing an RtfCompressed stream without compression
///
/// The RTF text is buffered; the container header and the payload reach the
/// inner writer when [`finish()`](Self::finish) is called
pub struct UncompressedRtf<W: Write> {
    w: W,
    data: Vec<u8>,
}

impl<W: Write> UncompressedRtf<W> {
    /// Creates a new writer
    pub fn new(w: W) -> Self {
        Self { w, data: Vec::new() }
    }

    /// Writes the container and returns the inner writer
    pub fn finish(mut self) -> Result<W, io::Error> {
        let raw_size = u32::try_from(self.data.len())
            .ok()
            .filter(|sz| *sz <= u32::MAX - 12)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "RTF data too large"))?;
        // the size field does not count itself
        wru32le(&mut self.w, raw_size + 12)?;
        wru32le(&mut self.w, raw_size)?;
        wru32le(&mut self.w, COMPTYPE_UNCOMPRESSED)?;
        wru32le(&mut self.w, CRC_UNCOMPRESSED)?;
        self.w.write_all(&self.data)?;
        Ok(self.w)
    }
}

impl<W: Write> Write for UncompressedRtf<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_layout() -> Result<(), io::Error> {
        let rtf = b"{\\rtf1\\ansi\\ansicpg1252\\pard hello world}\r\n";
        let mut w = UncompressedRtf::new(Vec::new());
        w.write_all(rtf)?;
        let out = w.finish()?;
        assert_eq!(out.len(), 16 + rtf.len());
        assert_eq!(&out[0..4], &u32::to_le_bytes(rtf.len() as u32 + 12));
        assert_eq!(&out[4..8], &u32::to_le_bytes(rtf.len() as u32));
        assert_eq!(&out[8..12], b"MELA");
        assert_eq!(&out[12..16], &[0u8; 4]);
        assert_eq!(&out[16..], rtf);
        Ok(())
    }

    #[test]
    fn empty_container() -> Result<(), io::Error> {
        let out = UncompressedRtf::new(Vec::new()).finish()?;
        assert_eq!(out, b"\x0c\x00\x00\x00\x00\x00\x00\x00MELA\x00\x00\x00\x00");
        Ok(())
    }

    #[test]
    fn split_writes() -> Result<(), io::Error> {
        let mut w = UncompressedRtf::new(Vec::new());
        w.write_all(b"{\\rtf1 ")?;
        w.flush()?;
        w.write_all(b"x}")?;
        let out = w.finish()?;
        assert_eq!(&out[4..8], b"\x09\x00\x00\x00");
        assert_eq!(&out[16..], b"{\\rtf1 x}");
        Ok(())
    }
}
