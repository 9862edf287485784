//! Address book EntryID structures
//!
//! Implements the FlatEntry, FlatEntryList and One-Off EntryID structures
//! from [MS-OXCDATA] 2.3.2, 2.3.3 and 2.2.5.1; a FlatEntryList of One-Off
//! entries is the payload of the ReplyRecipientEntries property
use crate::MsgError;
use crate::io::*;
use crate::props::utf16le_bytes;
use std::char::{REPLACEMENT_CHARACTER, decode_utf16};
use std::io::{self, Cursor, Read};
#[allow(unused_imports)]
use tracing::{debug, error, info, warn};

/// Rounds up to the next multiple of 4
#[inline]
fn align4(n: usize) -> usize {
    (n + 3) & !3
}

fn map_eof(e: io::Error) -> MsgError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        MsgError::TruncatedData("FlatEntryList")
    } else {
        e.into()
    }
}

/// Conversion between a typed entry and its EntryID payload
pub trait FlatEntryCodec: Sized {
    /// Builds the entry from its EntryID payload
    fn from_entry_bytes(bytes: Vec<u8>) -> Result<Self, MsgError>;
    /// Returns the EntryID payload
    fn entry_bytes(&self) -> &[u8];
}

/// An opaque length prefixed entry ([MS-OXCDATA] 2.3.2)
///
/// The declared size is derived from the payload and cannot get out of sync
/// with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntry {
    entry_id: Vec<u8>,
}

impl FlatEntry {
    /// Creates an entry from its EntryID bytes
    pub fn new(entry_id: Vec<u8>) -> Self {
        Self { entry_id }
    }

    /// The number of bytes of the EntryID field
    pub fn size(&self) -> u32 {
        self.entry_id.len() as u32
    }

    /// The EntryID bytes
    pub fn entry_id(&self) -> &[u8] {
        &self.entry_id
    }

    /// Replaces the EntryID bytes
    pub fn set_entry_id(&mut self, entry_id: Vec<u8>) {
        self.entry_id = entry_id;
    }
}

impl FlatEntryCodec for FlatEntry {
    fn from_entry_bytes(bytes: Vec<u8>) -> Result<Self, MsgError> {
        Ok(Self::new(bytes))
    }

    fn entry_bytes(&self) -> &[u8] {
        &self.entry_id
    }
}

/// A sequence of entries in the FlatEntryList wire format
/// ([MS-OXCDATA] 2.3.3)
///
/// Each serialized entry starts at a 4-byte boundary relative to the list
/// start; the entry count and the total byte size are always derived from
/// the list itself
#[derive(Debug)]
pub struct FlatEntryList<T: FlatEntryCodec> {
    entries: Vec<T>,
}

impl<T: FlatEntryCodec> FlatEntryList<T> {
    /// Creates an empty list
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The number of entries
    pub fn count(&self) -> u32 {
        self.entries.len() as u32
    }

    /// The byte size of all serialized entries, length prefixes and
    /// alignment padding included
    pub fn total_size(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| align4(4 + e.entry_bytes().len()) as u32)
            .sum()
    }

    /// Appends an entry
    pub fn push(&mut self, entry: T) {
        self.entries.push(entry);
    }

    /// The entries
    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    /// Returns an iterator over the entries
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    /// Serializes the list
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.total_size() as usize);
        out.extend_from_slice(&self.count().to_le_bytes());
        out.extend_from_slice(&self.total_size().to_le_bytes());
        for entry in &self.entries {
            let bytes = entry.entry_bytes();
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(bytes);
            let pad = align4(4 + bytes.len()) - 4 - bytes.len();
            out.resize(out.len() + pad, 0);
        }
        out
    }

    /// Parses a serialized list
    ///
    /// Truncated input fails with [`MsgError::TruncatedData`]; no partial
    /// list is ever returned. The content of the alignment padding is
    /// ignored (Outlook produced files carry junk there).
    pub fn from_bytes(buf: &[u8]) -> Result<Self, MsgError> {
        let mut r = Cursor::new(buf);
        let count = rdu32le(&mut r).map_err(map_eof)?;
        let declared_size = rdu32le(&mut r).map_err(map_eof)?;
        let mut entries: Vec<T> = Vec::new();
        for _ in 0..count {
            let start = r.position();
            let len = rdu32le(&mut r).map_err(map_eof)?;
            if u64::from(len) > (buf.len() as u64).saturating_sub(r.position()) {
                return Err(MsgError::TruncatedData("FlatEntryList"));
            }
            let mut bytes = vec![0u8; len as usize];
            r.read_exact(&mut bytes).map_err(map_eof)?;
            entries.push(T::from_entry_bytes(bytes)?);
            r.set_position(start + align4(4 + len as usize) as u64);
        }
        let list = Self { entries };
        if list.total_size() != declared_size {
            debug!(
                "FlatEntryList declared size {declared_size} does not match computed size {}",
                list.total_size()
            );
        }
        Ok(list)
    }
}

impl<T: FlatEntryCodec> Default for FlatEntryList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: FlatEntryCodec> IntoIterator for &'a FlatEntryList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// Long-term EntryID
const ONE_OFF_FLAGS: [u8; 4] = [0; 4];
// The One-Off EntryID provider UID, constant per [MS-OXCDATA] 2.2.5.1
const ONE_OFF_PROVIDER_UID: [u8; 16] = [
    0x81, 0x2b, 0x1f, 0xa4, 0xbe, 0xa3, 0x10, 0x19, 0x9d, 0x6e, 0x00, 0xdd, 0x01, 0x0f, 0x54,
    0x02,
];
const ONE_OFF_VERSION: [u8; 2] = [0; 2];
// Bitfield with the U flag set: the text fields are UTF-16LE
const ONE_OFF_FORMAT: [u8; 2] = [0x01, 0x90];
// "SMTP", terminated
const ONE_OFF_ADDRESS_TYPE: &[u8] = b"S\0M\0T\0P\0\0\0";
const ONE_OFF_PREAMBLE_LEN: usize = 24;

/// A One-Off EntryID ([MS-OXCDATA] 2.2.5.1): an ad hoc SMTP recipient
/// identified by display name and e-mail address
///
/// The name and address are views over the EntryID payload; changing them
/// requires encoding a new entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneOffEntryId {
    entry_id: Vec<u8>,
    display_name: String,
    email_address: String,
}

impl OneOffEntryId {
    /// Encodes a One-Off EntryID for the given display name and address
    pub fn new(display_name: &str, email_address: &str) -> Self {
        let name_bytes = utf16le_bytes(display_name);
        let addr_bytes = utf16le_bytes(email_address);
        let mut entry_id = Vec::with_capacity(
            ONE_OFF_PREAMBLE_LEN + name_bytes.len() + 2 + ONE_OFF_ADDRESS_TYPE.len()
                + addr_bytes.len()
                + 2,
        );
        entry_id.extend_from_slice(&ONE_OFF_FLAGS);
        entry_id.extend_from_slice(&ONE_OFF_PROVIDER_UID);
        entry_id.extend_from_slice(&ONE_OFF_VERSION);
        entry_id.extend_from_slice(&ONE_OFF_FORMAT);
        entry_id.extend_from_slice(&name_bytes);
        entry_id.extend_from_slice(&[0, 0]);
        entry_id.extend_from_slice(ONE_OFF_ADDRESS_TYPE);
        entry_id.extend_from_slice(&addr_bytes);
        entry_id.extend_from_slice(&[0, 0]);
        Self {
            entry_id,
            display_name: display_name.to_string(),
            email_address: email_address.to_string(),
        }
    }

    /// Encodes a One-Off EntryID using the address as display name too
    pub fn for_address(email_address: &str) -> Self {
        Self::new(email_address, email_address)
    }

    /// The display name
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The e-mail address
    pub fn email_address(&self) -> &str {
        &self.email_address
    }

    /// The number of bytes of the EntryID payload
    pub fn size(&self) -> u32 {
        self.entry_id.len() as u32
    }
}

impl FlatEntryCodec for OneOffEntryId {
    fn from_entry_bytes(bytes: Vec<u8>) -> Result<Self, MsgError> {
        if bytes.len() < ONE_OFF_PREAMBLE_LEN {
            return Err(MsgError::TruncatedData("OneOffEntryID"));
        }
        if bytes[4..20] != ONE_OFF_PROVIDER_UID {
            debug!("OneOffEntryID with unexpected provider UID");
        }
        let mut rest = &bytes[ONE_OFF_PREAMBLE_LEN..];
        let display_name = read_utf16le_cstr(&mut rest);
        // the address type is not exposed
        let _address_type = read_utf16le_cstr(&mut rest);
        let email_address = read_utf16le_cstr(&mut rest);
        Ok(Self {
            entry_id: bytes,
            display_name,
            email_address,
        })
    }

    fn entry_bytes(&self) -> &[u8] {
        &self.entry_id
    }
}

/// Reads a null terminated UTF-16LE string, advancing the slice past the
/// terminator; decoding is lossy
fn read_utf16le_cstr(buf: &mut &[u8]) -> String {
    let mut units: Vec<u16> = Vec::new();
    while buf.len() >= 2 {
        let unit = u16::from_le_bytes([buf[0], buf[1]]);
        *buf = &buf[2..];
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    decode_utf16(units)
        .map(|r| r.unwrap_or(REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flat_entry_list_wire_format() -> Result<(), MsgError> {
        let mut list: FlatEntryList<FlatEntry> = FlatEntryList::new();
        list.push(FlatEntry::new(vec![1, 2, 3, 4]));
        assert_eq!(list.count(), 1);
        assert_eq!(list.total_size(), 8);
        let bytes = list.to_bytes();
        assert_eq!(
            bytes,
            b"\x01\x00\x00\x00\x08\x00\x00\x00\x04\x00\x00\x00\x01\x02\x03\x04"
        );

        let decoded: FlatEntryList<FlatEntry> = FlatEntryList::from_bytes(&bytes)?;
        assert_eq!(decoded.count(), 1);
        assert_eq!(decoded.total_size(), 8);
        assert_eq!(decoded.entries()[0].entry_id(), [1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn alignment_padding() -> Result<(), MsgError> {
        let mut list: FlatEntryList<FlatEntry> = FlatEntryList::new();
        list.push(FlatEntry::new(vec![0xaa, 0xbb, 0xcc]));
        list.push(FlatEntry::new(vec![0xdd]));
        // each entry is padded to a 4-byte boundary, the last one included
        assert_eq!(list.total_size(), 16);
        let bytes = list.to_bytes();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[8..16], b"\x03\x00\x00\x00\xaa\xbb\xcc\x00");
        assert_eq!(&bytes[16..24], b"\x01\x00\x00\x00\xdd\x00\x00\x00");

        let decoded: FlatEntryList<FlatEntry> = FlatEntryList::from_bytes(&bytes)?;
        assert_eq!(decoded.count(), 2);
        assert_eq!(decoded.entries()[0].entry_id(), [0xaa, 0xbb, 0xcc]);
        assert_eq!(decoded.entries()[1].entry_id(), [0xdd]);
        Ok(())
    }

    #[test]
    fn entry_roundtrip_arbitrary() -> Result<(), MsgError> {
        let payloads: Vec<Vec<u8>> = (0u8..7).map(|i| vec![i; usize::from(i) * 3 + 1]).collect();
        let mut list: FlatEntryList<FlatEntry> = FlatEntryList::new();
        for p in &payloads {
            list.push(FlatEntry::new(p.clone()));
        }
        let decoded: FlatEntryList<FlatEntry> = FlatEntryList::from_bytes(&list.to_bytes())?;
        assert_eq!(decoded.count(), list.count());
        assert_eq!(decoded.total_size(), list.total_size());
        for (entry, payload) in decoded.iter().zip(&payloads) {
            assert_eq!(entry.entry_id(), payload.as_slice());
            assert_eq!(entry.size() as usize, payload.len());
        }
        Ok(())
    }

    #[test]
    fn truncated_input() {
        // header cut short
        assert!(matches!(
            FlatEntryList::<FlatEntry>::from_bytes(b"\x01\x00\x00"),
            Err(MsgError::TruncatedData(_))
        ));
        // entry length points past the end
        assert!(matches!(
            FlatEntryList::<FlatEntry>::from_bytes(
                b"\x01\x00\x00\x00\x08\x00\x00\x00\x09\x00\x00\x00\x01\x02"
            ),
            Err(MsgError::TruncatedData(_))
        ));
        // second entry missing
        assert!(matches!(
            FlatEntryList::<FlatEntry>::from_bytes(
                b"\x02\x00\x00\x00\x10\x00\x00\x00\x04\x00\x00\x00\x01\x02\x03\x04"
            ),
            Err(MsgError::TruncatedData(_))
        ));
    }

    #[test]
    fn set_entry_id_updates_size() {
        let mut entry = FlatEntry::new(vec![1, 2, 3, 4]);
        assert_eq!(entry.size(), 4);
        entry.set_entry_id(vec![5, 6]);
        assert_eq!(entry.size(), 2);
        assert_eq!(entry.entry_id(), [5, 6]);
    }

    #[test]
    fn one_off_layout() {
        let entry = OneOffEntryId::new("A", "a@b.com");
        let bytes = entry.entry_bytes();
        assert_eq!(&bytes[0..4], &[0u8; 4]);
        assert_eq!(&bytes[4..20], &ONE_OFF_PROVIDER_UID);
        assert_eq!(&bytes[20..24], b"\x00\x00\x01\x90");
        assert_eq!(&bytes[24..28], b"A\0\0\0");
        assert_eq!(&bytes[28..38], b"S\0M\0T\0P\0\0\0");
        assert_eq!(&bytes[38..], b"a\0@\0b\0.\0c\0o\0m\0\0\0");
        assert_eq!(entry.size(), 54);

        let decoded = OneOffEntryId::from_entry_bytes(bytes.to_vec()).unwrap();
        assert_eq!(decoded.display_name(), "A");
        assert_eq!(decoded.email_address(), "a@b.com");
    }

    #[test]
    fn one_off_roundtrip() -> Result<(), MsgError> {
        let entry = OneOffEntryId::new("Reply Address", "reply@test.com");
        let decoded = OneOffEntryId::from_entry_bytes(entry.entry_bytes().to_vec())?;
        assert_eq!(decoded.display_name(), "Reply Address");
        assert_eq!(decoded.email_address(), "reply@test.com");
        assert_eq!(decoded, entry);

        // non-BMP characters survive the UTF-16 surrogate encoding
        let entry = OneOffEntryId::new("Bob \u{1f980}", "bob@example.com");
        let decoded = OneOffEntryId::from_entry_bytes(entry.entry_bytes().to_vec())?;
        assert_eq!(decoded.display_name(), "Bob \u{1f980}");
        Ok(())
    }

    #[test]
    fn one_off_single_address_form() {
        let entry = OneOffEntryId::for_address("test@test.com");
        assert_eq!(entry.display_name(), "test@test.com");
        assert_eq!(entry.email_address(), "test@test.com");
        // 24 + 28 + 10 + 28
        assert_eq!(entry.size(), 90);
    }

    #[test]
    fn one_off_truncated() {
        assert!(matches!(
            OneOffEntryId::from_entry_bytes(vec![0u8; 23]),
            Err(MsgError::TruncatedData(_))
        ));
    }

    #[test]
    fn one_off_list_roundtrip() -> Result<(), MsgError> {
        let mut list: FlatEntryList<OneOffEntryId> = FlatEntryList::new();
        list.push(OneOffEntryId::for_address("reply1@test.com"));
        list.push(OneOffEntryId::for_address("reply2@test.com"));
        // sizes as found in real Outlook produced files
        assert_eq!(list.entries()[0].size(), 98);
        assert_eq!(list.total_size(), 208);

        let decoded: FlatEntryList<OneOffEntryId> = FlatEntryList::from_bytes(&list.to_bytes())?;
        assert_eq!(decoded.count(), 2);
        assert_eq!(decoded.entries()[0].email_address(), "reply1@test.com");
        assert_eq!(decoded.entries()[1].email_address(), "reply2@test.com");
        for (a, b) in list.iter().zip(decoded.iter()) {
            assert_eq!(a.entry_bytes(), b.entry_bytes());
            assert_eq!(a.display_name(), b.display_name());
        }
        Ok(())
    }
}
