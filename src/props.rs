//! Message property encoding
//!
//! Writer side of the `__properties_version1.0` streams found in every
//! message, recipient and attachment storage; the layout rules come from
//! [MS-OXMSG] 2.4.
//!
//! Intended for internal use but publicly exposed for research purposes and
//! low level operations
pub mod tags;

use crate::MsgError;
use crate::io::*;
use bitflags::bitflags;
use std::collections::HashMap;
use std::fmt;
use tags::{PT_OBJECT, PT_STRING8, PT_UNICODE};
#[allow(unused_imports)]
use tracing::{debug, error, info, warn};

bitflags! {
    /// Access flags stored with every property record
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PropertyFlags: u32 {
        /// The property is readable
        const READABLE = 0x2;
        /// The property is writeable
        const WRITEABLE = 0x4;
    }
}

/// A property id together with its type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyTag {
    /// Property id
    pub id: u16,
    /// Property type
    pub ptype: u16,
}

impl PropertyTag {
    /// Creates a tag from a property id and a type code
    pub const fn new(id: u16, ptype: u16) -> Self {
        Self { id, ptype }
    }

    /// Returns the tag with the legacy 8-bit string type promoted to Unicode
    ///
    /// The format only persists Unicode strings; promotion happens before
    /// any layout decision and before the stream name is computed
    pub fn normalized(&self) -> Self {
        if self.ptype == PT_STRING8 {
            Self::new(self.id, PT_UNICODE)
        } else {
            *self
        }
    }

    /// The canonical payload stream name (`__substg1.0_` prefix excluded)
    pub fn stream_name(&self) -> String {
        let norm = self.normalized();
        format!("{:04X}{:04X}", norm.id, norm.ptype)
    }

    fn tag32(&self) -> u32 {
        let norm = self.normalized();
        (u32::from(norm.id) << 16) | u32::from(norm.ptype)
    }
}

impl fmt::Display for PropertyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = tags::get_tag_name(self.id) {
            write!(f, "{} ({:04x}:{:04x})", name, self.id, self.ptype)
        } else {
            write!(f, "{:04x}:{:04x}", self.id, self.ptype)
        }
    }
}

/// Translates a [datetime](time::OffsetDateTime) to a windows FILETIME
///
/// Returns None if the date is out of range
pub fn datetime_to_filetime(dt: &time::OffsetDateTime) -> Option<u64> {
    let ticks = dt.unix_timestamp_nanos() / 100 + 116444736000000000;
    u64::try_from(ticks).ok()
}

/// Encodes a string as UTF-16LE, without terminator
pub(crate) fn utf16le_bytes(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() * 2);
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// A property value in wire form
#[derive(Debug, Clone)]
pub struct PropertyValue {
    /// Access flags
    pub flags: PropertyFlags,
    /// Raw payload bytes; `None` marks an absent value, skipped on encode
    pub data: Option<Vec<u8>>,
}

impl PropertyValue {
    /// Creates a value from raw payload bytes
    pub fn raw(data: Vec<u8>) -> Self {
        Self {
            flags: PropertyFlags::READABLE | PropertyFlags::WRITEABLE,
            data: Some(data),
        }
    }

    /// Creates an absent value
    pub fn absent() -> Self {
        Self {
            flags: PropertyFlags::READABLE | PropertyFlags::WRITEABLE,
            data: None,
        }
    }

    /// UTF-16LE string value; the terminator is not stored but is accounted
    /// for in the record size
    pub fn unicode(s: &str) -> Self {
        Self::raw(utf16le_bytes(s))
    }

    /// Byte array value
    pub fn binary(data: Vec<u8>) -> Self {
        Self::raw(data)
    }

    /// 16-bit integer value
    pub fn int16(v: i16) -> Self {
        Self::raw(v.to_le_bytes().to_vec())
    }

    /// 32-bit integer value
    pub fn int32(v: i32) -> Self {
        Self::raw(v.to_le_bytes().to_vec())
    }

    /// 64-bit integer value
    pub fn int64(v: i64) -> Self {
        Self::raw(v.to_le_bytes().to_vec())
    }

    /// 64-bit floating point value
    pub fn float64(v: f64) -> Self {
        Self::raw(v.to_le_bytes().to_vec())
    }

    /// Boolean value
    pub fn boolean(v: bool) -> Self {
        Self::raw(vec![u8::from(v)])
    }

    /// Datetime value as a windows FILETIME
    ///
    /// Returns None if the date is out of range
    pub fn filetime(dt: &time::OffsetDateTime) -> Option<Self> {
        datetime_to_filetime(dt).map(|ft| Self::raw(ft.to_le_bytes().to_vec()))
    }

    /// Replaces the default access flags
    pub fn with_flags(mut self, flags: PropertyFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// The result of encoding a property set
///
/// The header is the `__properties_version1.0` stream content; each payload
/// belongs in a `__substg1.0_` + name stream inside the same storage
#[derive(Debug, Default)]
pub struct EncodedProperties {
    /// Property stream bytes
    pub header: Vec<u8>,
    /// Variable length payloads as (canonical stream name, bytes)
    pub payloads: Vec<(String, Vec<u8>)>,
}

/// A set of properties to be encoded as a property stream
///
/// Properties are keyed by tag: setting a tag twice keeps the last value.
/// The order in which the records are serialized is unspecified.
#[derive(Debug, Default)]
pub struct PropertyStream {
    properties: HashMap<PropertyTag, PropertyValue>,
    storage_attachment: bool,
}

impl PropertyStream {
    /// Creates an empty property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property value (multi-valued properties are not supported)
    pub fn set(&mut self, tag: PropertyTag, value: PropertyValue) {
        self.properties.insert(tag, value);
    }

    /// Returns the value set for a tag
    pub fn get(&self, tag: PropertyTag) -> Option<&PropertyValue> {
        self.properties.get(&tag)
    }

    /// Defines whether the message carries storage attachments
    ///
    /// When set, the size of every variable length record is deferred:
    /// 0xFFFFFFFF with the reserved field set to 0x00000004
    pub fn set_storage_attachment(&mut self, v: bool) {
        self.storage_attachment = v;
    }

    /// Whether the storage attachment marker is set
    pub fn storage_attachment(&self) -> bool {
        self.storage_attachment
    }

    /// Encodes the property set into a header and its detached payloads
    pub fn encode(&self) -> Result<EncodedProperties, MsgError> {
        let mut enc = EncodedProperties::default();
        self.encode_into(&mut enc)?;
        Ok(enc)
    }

    pub(crate) fn encode_into(&self, enc: &mut EncodedProperties) -> Result<(), MsgError> {
        for (tag, value) in &self.properties {
            let Some(data) = value.data.as_ref() else {
                debug!("Skipping absent value for property {tag}");
                continue;
            };
            if tag.ptype == PT_OBJECT {
                // embedded objects cannot be flattened
                return Err(MsgError::UnsupportedValueKind { tag: *tag });
            }
            let layout = tags::layout(tag.normalized().ptype)
                .ok_or(MsgError::TypeResolution { tag: *tag })?;
            wru32le(&mut enc.header, tag.tag32())?;
            wru32le(&mut enc.header, value.flags.bits())?;
            match layout {
                tags::Layout::Fixed => {
                    if data.len() > 8 {
                        return Err(MsgError::UnsupportedValueKind { tag: *tag });
                    }
                    enc.header.extend_from_slice(data);
                    enc.header.resize(enc.header.len() + 8 - data.len(), 0);
                }
                tags::Layout::Variable => {
                    if self.storage_attachment {
                        wru32le(&mut enc.header, 0xffffffff)?;
                        wru32le(&mut enc.header, 0x00000004)?;
                    } else {
                        // the terminator is not stored but the size counts it
                        let terminator = match tag.ptype {
                            PT_UNICODE => 2,
                            PT_STRING8 => 1,
                            _ => 0,
                        };
                        let size = u32::try_from(data.len())
                            .ok()
                            .and_then(|sz| sz.checked_add(terminator))
                            .ok_or(MsgError::UnsupportedValueKind { tag: *tag })?;
                        wru32le(&mut enc.header, size)?;
                        wru32le(&mut enc.header, 0)?;
                    }
                    enc.payloads.push((tag.stream_name(), data.clone()));
                }
            }
        }
        Ok(())
    }
}

/// A property set with the top level stream header ([MS-OXMSG] 2.4.1.1)
#[derive(Debug, Default)]
pub struct MessagePropertyStream {
    /// The property set
    pub properties: PropertyStream,
    /// Next available recipient id
    pub next_recipient_id: u32,
    /// Next available attachment id
    pub next_attachment_id: u32,
    /// Number of recipient storages
    pub recipient_count: u32,
    /// Number of attachment storages
    pub attachment_count: u32,
}

impl MessagePropertyStream {
    /// Creates an empty top level property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes the property set into a header and its detached payloads
    pub fn encode(&self) -> Result<EncodedProperties, MsgError> {
        let mut enc = EncodedProperties::default();
        enc.header.extend_from_slice(&[0u8; 8]); // reserved
        wru32le(&mut enc.header, self.next_recipient_id)?;
        wru32le(&mut enc.header, self.next_attachment_id)?;
        wru32le(&mut enc.header, self.recipient_count)?;
        wru32le(&mut enc.header, self.attachment_count)?;
        enc.header.extend_from_slice(&[0u8; 8]); // reserved
        self.properties.encode_into(&mut enc)?;
        Ok(enc)
    }
}

/// A property set with the recipient/attachment storage stream header
/// ([MS-OXMSG] 2.4.1.3)
#[derive(Debug, Default)]
pub struct StoragePropertyStream {
    /// The property set
    pub properties: PropertyStream,
}

impl StoragePropertyStream {
    /// Creates an empty storage property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes the property set into a header and its detached payloads
    pub fn encode(&self) -> Result<EncodedProperties, MsgError> {
        let mut enc = EncodedProperties::default();
        enc.header.extend_from_slice(&[0u8; 8]); // reserved
        self.properties.encode_into(&mut enc)?;
        Ok(enc)
    }
}
