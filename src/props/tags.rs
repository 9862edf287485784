//! MAPI property tags
//!
//! Property type codes from [MS-OXCDATA] 2.11.1 plus the well known
//! property tags used when composing messages
//!
//! The type table here replaces any runtime type discovery: a type code
//! either resolves to a wire layout or the encode operation fails

use super::PropertyTag;

/// 2-byte signed integer
pub const PT_I2: u16 = 0x0002;
/// 4-byte signed integer
pub const PT_LONG: u16 = 0x0003;
/// 4-byte floating point
pub const PT_FLOAT: u16 = 0x0004;
/// 8-byte floating point
pub const PT_DOUBLE: u16 = 0x0005;
/// 8-byte currency integer
pub const PT_CURRENCY: u16 = 0x0006;
/// Floating point date and time
pub const PT_APPTIME: u16 = 0x0007;
/// 4-byte error code
pub const PT_ERROR: u16 = 0x000a;
/// Boolean
pub const PT_BOOLEAN: u16 = 0x000b;
/// Embedded object
pub const PT_OBJECT: u16 = 0x000d;
/// 8-byte signed integer
pub const PT_I8: u16 = 0x0014;
/// 8-bit character string
pub const PT_STRING8: u16 = 0x001e;
/// UTF-16LE character string
pub const PT_UNICODE: u16 = 0x001f;
/// FILETIME date and time
pub const PT_SYSTIME: u16 = 0x0040;
/// GUID
pub const PT_CLSID: u16 = 0x0048;
/// Byte array
pub const PT_BINARY: u16 = 0x0102;

/// ReplyRecipientEntries
pub const REPLY_RECIPIENT_ENTRIES: PropertyTag = PropertyTag::new(0x004f, PT_BINARY);
/// ReplyRecipientNames
pub const REPLY_RECIPIENT_NAMES: PropertyTag = PropertyTag::new(0x0050, PT_UNICODE);
/// Subject
pub const SUBJECT: PropertyTag = PropertyTag::new(0x0037, PT_UNICODE);
/// ClientSubmitTime
pub const CLIENT_SUBMIT_TIME: PropertyTag = PropertyTag::new(0x0039, PT_SYSTIME);
/// SenderName
pub const SENDER_NAME: PropertyTag = PropertyTag::new(0x0c1a, PT_UNICODE);
/// RecipientType
pub const RECIPIENT_TYPE: PropertyTag = PropertyTag::new(0x0c15, PT_LONG);
/// SenderEmailAddress
pub const SENDER_EMAIL_ADDRESS: PropertyTag = PropertyTag::new(0x0c1f, PT_UNICODE);
/// RtfInSync
pub const RTF_IN_SYNC: PropertyTag = PropertyTag::new(0x0e1f, PT_BOOLEAN);
/// Body
pub const BODY: PropertyTag = PropertyTag::new(0x1000, PT_UNICODE);
/// RtfCompressed
pub const RTF_COMPRESSED: PropertyTag = PropertyTag::new(0x1009, PT_BINARY);
/// DisplayName
pub const DISPLAY_NAME: PropertyTag = PropertyTag::new(0x3001, PT_UNICODE);
/// EmailAddress
pub const EMAIL_ADDRESS: PropertyTag = PropertyTag::new(0x3003, PT_UNICODE);
/// CreationTime
pub const CREATION_TIME: PropertyTag = PropertyTag::new(0x3007, PT_SYSTIME);
/// LastModificationTime
pub const LAST_MODIFICATION_TIME: PropertyTag = PropertyTag::new(0x3008, PT_SYSTIME);
/// StoreSupportMask
pub const STORE_SUPPORT_MASK: PropertyTag = PropertyTag::new(0x340d, PT_LONG);
/// AttachDataBinary
pub const ATTACH_DATA: PropertyTag = PropertyTag::new(0x3701, PT_BINARY);
/// AttachFilename
pub const ATTACH_FILENAME: PropertyTag = PropertyTag::new(0x3704, PT_UNICODE);
/// AttachMethod
pub const ATTACH_METHOD: PropertyTag = PropertyTag::new(0x3705, PT_LONG);
/// AttachLongFilename
pub const ATTACH_LONG_FILENAME: PropertyTag = PropertyTag::new(0x3707, PT_UNICODE);
/// AttachMimeTag
pub const ATTACH_MIME_TAG: PropertyTag = PropertyTag::new(0x370e, PT_UNICODE);
/// RecipientDisplayName
pub const RECIPIENT_DISPLAY_NAME: PropertyTag = PropertyTag::new(0x5ff6, PT_UNICODE);

/// The wire layout class of a property type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// The value occupies the 8-byte slot inside the property record
    Fixed,
    /// The value is stored in a separate stream; the record carries its size
    Variable,
}

/// Resolves a property type code to its wire layout
///
/// Multi-valued types and PT_OBJECT do not resolve
pub fn layout(ptype: u16) -> Option<Layout> {
    match ptype {
        PT_I2 | PT_LONG | PT_FLOAT | PT_DOUBLE | PT_CURRENCY | PT_APPTIME | PT_ERROR
        | PT_BOOLEAN | PT_I8 | PT_SYSTIME => Some(Layout::Fixed),
        PT_STRING8 | PT_UNICODE | PT_BINARY | PT_CLSID => Some(Layout::Variable),
        _ => None,
    }
}

// Sorted by id
static TAG_NAMES: &[(u16, &str)] = &[
    (0x0037, "Subject"),
    (0x0039, "ClientSubmitTime"),
    (0x004f, "ReplyRecipientEntries"),
    (0x0050, "ReplyRecipientNames"),
    (0x0c15, "RecipientType"),
    (0x0c1a, "SenderName"),
    (0x0c1f, "SenderEmailAddress"),
    (0x0e1f, "RtfInSync"),
    (0x1000, "Body"),
    (0x1009, "RtfCompressed"),
    (0x3001, "DisplayName"),
    (0x3003, "EmailAddress"),
    (0x3007, "CreationTime"),
    (0x3008, "LastModificationTime"),
    (0x340d, "StoreSupportMask"),
    (0x3701, "AttachDataBinary"),
    (0x3704, "AttachFilename"),
    (0x3705, "AttachMethod"),
    (0x3707, "AttachLongFilename"),
    (0x370e, "AttachMimeTag"),
    (0x5ff6, "RecipientDisplayName"),
];

/// Returns the name of a well known property id
pub fn get_tag_name(id: u16) -> Option<&'static str> {
    TAG_NAMES
        .binary_search_by_key(&id, |(tid, _)| *tid)
        .ok()
        .map(|idx| TAG_NAMES[idx].1)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(get_tag_name(0x0037), Some("Subject"));
        assert_eq!(get_tag_name(0x5ff6), Some("RecipientDisplayName"));
        assert_eq!(get_tag_name(0xbeef), None);
        // the table must stay sorted for the lookup to work
        assert!(TAG_NAMES.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn layouts() {
        assert_eq!(layout(PT_LONG), Some(Layout::Fixed));
        assert_eq!(layout(PT_SYSTIME), Some(Layout::Fixed));
        assert_eq!(layout(PT_UNICODE), Some(Layout::Variable));
        assert_eq!(layout(PT_BINARY), Some(Layout::Variable));
        assert_eq!(layout(PT_CLSID), Some(Layout::Variable));
        assert_eq!(layout(PT_OBJECT), None);
        // multi-valued types are not supported
        assert_eq!(layout(0x101f), None);
    }
}
