#![warn(missing_docs)]
//! Outlook MSG writer
//!
//! Facilities to compose the binary structures of an MS-Outlook MSG file:
//! property streams, recipient and attachment storages, address book
//! EntryID structures and RtfCompressed payloads.
//!
//! The main interface is [`Msg`]; the compound container receiving the
//! composed streams is abstracted behind [`StreamSink`]
//!
//! # Examples
//! ```
//! use ctxmsgw::{MemorySink, Msg, RecipientKind};
//!
//! let mut msg = Msg::new();
//! msg.subject = Some("Hello".to_string());
//! msg.body = Some("Hello world".to_string());
//! msg.add_recipient(RecipientKind::To, "dest@example.com", None);
//! let mut sink = MemorySink::new();
//! msg.write_streams(&mut sink).unwrap();
//! assert!(sink.streams.contains_key("__properties_version1.0"));
//! ```
pub mod crtf;
mod entryid;
mod io;
mod props;

pub use entryid::*;
pub use props::*;

use std::collections::BTreeMap;
use std::io::Write as _;
use thiserror::Error;
use time::OffsetDateTime;
#[allow(unused_imports)]
use tracing::{debug, error, info, warn};

/// Prefix of every property payload stream
pub const STREAM_PREFIX: &str = "__substg1.0_";
/// Name of the property stream within each storage
pub const PROPERTIES_STREAM: &str = "__properties_version1.0";
const NAMEID_STORAGE: &str = "__nameid_version1.0";
const RECIP_STORAGE_PREFIX: &str = "__recip_version1.0_#";
const ATTACH_STORAGE_PREFIX: &str = "__attach_version1.0_#";

/// Maximum number of recipients in a message
pub const MAX_RECIPIENTS: usize = 2048;
/// Maximum number of attachments in a message
pub const MAX_ATTACHMENTS: usize = 2048;

/// The error type for the encoding and decoding operations
///
/// None of these conditions is recoverable: the failed operation leaves no
/// partial output behind
#[derive(Debug, Error)]
pub enum MsgError {
    /// The property type cannot be resolved to a wire layout
    #[error("cannot resolve the type of property {tag}")]
    TypeResolution {
        /// The offending tag
        tag: PropertyTag,
    },
    /// The property value cannot be flattened by the writer
    #[error("unsupported value kind for property {tag}")]
    UnsupportedValueKind {
        /// The offending tag
        tag: PropertyTag,
    },
    /// The input ended before the structure was complete
    #[error("truncated {0} data")]
    TruncatedData(&'static str),
    /// A collection exceeds the format limits
    #[error("too many {kind} (max={max})")]
    CapacityExceeded {
        /// The collection which overflowed
        kind: &'static str,
        /// The maximum allowed count
        max: usize,
    },
    /// Wrapper for [`std::io::Error`](https://doc.rust-lang.org/std/io/struct.Error.html)
    #[error("IO error: {0:?}")]
    Io(#[from] std::io::Error),
}

/// Sink for the named streams of a compound container
///
/// Path components are separated with a `/`; storages materialize from the
/// paths of the streams created within them
pub trait StreamSink {
    /// Creates a stream at `path` holding `data`
    fn create_stream(&mut self, path: &str, data: &[u8]) -> Result<(), std::io::Error>;
}

/// A [`StreamSink`] collecting every stream in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    /// The collected streams, keyed by path
    pub streams: BTreeMap<String, Vec<u8>>,
}

impl MemorySink {
    /// Creates an empty sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamSink for MemorySink {
    fn create_stream(&mut self, path: &str, data: &[u8]) -> Result<(), std::io::Error> {
        self.streams.insert(path.to_string(), data.to_vec());
        Ok(())
    }
}

/// A type of recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientKind {
    /// To
    To,
    /// CC
    Cc,
    /// BCC
    Bcc,
}

impl RecipientKind {
    // RecipientType property value
    fn mapi_value(&self) -> i32 {
        match self {
            Self::To => 1,
            Self::Cc => 2,
            Self::Bcc => 3,
        }
    }
}

/// A message recipient
#[derive(Debug, Clone)]
pub struct Recipient {
    /// Recipient type
    pub kind: RecipientKind,
    /// Display name
    pub name: Option<String>,
    /// E-mail address
    pub email: Option<String>,
}

/// A message attachment
#[derive(Debug, Clone, Default)]
pub struct Attachment {
    /// File name, as shown to the user
    pub name: Option<String>,
    /// MIME type
    pub mime_type: Option<String>,
    /// Attachment content
    pub data: Vec<u8>,
    /// Creation time
    pub ctime: Option<OffsetDateTime>,
    /// Last modification time
    pub mtime: Option<OffsetDateTime>,
}

/// An Outlook message being composed
#[derive(Debug, Default)]
pub struct Msg {
    /// Message subject
    pub subject: Option<String>,
    /// Plain text body
    pub body: Option<String>,
    /// RTF body
    pub rtf_body: Option<String>,
    /// Sender e-mail address
    pub from: Option<String>,
    /// Submit time
    pub client_submit_time: Option<OffsetDateTime>,
    /// Reply-To addresses
    pub reply_to: Vec<String>,
    /// Message recipients
    pub recipients: Vec<Recipient>,
    /// Message attachments
    pub attachments: Vec<Attachment>,
}

impl Msg {
    /// Creates an empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a recipient
    pub fn add_recipient(&mut self, kind: RecipientKind, email: &str, name: Option<&str>) {
        self.recipients.push(Recipient {
            kind,
            name: name.map(str::to_string),
            email: Some(email.to_string()),
        });
    }

    /// Adds an attachment
    pub fn add_attachment(&mut self, name: &str, mime_type: Option<&str>, data: Vec<u8>) {
        self.attachments.push(Attachment {
            name: Some(name.to_string()),
            mime_type: mime_type.map(str::to_string),
            data,
            ..Attachment::default()
        });
    }

    /// Composes the complete stream tree of the message into `sink`
    ///
    /// Fails with [`MsgError::CapacityExceeded`] before any stream is
    /// created if the recipient or attachment count is above the format
    /// limit
    pub fn write_streams<S: StreamSink>(&self, sink: &mut S) -> Result<(), MsgError> {
        if self.recipients.len() > MAX_RECIPIENTS {
            return Err(MsgError::CapacityExceeded {
                kind: "recipients",
                max: MAX_RECIPIENTS,
            });
        }
        if self.attachments.len() > MAX_ATTACHMENTS {
            return Err(MsgError::CapacityExceeded {
                kind: "attachments",
                max: MAX_ATTACHMENTS,
            });
        }

        // The nameid storage and its streams must exist or Outlook refuses
        // to open the file
        for name in ["00020102", "00030102", "00040102"] {
            sink.create_stream(&format!("{NAMEID_STORAGE}/{STREAM_PREFIX}{name}"), &[])?;
        }

        write_encoded(sink, "", self.top_level_stream()?)?;

        for (id, rcpt) in self.recipients.iter().enumerate() {
            let mut storage = StoragePropertyStream::new();
            if let Some(name) = &rcpt.name {
                storage
                    .properties
                    .set(tags::DISPLAY_NAME, PropertyValue::unicode(name));
                storage
                    .properties
                    .set(tags::RECIPIENT_DISPLAY_NAME, PropertyValue::unicode(name));
            }
            if let Some(email) = &rcpt.email {
                storage
                    .properties
                    .set(tags::EMAIL_ADDRESS, PropertyValue::unicode(email));
            }
            storage.properties.set(
                tags::RECIPIENT_TYPE,
                PropertyValue::int32(rcpt.kind.mapi_value()),
            );
            let base = format!("{RECIP_STORAGE_PREFIX}{id:08X}/");
            write_encoded(sink, &base, storage.encode()?)?;
        }

        for (id, attm) in self.attachments.iter().enumerate() {
            let mut storage = StoragePropertyStream::new();
            if let Some(name) = &attm.name {
                storage
                    .properties
                    .set(tags::ATTACH_FILENAME, PropertyValue::unicode(name));
                storage
                    .properties
                    .set(tags::ATTACH_LONG_FILENAME, PropertyValue::unicode(name));
            }
            if let Some(mime) = &attm.mime_type {
                storage
                    .properties
                    .set(tags::ATTACH_MIME_TAG, PropertyValue::unicode(mime));
            }
            // by value
            storage
                .properties
                .set(tags::ATTACH_METHOD, PropertyValue::int32(1));
            storage
                .properties
                .set(tags::ATTACH_DATA, PropertyValue::binary(attm.data.clone()));
            for (tag, dt) in [
                (tags::CREATION_TIME, &attm.ctime),
                (tags::LAST_MODIFICATION_TIME, &attm.mtime),
            ] {
                if let Some(dt) = dt {
                    match PropertyValue::filetime(dt) {
                        Some(v) => storage.properties.set(tag, v),
                        None => warn!("Attachment time out of FILETIME range, skipping {tag}"),
                    }
                }
            }
            let base = format!("{ATTACH_STORAGE_PREFIX}{id:08X}/");
            write_encoded(sink, &base, storage.encode()?)?;
        }
        Ok(())
    }

    fn top_level_stream(&self) -> Result<EncodedProperties, MsgError> {
        let mut top = MessagePropertyStream::new();
        top.recipient_count = self.recipients.len() as u32;
        top.attachment_count = self.attachments.len() as u32;
        top.next_recipient_id = u32::from(!self.recipients.is_empty());
        top.next_attachment_id = u32::from(!self.attachments.is_empty());
        top.properties
            .set_storage_attachment(!self.recipients.is_empty() || !self.attachments.is_empty());

        // all the strings are persisted as Unicode
        top.properties
            .set(tags::STORE_SUPPORT_MASK, PropertyValue::int32(0x0004_0000));
        if let Some(subject) = &self.subject {
            top.properties
                .set(tags::SUBJECT, PropertyValue::unicode(subject));
        }
        if let Some(body) = &self.body {
            top.properties.set(tags::BODY, PropertyValue::unicode(body));
        }
        if let Some(from) = &self.from {
            top.properties
                .set(tags::SENDER_NAME, PropertyValue::unicode(from));
            top.properties
                .set(tags::SENDER_EMAIL_ADDRESS, PropertyValue::unicode(from));
        }
        if let Some(dt) = &self.client_submit_time {
            match PropertyValue::filetime(dt) {
                Some(v) => top.properties.set(tags::CLIENT_SUBMIT_TIME, v),
                None => warn!("Submit time out of FILETIME range, skipped"),
            }
        }
        if !self.reply_to.is_empty() {
            let mut entries: FlatEntryList<OneOffEntryId> = FlatEntryList::new();
            for addr in &self.reply_to {
                entries.push(OneOffEntryId::for_address(addr));
            }
            let names: Vec<&str> = entries.iter().map(|e| e.display_name()).collect();
            top.properties.set(
                tags::REPLY_RECIPIENT_ENTRIES,
                PropertyValue::binary(entries.to_bytes()),
            );
            top.properties.set(
                tags::REPLY_RECIPIENT_NAMES,
                PropertyValue::unicode(&names.join(";")),
            );
        }
        if let Some(rtf) = &self.rtf_body {
            let mut w = crtf::UncompressedRtf::new(Vec::new());
            w.write_all(rtf.as_bytes())?;
            top.properties
                .set(tags::RTF_COMPRESSED, PropertyValue::binary(w.finish()?));
            top.properties
                .set(tags::RTF_IN_SYNC, PropertyValue::boolean(true));
        }
        top.encode()
    }
}

fn write_encoded<S: StreamSink>(
    sink: &mut S,
    base: &str,
    enc: EncodedProperties,
) -> Result<(), MsgError> {
    sink.create_stream(&format!("{base}{PROPERTIES_STREAM}"), &enc.header)?;
    for (name, data) in &enc.payloads {
        sink.create_stream(&format!("{base}{STREAM_PREFIX}{name}"), data)?;
    }
    Ok(())
}
