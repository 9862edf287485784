use ctxmsgw::{FlatEntryList, MemorySink, Msg, OneOffEntryId, RecipientKind, StreamSink};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

fn usage(me: &str) -> ! {
    eprintln!("Usage:");
    eprintln!("{} <message.json> <outdir>", me);
    eprintln!("  Composes the message streams into the <outdir> tree");
    eprintln!("{} <message.json> --list", me);
    eprintln!("  Lists the streams the message would produce");
    eprintln!("{} --oneoff <file>", me);
    eprintln!("  Decodes a FlatEntryList of One-Off EntryIDs from <file>");
    std::process::exit(1);
}

#[derive(Deserialize)]
struct MessageFile {
    subject: Option<String>,
    body: Option<String>,
    rtf_body: Option<String>,
    from: Option<String>,
    #[serde(default)]
    reply_to: Vec<String>,
    #[serde(default)]
    recipients: Vec<RecipientEntry>,
    #[serde(default)]
    attachments: Vec<AttachmentEntry>,
}

#[derive(Deserialize)]
struct RecipientEntry {
    kind: Option<String>,
    email: String,
    name: Option<String>,
}

#[derive(Deserialize)]
struct AttachmentEntry {
    name: String,
    mime_type: Option<String>,
    file: PathBuf,
}

/// Writes each stream as a file inside a directory tree
struct DirSink {
    base: PathBuf,
}

impl StreamSink for DirSink {
    fn create_stream(&mut self, path: &str, data: &[u8]) -> Result<(), io::Error> {
        let target = self.base.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, data)
    }
}

fn load_message(path: &str) -> Result<Msg, Box<dyn std::error::Error>> {
    let f = fs::File::open(path).map_err(|e| {
        eprintln!("Failed to open {}: {}", path, e);
        e
    })?;
    let mf: MessageFile = serde_json::from_reader(f)?;
    let mut msg = Msg::new();
    msg.subject = mf.subject;
    msg.body = mf.body;
    msg.rtf_body = mf.rtf_body;
    msg.from = mf.from;
    msg.reply_to = mf.reply_to;
    for rcpt in &mf.recipients {
        let kind = match rcpt.kind.as_deref() {
            Some("cc") => RecipientKind::Cc,
            Some("bcc") => RecipientKind::Bcc,
            _ => RecipientKind::To,
        };
        msg.add_recipient(kind, &rcpt.email, rcpt.name.as_deref());
    }
    for attm in &mf.attachments {
        let data = fs::read(&attm.file).map_err(|e| {
            eprintln!("Failed to read attachment {:?}: {}", attm.file, e);
            e
        })?;
        msg.add_attachment(&attm.name, attm.mime_type.as_deref(), data);
    }
    Ok(msg)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        usage(&args[0]);
    }

    if args[1] == "--oneoff" {
        let data = fs::read(&args[2]).map_err(|e| {
            eprintln!("Failed to open {}: {}", &args[2], e);
            e
        })?;
        let list: FlatEntryList<OneOffEntryId> = FlatEntryList::from_bytes(&data)?;
        println!("{} entries, {} bytes", list.count(), list.total_size());
        for entry in &list {
            println!("  {} <{}>", entry.display_name(), entry.email_address());
        }
    } else if args[2] == "--list" {
        let msg = load_message(&args[1])?;
        let mut sink = MemorySink::new();
        msg.write_streams(&mut sink)?;
        for (path, data) in &sink.streams {
            println!("{:8} {}", data.len(), path);
        }
    } else {
        let msg = load_message(&args[1])?;
        let mut sink = DirSink {
            base: PathBuf::from(&args[2]),
        };
        msg.write_streams(&mut sink)?;
    }
    Ok(())
}
