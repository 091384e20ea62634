//! Raw frame log.
//!
//! Frames are handed to a background task over an unbounded channel so the
//! read loop and senders never wait on disk.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone)]
pub enum WireRecord {
    Inbound(String),
    Outbound(String),
}

impl WireRecord {
    fn prefix(&self) -> &'static [u8] {
        match self {
            WireRecord::Inbound(_) => b"<< ",
            WireRecord::Outbound(_) => b">> ",
        }
    }

    fn text(&self) -> &str {
        match self {
            WireRecord::Inbound(s) | WireRecord::Outbound(s) => s,
        }
    }
}

/// Start the writer task appending to `path`.
///
/// If the file cannot be opened the task exits and records are dropped.
pub fn spawn_wire_log(path: PathBuf) -> mpsc::UnboundedSender<WireRecord> {
    let (tx, mut rx) = mpsc::unbounded_channel::<WireRecord>();
    tokio::spawn(async move {
        use tokio::fs::OpenOptions;
        use tokio::io::AsyncWriteExt;

        let mut file = match OpenOptions::new().create(true).append(true).open(&path).await {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "wire log disabled");
                return;
            }
        };

        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        while let Some(rec) = rx.recv().await {
            buf.clear();
            buf.extend_from_slice(rec.prefix());
            buf.extend_from_slice(rec.text().as_bytes());
            buf.push(b'\n');
            if file.write_all(&buf).await.is_err() {
                break;
            }
        }

        let _ = file.flush().await;
    });
    tx
}
