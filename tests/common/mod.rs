//! Scripted game server on the far end of an in-memory stream.

#![allow(dead_code)]

use std::time::Duration;

use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use chessbot::client::transport::{LineReader, LineWriter};
use chessbot::client::{
    ClientConfig, ConnectionEngine, FrameReader, FrameWriter, LineTransport, SessionEvent,
    Transport,
};

pub const HANDSHAKE: &str = r#"0{"sid":"abc","pingInterval":25000,"pingTimeout":20000}"#;

pub struct FakeServer {
    reader: LineReader<DuplexStream>,
    writer: LineWriter<DuplexStream>,
}

impl FakeServer {
    pub async fn send(&mut self, frame: &str) {
        self.writer.send_frame(frame).await.expect("server send failed");
    }

    /// Next frame from the client; panics after two seconds.
    pub async fn recv(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(2), self.reader.next_frame())
            .await
            .expect("client sent nothing")
            .expect("server read failed")
            .expect("client closed the stream")
    }

    /// Next frame within `limit`, if any.
    pub async fn try_recv(&mut self, limit: Duration) -> Option<String> {
        tokio::time::timeout(limit, self.reader.next_frame())
            .await
            .ok()
            .and_then(|r| r.ok())
            .flatten()
    }

    /// True once the client has closed its end.
    pub async fn client_closed(&mut self) -> bool {
        matches!(
            tokio::time::timeout(Duration::from_secs(2), self.reader.next_frame()).await,
            Ok(Ok(None)) | Ok(Err(_))
        )
    }

    /// Drop the server side of the stream.
    pub async fn hang_up(mut self) {
        let _ = self.writer.close().await;
    }
}

pub fn config(username: &str) -> ClientConfig {
    ClientConfig {
        invite_timeout: Duration::from_secs(1),
        ..ClientConfig::new(username)
    }
}

/// Engine connected to a fake server, handshake not yet sent.
pub async fn connect(
    config: ClientConfig,
) -> (ConnectionEngine, mpsc::UnboundedReceiver<SessionEvent>, FakeServer) {
    let (ours, theirs) = tokio::io::duplex(64 * 1024);
    let (reader, writer) = LineTransport::new(theirs).split();
    let (engine, events) = ConnectionEngine::new(config);
    engine
        .connect_with(LineTransport::new(ours))
        .await
        .expect("connect_with failed");
    (engine, events, FakeServer { reader, writer })
}

/// Engine past handshake and login as `username`.
pub async fn logged_in(
    username: &str,
) -> (ConnectionEngine, mpsc::UnboundedReceiver<SessionEvent>, FakeServer) {
    let (engine, events, mut server) = connect(config(username)).await;
    server.send(HANDSHAKE).await;
    assert_eq!(server.recv().await, "40");
    assert_eq!(
        server.recv().await,
        format!(r#"42["setPlayerName","{username}"]"#)
    );
    server
        .send(&format!(r#"42["playerNameSet",{{"name":"{username}"}}]"#))
        .await;
    assert!(engine
        .wait_for_login(Duration::from_secs(2))
        .await
        .is_reached());
    (engine, events, server)
}
