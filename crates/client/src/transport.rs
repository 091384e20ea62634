//! Message transports carrying raw Socket.IO text frames.
//!
//! A transport splits into a reader half, owned by the connection's read loop,
//! and a writer half, kept behind the connection's send lock.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::ClientError;

#[async_trait]
pub trait FrameReader: Send + 'static {
    /// Next text frame, or `None` once the peer has closed the stream.
    async fn next_frame(&mut self) -> Result<Option<String>, ClientError>;
}

#[async_trait]
pub trait FrameWriter: Send + 'static {
    async fn send_frame(&mut self, frame: &str) -> Result<(), ClientError>;

    async fn close(&mut self) -> Result<(), ClientError>;
}

pub trait Transport: Send + 'static {
    type Reader: FrameReader;
    type Writer: FrameWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}

// ============== Newline-delimited stream ==============

/// One frame per line over any byte stream.
///
/// Used with `tokio::io::duplex` in tests and for plain TCP relays.
pub struct LineTransport<S> {
    stream: S,
}

impl<S> LineTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

pub struct LineReader<S> {
    reader: BufReader<ReadHalf<S>>,
    line: String,
}

pub struct LineWriter<S> {
    writer: WriteHalf<S>,
}

impl<S> Transport for LineTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    type Reader = LineReader<S>;
    type Writer = LineWriter<S>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (read_half, write_half) = tokio::io::split(self.stream);
        (
            LineReader {
                reader: BufReader::new(read_half),
                line: String::new(),
            },
            LineWriter { writer: write_half },
        )
    }
}

#[async_trait]
impl<S> FrameReader for LineReader<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn next_frame(&mut self) -> Result<Option<String>, ClientError> {
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line).await?;
            if n == 0 {
                return Ok(None);
            }
            let frame = self.line.trim_end_matches(['\r', '\n']);
            if frame.is_empty() {
                continue;
            }
            return Ok(Some(frame.to_string()));
        }
    }
}

#[async_trait]
impl<S> FrameWriter for LineWriter<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn send_frame(&mut self, frame: &str) -> Result<(), ClientError> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

// ============== WebSocket ==============

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket.IO's `websocket` transport.
pub struct WsTransport {
    stream: WsStream,
}

impl WsTransport {
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let url = config.websocket_url();
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ClientError::InvalidAddress(format!("{url}: {e}")))?;
        let origin = HeaderValue::from_str(&config.origin())
            .map_err(|e| ClientError::InvalidAddress(format!("{url}: {e}")))?;
        request.headers_mut().insert("Origin", origin);

        debug!(%url, "opening websocket");
        let (stream, response) = tokio_tungstenite::connect_async(request).await?;
        debug!(status = %response.status(), "websocket upgraded");
        Ok(Self { stream })
    }
}

pub struct WsReader {
    stream: SplitStream<WsStream>,
}

pub struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

impl Transport for WsTransport {
    type Reader = WsReader;
    type Writer = WsWriter;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (sink, stream) = self.stream.split();
        (WsReader { stream }, WsWriter { sink })
    }
}

#[async_trait]
impl FrameReader for WsReader {
    async fn next_frame(&mut self) -> Result<Option<String>, ClientError> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => return Ok(Some(text.to_string())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "websocket close frame");
                    return Ok(None);
                }
                Ok(other) => trace!(?other, "skipping non-text message"),
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl FrameWriter for WsWriter {
    async fn send_frame(&mut self, frame: &str) -> Result<(), ClientError> {
        self.sink.send(Message::Text(frame.to_string().into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        match self.sink.close().await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
