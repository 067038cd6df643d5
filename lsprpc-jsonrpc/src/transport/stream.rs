//! Defines a JSON RPC transport that communicates with a server over two async streams, one for
//! reading and one for writing.
//!
//! This is used for language servers listening on a TCP socket or spawned as a child process
//! speaking over stdin and stdout, and is also useful for creating tests that simulate a client
//! and server communicating over a network.

use super::JsonRpcTransport;
use crate::error::TransportError;
use serde::Deserialize;
use std::fmt::{Debug, Formatter};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tracing::*;

/// Give up on a response after skipping this many server-initiated messages
const MAX_SKIPPED_MESSAGES: usize = 1000;

/// Largest `Content-Length` we're willing to allocate a buffer for
const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

/// How message boundaries are marked on the stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Framing {
    /// One JSON message per line
    #[default]
    Lines,

    /// The LSP base protocol: `Content-Length: N` and optionally other headers, a blank line,
    /// then exactly N bytes of JSON.
    ContentLength,
}

struct StreamHalves<R, W> {
    reader: R,
    writer: W,

    /// Set when an exchange fails part way.  The stream is then no longer known to be at a
    /// message boundary, and a late response would be taken as the answer to the next request.
    broken: bool,

    /// The server process, if we spawned it.  Killed on drop.
    child: Option<Child>,
}

impl<R, W> StreamHalves<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn exchange(&mut self, framing: Framing, message: &str) -> Result<String, TransportError> {
        write_message(&mut self.writer, framing, message).await?;

        // Servers are free to send their own notifications (log messages, diagnostics, ...) at
        // any time.  None of those are the response we're waiting for.
        for _ in 0..MAX_SKIPPED_MESSAGES {
            let response = read_message(&mut self.reader, framing).await?;
            if is_server_message(&response) {
                debug!(message = %response, "Skipping server-initiated message");
                continue;
            }
            return Ok(response);
        }

        Err(TransportError::Framing(format!(
            "no response after skipping {} server messages",
            MAX_SKIPPED_MESSAGES
        )))
    }

    fn check_usable(&self) -> Result<(), TransportError> {
        if self.broken {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    fn mark_broken(&mut self, error: &TransportError) {
        warn!(%error, "Stream transport is unusable after a failed exchange");
        self.broken = true;
    }
}

pub struct StreamTransport<R, W> {
    /// Held for the entire write-then-read exchange, so that concurrent callers can never read
    /// each other's responses
    halves: Mutex<StreamHalves<R, W>>,
    framing: Framing,
    timeout: Option<Duration>,
}

impl<R, W> Debug for StreamTransport<R, W> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("framing", &self.framing)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W, framing: Framing) -> Self {
        Self {
            halves: Mutex::new(StreamHalves {
                reader,
                writer,
                broken: false,
                child: None,
            }),
            framing,
            timeout: None,
        }
    }

    /// Give up waiting for a response after `timeout`.  A request that times out leaves the
    /// transport unusable, and every later request fails with [`TransportError::Closed`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait::async_trait]
impl<R, W> JsonRpcTransport for StreamTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn request(&self, message: String) -> Result<String, TransportError> {
        let mut halves = self.halves.lock().await;
        halves.check_usable()?;

        let result = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, halves.exchange(self.framing, &message))
                .await
                .unwrap_or(Err(TransportError::Timeout(timeout))),
            None => halves.exchange(self.framing, &message).await,
        };

        if let Err(e) = &result {
            halves.mark_broken(e);
        }
        result
    }

    async fn notify(&self, message: String) -> Result<(), TransportError> {
        let mut halves = self.halves.lock().await;
        halves.check_usable()?;

        let result = write_message(&mut halves.writer, self.framing, &message).await;
        if let Err(e) = &result {
            halves.mark_broken(e);
        }
        result
    }
}

/// Stream transport over a TCP connection
pub type TcpTransport = StreamTransport<
    BufReader<tokio::net::tcp::OwnedReadHalf>,
    BufWriter<tokio::net::tcp::OwnedWriteHalf>,
>;

impl TcpTransport {
    pub async fn connect_tcp(
        addr: impl tokio::net::ToSocketAddrs,
        framing: Framing,
    ) -> Result<Self, TransportError> {
        let stream = tokio::net::TcpStream::connect(addr).await?;
        debug!(peer = ?stream.peer_addr().ok(), "Connected to JSON-RPC server");
        let (reader, writer) = stream.into_split();

        Ok(Self::new(BufReader::new(reader), BufWriter::new(writer), framing))
    }
}

/// Stream transport over the stdin and stdout of a server running as a child process
pub type StdioTransport = StreamTransport<BufReader<ChildStdout>, BufWriter<ChildStdin>>;

impl StdioTransport {
    /// Spawn `command` with its stdin and stdout piped to the transport.  stderr is inherited.
    /// The process is killed when the transport is dropped.
    pub fn spawn(
        command: &mut tokio::process::Command,
        framing: Framing,
    ) -> Result<Self, TransportError> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "failed to capture child stdin")
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "failed to capture child stdout")
        })?;
        debug!(pid = ?child.id(), "Spawned JSON-RPC server");

        let mut transport = Self::new(BufReader::new(stdout), BufWriter::new(stdin), framing);
        transport.halves.get_mut().child = Some(child);
        Ok(transport)
    }
}

/// Anything with a `method` member was sent on the server's initiative rather than in response
/// to us
fn is_server_message(message: &str) -> bool {
    #[derive(Deserialize)]
    struct Peek {
        #[serde(default)]
        method: Option<serde::de::IgnoredAny>,
    }

    matches!(
        serde_json::from_str::<Peek>(message),
        Ok(Peek { method: Some(_) })
    )
}

async fn write_message<W>(writer: &mut W, framing: Framing, message: &str) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    match framing {
        Framing::Lines => {
            writer.write_all(message.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", message.len());
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(message.as_bytes()).await?;
        }
    }
    writer.flush().await?;

    Ok(())
}

async fn read_message<R>(reader: &mut R, framing: Framing) -> Result<String, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    match framing {
        Framing::Lines => loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                return Err(TransportError::Closed);
            }

            let line = line.trim();
            if !line.is_empty() {
                return Ok(line.to_string());
            }
        },
        Framing::ContentLength => {
            let mut content_length = None;

            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).await? == 0 {
                    return Err(TransportError::Closed);
                }

                let line = line.trim_end_matches(['\r', '\n']);
                if line.is_empty() {
                    break;
                }

                let (name, value) = line.split_once(':').ok_or_else(|| {
                    TransportError::Framing(format!("malformed header line '{}'", line))
                })?;
                if name.trim().eq_ignore_ascii_case("content-length") {
                    let length = value.trim().parse::<usize>().map_err(|e| {
                        TransportError::Framing(format!("invalid Content-Length '{}': {}", value.trim(), e))
                    })?;
                    content_length = Some(length);
                }
            }

            let content_length = content_length
                .ok_or_else(|| TransportError::Framing("missing Content-Length header".to_string()))?;
            if content_length > MAX_MESSAGE_LEN {
                return Err(TransportError::Framing(format!(
                    "Content-Length {} exceeds the {} byte limit",
                    content_length, MAX_MESSAGE_LEN
                )));
            }

            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => TransportError::Closed,
                _ => TransportError::Io(e),
            })?;

            String::from_utf8(body)
                .map_err(|e| TransportError::Framing(format!("message body is not UTF-8: {}", e)))
        }
    }
}
