//! HTTP/1.1 message framing.
//!
//! # Responsibilities
//! - Read exactly one request or response from a byte stream
//! - Honor `Content-Length` framing; no other framing is interpreted
//! - Bound the whole read with a single per-message deadline
//!
//! # Design Decisions
//! - Chunked transfer encoding and length-less bodies are out of scope;
//!   such messages hit the deadline instead of being half-read
//! - The raw bytes are preserved verbatim so the relay can forward them
//!   without re-serialization

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::time::{timeout_at, Instant};

/// Header prefix recognized by the framing loop. Matched case-sensitively,
/// as the reference origin and the probe requests emit it.
const CONTENT_LENGTH_PREFIX: &[u8] = b"Content-Length:";

/// Error type for message reads.
#[derive(Debug)]
pub enum ReadError {
    /// The per-message deadline elapsed.
    Timeout,
    /// The peer closed the stream before a full message was read.
    ClosedByPeer,
    /// `Content-Length` was present but not a non-negative integer.
    MalformedHeader,
    /// The transport failed mid-read.
    Io(std::io::Error),
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::Timeout => write!(f, "read deadline elapsed"),
            ReadError::ClosedByPeer => write!(f, "peer closed the stream mid-message"),
            ReadError::MalformedHeader => write!(f, "malformed Content-Length header"),
            ReadError::Io(e) => write!(f, "read failed: {}", e),
        }
    }
}

impl std::error::Error for ReadError {}

/// Read exactly one HTTP/1.1 message (request or response) from `reader`.
///
/// Returns the raw bytes including the terminating CRLFCRLF and exactly
/// `Content-Length` body bytes (zero when the header is absent). The whole
/// read is bounded by `deadline`, measured from the moment of the call.
pub async fn read_message<R>(reader: &mut R, deadline: Duration) -> Result<Vec<u8>, ReadError>
where
    R: AsyncBufRead + Unpin,
{
    let deadline = Instant::now() + deadline;
    let mut message = Vec::with_capacity(512);
    let mut content_length = 0usize;
    let mut line = Vec::with_capacity(128);

    // Header lines, each terminated by LF, up to the blank CRLF line.
    loop {
        line.clear();
        let n = match timeout_at(deadline, reader.read_until(b'\n', &mut line)).await {
            Err(_) => return Err(ReadError::Timeout),
            Ok(Err(e)) => return Err(ReadError::Io(e)),
            Ok(Ok(n)) => n,
        };
        if n == 0 {
            return Err(ReadError::ClosedByPeer);
        }
        message.extend_from_slice(&line);

        if let Some(value) = line.strip_prefix(CONTENT_LENGTH_PREFIX) {
            content_length = parse_content_length(value)?;
        }

        if line == b"\r\n" {
            break;
        }
    }

    // Exactly `content_length` body bytes, no more.
    if content_length > 0 {
        let start = message.len();
        message.resize(start + content_length, 0);
        match timeout_at(deadline, reader.read_exact(&mut message[start..])).await {
            Err(_) => return Err(ReadError::Timeout),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ReadError::ClosedByPeer)
            }
            Ok(Err(e)) => return Err(ReadError::Io(e)),
            Ok(Ok(_)) => {}
        }
    }

    Ok(message)
}

fn parse_content_length(value: &[u8]) -> Result<usize, ReadError> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .ok_or(ReadError::MalformedHeader)
}

/// Status code token of a response status line ("200", "204", ...).
pub fn status_code(message: &[u8]) -> Option<&str> {
    second_token(message)
}

/// Target path of a request line ("/", "/health", ...).
pub fn request_path(message: &[u8]) -> Option<&str> {
    second_token(message)
}

fn second_token(message: &[u8]) -> Option<&str> {
    let first_line = message.split(|&b| b == b'\n').next()?;
    let line = std::str::from_utf8(first_line).ok()?;
    line.split_whitespace().nth(1)
}
