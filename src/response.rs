use std::fmt;
use std::io::{self, Write};

use crate::error::Error;
use crate::headers::HeaderTable;

// ---------------------------------------------------------------------------
// StatusCode
// ---------------------------------------------------------------------------

/// An HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: Self = Self(200);
    pub const CREATED: Self = Self(201);
    pub const NO_CONTENT: Self = Self(204);
    pub const MOVED_PERMANENTLY: Self = Self(301);
    pub const FOUND: Self = Self(302);
    pub const NOT_MODIFIED: Self = Self(304);
    pub const BAD_REQUEST: Self = Self(400);
    pub const UNAUTHORIZED: Self = Self(401);
    pub const FORBIDDEN: Self = Self(403);
    pub const NOT_FOUND: Self = Self(404);
    pub const METHOD_NOT_ALLOWED: Self = Self(405);
    pub const PAYLOAD_TOO_LARGE: Self = Self(413);
    pub const INTERNAL_SERVER_ERROR: Self = Self(500);
    pub const NOT_IMPLEMENTED: Self = Self(501);
    pub const BAD_GATEWAY: Self = Self(502);
    pub const SERVICE_UNAVAILABLE: Self = Self(503);

    /// The numeric code.
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// The canonical reason phrase, or `None` for codes this crate does not
    /// know.
    pub fn canonical_reason(&self) -> Option<&'static str> {
        Some(match self.0 {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            413 => "Payload Too Large",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => return None,
        })
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.canonical_reason() {
            Some(reason) => write!(f, "{} {reason}", self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Headers for a plain, non-persistent response with a body of
/// `content_len` bytes.
pub fn default_headers(content_len: usize) -> HeaderTable {
    let mut headers = HeaderTable::new();
    headers.set("Content-Length", &content_len.to_string());
    headers.set("Connection", "close");
    headers.set("Content-Type", "text/plain");
    headers
}

// ---------------------------------------------------------------------------
// ResponseWriter
// ---------------------------------------------------------------------------

/// Serializes response pieces straight into a byte sink.
///
/// Calls are written in the order they are made; the writer does not check
/// that the status line comes first or that a body follows the headers. For
/// chunked responses the caller frames each body call itself (see
/// [`crate::chunked`]) and sends the trailer section with a second
/// [`write_headers`](Self::write_headers) call.
///
/// Each method issues a single `write` on the sink. A short write is
/// reported as an error rather than retried.
#[derive(Debug)]
pub struct ResponseWriter<W> {
    sink: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Bind a writer to `sink`.
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Write `HTTP/1.1 <code> <reason>\r\n`.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if the sink fails or accepts fewer bytes than
    /// the line.
    pub fn write_status_line(&mut self, status: StatusCode) -> Result<(), Error> {
        let reason = status.canonical_reason().unwrap_or("");
        let line = format!("HTTP/1.1 {} {reason}\r\n", status.as_u16());
        tracing::debug!(status = status.as_u16(), "writing status line");
        self.send(line.as_bytes())?;
        Ok(())
    }

    /// Write every field as `name: value\r\n` followed by the empty line.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] on a failed or short write.
    pub fn write_headers(&mut self, headers: &HeaderTable) -> Result<(), Error> {
        let mut block = Vec::with_capacity(32 * headers.len() + 2);
        for (name, value) in headers.iter() {
            block.extend_from_slice(name.as_bytes());
            block.extend_from_slice(b": ");
            block.extend_from_slice(value.as_bytes());
            block.extend_from_slice(b"\r\n");
        }
        block.extend_from_slice(b"\r\n");
        self.send(&block)?;
        Ok(())
    }

    /// Write body bytes as given and return how many were written.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] on a failed or short write.
    pub fn write_body(&mut self, body: &[u8]) -> Result<usize, Error> {
        self.send(body)
    }

    /// Flush the underlying sink.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if the sink fails to flush.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.sink.flush()?;
        Ok(())
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Unwrap the writer, returning the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn send(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        if bytes.is_empty() {
            return Ok(0);
        }
        let n = self.sink.write(bytes)?;
        if n < bytes.len() {
            return Err(Error::Transport(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {n} of {} bytes", bytes.len()),
            )));
        }
        Ok(n)
    }
}
