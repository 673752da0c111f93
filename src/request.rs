use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::ParseError;
use crate::headers::{HeaderTable, find_crlf, lossy};

const CRLF_LEN: usize = 2;

// ---------------------------------------------------------------------------
// RequestLine
// ---------------------------------------------------------------------------

/// The first line of a request: `METHOD SP TARGET SP HTTP/1.1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestLine {
    /// Request method, taken verbatim (not checked against known methods).
    pub method: String,
    /// Request target, taken verbatim.
    pub target: String,
    /// Version number after `HTTP/` (always `"1.1"` once accepted).
    pub http_version: String,
}

/// Parse a request line from the front of `data`.
///
/// Returns `Ok(None)` when no CRLF has arrived yet. On success the returned
/// count includes the terminating CRLF.
///
/// # Errors
///
/// [`ParseError::MalformedRequestLine`] when the line does not split into
/// exactly three non-empty space-separated tokens, and
/// [`ParseError::UnsupportedVersion`] when the third token is not
/// `HTTP/1.1`.
pub fn parse_request_line(data: &[u8]) -> Result<Option<(RequestLine, usize)>, ParseError> {
    let Some(idx) = find_crlf(data) else {
        return Ok(None);
    };
    let line = &data[..idx];

    let parts: Vec<&[u8]> = line.split(|&b| b == b' ').collect();
    let [method, target, version] = parts[..] else {
        return Err(ParseError::MalformedRequestLine(lossy(line)));
    };
    if method.is_empty() || target.is_empty() {
        return Err(ParseError::MalformedRequestLine(lossy(line)));
    }

    let version_parts: Vec<&[u8]> = version.split(|&b| b == b'/').collect();
    let [b"HTTP", b"1.1"] = version_parts[..] else {
        return Err(ParseError::UnsupportedVersion(lossy(version)));
    };

    let request_line = RequestLine {
        method: lossy(method),
        target: lossy(target),
        http_version: "1.1".to_owned(),
    };
    Ok(Some((request_line, idx + CRLF_LEN)))
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A fully parsed HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    /// Method, target and version.
    pub request_line: RequestLine,
    /// Header fields, merged by lowercased name.
    pub headers: HeaderTable,
    /// Exactly `Content-Length` bytes of body (empty when none was declared).
    #[serde(serialize_with = "serialize_body")]
    pub body: Vec<u8>,
}

/// Serialize body bytes as a UTF-8 string (lossy) for JSON output.
fn serialize_body<S: Serializer>(body: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(body))
}

impl Request {
    /// The request method.
    pub fn method(&self) -> &str {
        &self.request_line.method
    }

    /// The request target.
    pub fn target(&self) -> &str {
        &self.request_line.target
    }

    /// The HTTP version number (`"1.1"`).
    pub fn version(&self) -> &str {
        &self.request_line.http_version
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as `&str` if it is valid UTF-8.
    pub fn body_as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// The declared `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<usize> {
        content_length(&self.headers)
    }
}

fn content_length(headers: &HeaderTable) -> Option<usize> {
    headers.get("content-length").and_then(|v| v.parse().ok())
}

// ---------------------------------------------------------------------------
// Parser state
// ---------------------------------------------------------------------------

/// Position of a [`RequestParser`] within the message.
///
/// States only ever move forward: `Init` → `Headers` → `Body` → `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParserState {
    /// Waiting for the request line.
    Init,
    /// Reading field lines.
    Headers,
    /// Accumulating `Content-Length` body bytes.
    Body,
    /// The request is complete.
    Done,
}

impl ParserState {
    /// Return the state as a static string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Headers => "headers",
            Self::Body => "body",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ParserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RequestParser
// ---------------------------------------------------------------------------

/// An incremental request parser driven by repeated [`parse`] calls.
///
/// The parser never keeps a copy of the input: each call reports how many
/// bytes it consumed and the caller keeps the rest for the next call.
///
/// ```rust
/// use microwire::{ParserState, RequestParser};
///
/// let mut parser = RequestParser::new();
/// let data = b"POST /a HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel";
///
/// let n = parser.parse(data).unwrap();
/// assert_eq!(n, data.len());
/// assert_eq!(parser.state(), ParserState::Body);
///
/// parser.parse(b"lo").unwrap();
/// let request = parser.finish().unwrap();
/// assert_eq!(request.body(), b"hello");
/// ```
///
/// [`parse`]: RequestParser::parse
#[derive(Debug, Clone)]
pub struct RequestParser {
    state: ParserState,
    request_line: Option<RequestLine>,
    headers: HeaderTable,
    body: Vec<u8>,
}

impl RequestParser {
    /// Create a parser in the `Init` state.
    pub fn new() -> Self {
        Self {
            state: ParserState::Init,
            request_line: None,
            headers: HeaderTable::new(),
            body: Vec::new(),
        }
    }

    /// Consume as much of `data` as the current state allows.
    ///
    /// Crosses as many states as the buffered bytes permit and stops when a
    /// state needs more input or the request is done. Returns the number of
    /// bytes consumed from the front of `data`; once `Done`, always 0.
    ///
    /// # Errors
    ///
    /// Returns the [`ParseError`] of the failing state. State committed by
    /// earlier calls is left as it was, but header lines accepted earlier in
    /// the failing call are already in the table. Drop the parser after an
    /// error; feeding the same bytes again would merge those lines twice.
    pub fn parse(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        let mut read = 0;

        loop {
            let current = &data[read..];
            match self.state {
                ParserState::Init => {
                    let Some((line, n)) = parse_request_line(current)? else {
                        break;
                    };
                    tracing::trace!(method = %line.method, target = %line.target, "parsed request line");
                    self.request_line = Some(line);
                    read += n;
                    self.transition(ParserState::Headers);
                }
                ParserState::Headers => {
                    let (n, complete) = self.headers.parse(current)?;
                    read += n;
                    if !complete {
                        break;
                    }
                    self.transition(ParserState::Body);
                }
                ParserState::Body => {
                    let target = content_length(&self.headers).unwrap_or(0);
                    if target == 0 {
                        self.transition(ParserState::Done);
                        continue;
                    }
                    if self.body.capacity() == 0 {
                        // Bounded so a bogus Content-Length can't force a huge allocation.
                        self.body.reserve(target.min(65_536));
                    }

                    let remaining = target - self.body.len();
                    let to_read = remaining.min(current.len());
                    self.body.extend_from_slice(&current[..to_read]);
                    read += to_read;

                    if self.body.len() == target {
                        self.transition(ParserState::Done);
                    } else {
                        break;
                    }
                }
                ParserState::Done => break,
            }
        }

        Ok(read)
    }

    fn transition(&mut self, next: ParserState) {
        debug_assert!(next > self.state, "parser state must move forward");
        tracing::trace!(from = %self.state, to = %next, "parser transition");
        self.state = next;
    }

    /// The current state.
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Returns `true` once the whole request has been consumed.
    pub fn is_done(&self) -> bool {
        self.state == ParserState::Done
    }

    /// The request line, once it has been parsed.
    pub fn request_line(&self) -> Option<&RequestLine> {
        self.request_line.as_ref()
    }

    /// Headers parsed so far.
    pub fn headers(&self) -> &HeaderTable {
        &self.headers
    }

    /// Body bytes accumulated so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the parser and return the completed [`Request`].
    ///
    /// Returns `None` if the parser has not reached `Done`.
    pub fn finish(self) -> Option<Request> {
        if !self.is_done() {
            return None;
        }
        Some(Request {
            request_line: self.request_line?,
            headers: self.headers,
            body: self.body,
        })
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}
