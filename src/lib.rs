//! # microwire
//!
//! A small **HTTP/1.1 message core**: an incremental request parser that
//! accepts bytes in arbitrarily sized pieces, and a response writer that can
//! emit chunked bodies followed by trailers.
//!
//! The parser is a forward-only state machine
//! (`Init → Headers → Body → Done`). Each [`RequestParser::parse`] call
//! consumes a prefix of the input and reports its length; the caller keeps
//! the rest and offers it again with the next read. [`conn::RequestReader`]
//! does exactly that over any [`std::io::Read`].
//!
//! ## Quick start — one-shot parsing
//!
//! ```rust
//! use microwire::parse_request;
//!
//! let raw = b"GET /hello HTTP/1.1\r\nHost: example.com\r\n\r\n";
//! let request = parse_request(raw).expect("valid request");
//! assert_eq!(request.method(), "GET");
//! assert_eq!(request.target(), "/hello");
//! assert_eq!(request.header("HOST"), Some("example.com"));
//! ```
//!
//! ## Quick start — serving a connection
//!
//! ```rust
//! use std::io::Cursor;
//! use microwire::{conn, default_headers, Error, Request, ResponseWriter, StatusCode};
//!
//! let handler = |req: &Request, w: &mut ResponseWriter<&mut Vec<u8>>| -> Result<(), Error> {
//!     let body = req.target().as_bytes();
//!     w.write_status_line(StatusCode::OK)?;
//!     w.write_headers(&default_headers(body.len()))?;
//!     w.write_body(body)?;
//!     Ok(())
//! };
//!
//! let mut out = Vec::new();
//! conn::serve(Cursor::new(&b"GET /ping HTTP/1.1\r\n\r\n"[..]), &mut out, &handler).unwrap();
//! assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));
//! assert!(out.ends_with(b"/ping"));
//! ```

pub mod chunked;
pub mod conn;
mod error;
mod headers;
mod output;
mod request;
mod response;

// Re-export public API.
pub use error::{Error, ParseError};
pub use headers::HeaderTable;
pub use output::{format_debug, format_headers_only, format_json};
pub use request::{ParserState, Request, RequestLine, RequestParser, parse_request_line};
pub use response::{ResponseWriter, StatusCode, default_headers};

/// Parse a **complete** request held in memory.
///
/// Bytes after the end of the request are ignored. For data arriving in
/// pieces use [`RequestParser`] or [`conn::RequestReader`].
///
/// # Errors
///
/// Returns [`Error::Parse`] if the data is malformed and
/// [`Error::TruncatedMessage`] if it ends before the request does.
pub fn parse_request(data: &[u8]) -> Result<Request, Error> {
    let mut parser = RequestParser::new();
    let consumed = parser.parse(data)?;
    let state = parser.state();
    parser.finish().ok_or(Error::TruncatedMessage {
        state,
        buffered: data.len() - consumed,
    })
}
