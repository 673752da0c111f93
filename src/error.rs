use std::io;

use crate::request::ParserState;

/// Protocol violations detected while parsing a request.
///
/// Each variant carries the offending text (lossy UTF-8) so callers can log
/// what was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The request line is not exactly `METHOD SP TARGET SP VERSION`.
    #[error("malformed request-line: '{0}'")]
    MalformedRequestLine(String),
    /// The version token is anything other than `HTTP/1.1`.
    #[error("unsupported http version: '{0}'")]
    UnsupportedVersion(String),
    /// A field name contains a non-token byte (including a space before `:`).
    #[error("malformed header name: '{0}'")]
    MalformedHeaderName(String),
    /// A field line has no `:` separator.
    #[error("malformed field line: '{0}'")]
    MalformedFieldLine(String),
}

/// Errors surfaced by the connection driver and the response writer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request bytes violate the wire format.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The byte source was exhausted before the request was complete.
    #[error("source closed in {state} state with {buffered} unparsed bytes")]
    TruncatedMessage {
        /// Parser state at the time the source hit EOF.
        state: ParserState,
        /// Bytes that were read but not yet consumed by the parser.
        buffered: usize,
    },
    /// A read from the source or a write to the sink failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}
