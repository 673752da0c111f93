//! Connection driver: feeds a byte source into a [`RequestParser`] and hands
//! the finished request to an injected [`Handler`].
//!
//! Accepting connections, spawning a task per connection, and timeouts are
//! left to the caller. One [`serve`] call handles one request on one
//! connection.

use std::io::{ErrorKind, Read, Write};

use crate::error::Error;
use crate::request::{ParserState, Request, RequestParser};
use crate::response::ResponseWriter;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Buffering options for [`RequestReader`].
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Initial size of the read buffer in bytes (default: 1 024). The buffer
    /// doubles whenever it fills up; there is no upper bound.
    pub initial_capacity: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            initial_capacity: 1_024,
        }
    }
}

// ---------------------------------------------------------------------------
// RequestReader
// ---------------------------------------------------------------------------

/// Reads one request from a byte source, keeping unconsumed bytes between
/// reads.
#[derive(Debug)]
pub struct RequestReader<R> {
    source: R,
    buf: Vec<u8>,
    filled: usize,
}

impl<R: Read> RequestReader<R> {
    /// Wrap `source` with default [`ReadOptions`].
    pub fn new(source: R) -> Self {
        Self::with_options(source, &ReadOptions::default())
    }

    /// Wrap `source` with custom buffering options.
    pub fn with_options(source: R, options: &ReadOptions) -> Self {
        Self {
            source,
            buf: vec![0; options.initial_capacity.max(1)],
            filled: 0,
        }
    }

    /// Read until a complete request has been parsed.
    ///
    /// # Errors
    ///
    /// * [`Error::Parse`] on the first protocol violation.
    /// * [`Error::TruncatedMessage`] if the source hits EOF first.
    /// * [`Error::Transport`] if a read fails.
    pub fn read_request(&mut self) -> Result<Request, Error> {
        let mut parser = RequestParser::new();

        // Leftover bytes from a previous call may already hold a request.
        self.consume(&mut parser)?;

        while !parser.is_done() {
            if self.filled == self.buf.len() {
                let grown = self.buf.len() * 2;
                tracing::trace!(capacity = grown, "growing read buffer");
                self.buf.resize(grown, 0);
            }

            let n = match self.source.read(&mut self.buf[self.filled..]) {
                Ok(0) => {
                    return Err(Error::TruncatedMessage {
                        state: parser.state(),
                        buffered: self.filled,
                    });
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Transport(e)),
            };
            tracing::trace!(bytes = n, state = %parser.state(), "read from source");
            self.filled += n;

            self.consume(&mut parser)?;
        }

        let request = parser.finish().ok_or(Error::TruncatedMessage {
            state: ParserState::Done,
            buffered: self.filled,
        })?;
        tracing::debug!(
            method = request.method(),
            target = request.target(),
            body_len = request.body().len(),
            leftover = self.filled,
            "request complete"
        );
        Ok(request)
    }

    /// Parse the filled region and shift the unconsumed suffix to the front.
    fn consume(&mut self, parser: &mut RequestParser) -> Result<(), Error> {
        let n = parser.parse(&self.buf[..self.filled])?;
        self.buf.copy_within(n..self.filled, 0);
        self.filled -= n;
        Ok(())
    }

    /// Bytes read from the source but not consumed by the parser.
    pub fn buffered(&self) -> &[u8] {
        &self.buf[..self.filled]
    }

    /// Borrow the byte source.
    pub fn get_ref(&self) -> &R {
        &self.source
    }

    /// Unwrap the reader, returning the source. Buffered bytes are dropped.
    pub fn into_inner(self) -> R {
        self.source
    }
}

/// Read one request from `source` with default options.
///
/// # Errors
///
/// See [`RequestReader::read_request`].
pub fn read_request<R: Read>(source: R) -> Result<Request, Error> {
    RequestReader::new(source).read_request()
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Turns a request into writer calls.
///
/// Implemented for any `Fn(&Request, &mut ResponseWriter<W>) -> Result<(), Error>`.
pub trait Handler<W> {
    /// Respond to `request` through `writer`.
    ///
    /// # Errors
    ///
    /// Whatever the handler's writes report.
    fn handle(&self, request: &Request, writer: &mut ResponseWriter<W>) -> Result<(), Error>;
}

impl<W, F> Handler<W> for F
where
    F: Fn(&Request, &mut ResponseWriter<W>) -> Result<(), Error>,
{
    fn handle(&self, request: &Request, writer: &mut ResponseWriter<W>) -> Result<(), Error> {
        self(request, writer)
    }
}

/// Read one request from `source`, answer it through `handler` on `sink`,
/// and flush.
///
/// Errors are logged and returned; the caller closes the connection.
///
/// # Errors
///
/// Any error from reading, parsing, the handler, or flushing.
pub fn serve<R, W, H>(source: R, sink: W, handler: &H) -> Result<(), Error>
where
    R: Read,
    W: Write,
    H: Handler<W> + ?Sized,
{
    serve_with_options(source, sink, handler, &ReadOptions::default())
}

/// [`serve`] with custom buffering options.
///
/// # Errors
///
/// Any error from reading, parsing, the handler, or flushing.
pub fn serve_with_options<R, W, H>(
    source: R,
    sink: W,
    handler: &H,
    options: &ReadOptions,
) -> Result<(), Error>
where
    R: Read,
    W: Write,
    H: Handler<W> + ?Sized,
{
    let result = RequestReader::with_options(source, options)
        .read_request()
        .and_then(|request| {
            let mut writer = ResponseWriter::new(sink);
            handler.handle(&request, &mut writer)?;
            writer.flush()
        });

    if let Err(e) = &result {
        tracing::warn!(error = %e, "connection aborted");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use super::*;

    /// Hands out at most `step` bytes per read.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn one_byte_reads_leave_nothing_buffered() {
        let data = b"POST /a HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let mut reader = RequestReader::new(Trickle { data, step: 1 });
        let request = reader.read_request().unwrap();
        assert_eq!(request.body(), b"hello");
        assert!(reader.buffered().is_empty());
    }

    #[test]
    fn small_initial_capacity_grows() {
        let data = b"GET /a-rather-long-target HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let options = ReadOptions {
            initial_capacity: 4,
        };
        let mut reader = RequestReader::with_options(Cursor::new(&data[..]), &options);
        let request = reader.read_request().unwrap();
        assert_eq!(request.target(), "/a-rather-long-target");
        assert_eq!(request.header("host"), Some("example.com"));
    }

    #[test]
    fn zero_initial_capacity_still_reads() {
        let options = ReadOptions {
            initial_capacity: 0,
        };
        let mut reader =
            RequestReader::with_options(Cursor::new(&b"GET / HTTP/1.1\r\n\r\n"[..]), &options);
        assert_eq!(reader.read_request().unwrap().target(), "/");
    }

    #[test]
    fn leftover_bytes_stay_buffered() {
        let data = b"GET /one HTTP/1.1\r\n\r\nGET /two HTTP/1.1\r\n\r\n";
        let mut reader = RequestReader::new(Cursor::new(&data[..]));
        assert_eq!(reader.read_request().unwrap().target(), "/one");
        assert_eq!(reader.buffered(), b"GET /two HTTP/1.1\r\n\r\n");
        assert_eq!(reader.read_request().unwrap().target(), "/two");
    }

    #[test]
    fn eof_in_body_is_truncated() {
        let data = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nshort";
        let err = read_request(Cursor::new(&data[..])).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedMessage {
                state: ParserState::Body,
                buffered: 0
            }
        ));
    }

    #[test]
    fn eof_mid_headers_reports_buffered_bytes() {
        let data = b"GET / HTTP/1.1\r\nHost: exam";
        let err = read_request(Cursor::new(&data[..])).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedMessage {
                state: ParserState::Headers,
                buffered: 10
            }
        ));
    }

    #[test]
    fn read_error_is_transport() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }
        }
        let err = read_request(Broken).unwrap_err();
        assert!(matches!(err, Error::Transport(e) if e.kind() == io::ErrorKind::ConnectionReset));
    }

    #[test]
    fn interrupted_read_is_retried() {
        struct Flaky {
            interrupted: bool,
            inner: Cursor<&'static [u8]>,
        }
        impl Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if !self.interrupted {
                    self.interrupted = true;
                    return Err(io::Error::from(io::ErrorKind::Interrupted));
                }
                self.inner.read(buf)
            }
        }
        let source = Flaky {
            interrupted: false,
            inner: Cursor::new(&b"GET / HTTP/1.1\r\n\r\n"[..]),
        };
        assert_eq!(read_request(source).unwrap().method(), "GET");
    }

    #[test]
    fn serve_runs_handler() {
        let mut out = Vec::new();
        let handler = |req: &Request, w: &mut ResponseWriter<&mut Vec<u8>>| -> Result<(), Error> {
            let body = req.target().as_bytes();
            w.write_status_line(crate::StatusCode::OK)?;
            w.write_headers(&crate::default_headers(body.len()))?;
            w.write_body(body)?;
            Ok(())
        };
        serve(Cursor::new(&b"GET /hi HTTP/1.1\r\n\r\n"[..]), &mut out, &handler).unwrap();
        assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));
        assert!(out.ends_with(b"\r\n\r\n/hi"));
    }

    #[test]
    fn serve_skips_handler_on_parse_error() {
        let mut out = Vec::new();
        let handler = |_: &Request, _: &mut ResponseWriter<&mut Vec<u8>>| -> Result<(), Error> {
            panic!("handler must not run");
        };
        let err = serve(Cursor::new(&b"GET /x HTTP/1.0\r\n\r\n"[..]), &mut out, &handler).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(out.is_empty());
    }
}
