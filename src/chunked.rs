//! Chunked transfer-encoding helpers for handlers.
//!
//! [`ResponseWriter`] never frames anything itself. These functions build the
//! `<hex-size>\r\n<data>\r\n` frames, the `0\r\n` terminator, and the trailer
//! section on top of its `write_body` / `write_headers` calls, plus
//! [`sha256_hex`] for checksum trailers.
//!
//! ```rust
//! use microwire::{chunked, HeaderTable, ResponseWriter, StatusCode};
//!
//! let mut w = ResponseWriter::new(Vec::new());
//! w.write_status_line(StatusCode::OK).unwrap();
//! w.write_headers(&chunked::chunked_headers(&["X-Content-Length"])).unwrap();
//! chunked::write_chunk(&mut w, b"hello").unwrap();
//! chunked::write_last_chunk(&mut w).unwrap();
//!
//! let mut trailers = HeaderTable::new();
//! trailers.set("X-Content-Length", "5");
//! chunked::write_trailers(&mut w, &trailers).unwrap();
//!
//! let out = String::from_utf8(w.into_inner()).unwrap();
//! assert!(out.ends_with("5\r\nhello\r\n0\r\nx-content-length: 5\r\n\r\n"));
//! ```

use std::fmt::Write as _;
use std::io::Write;

use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::headers::HeaderTable;
use crate::response::{ResponseWriter, default_headers};

/// Write one data chunk. Empty input writes nothing, since a zero-size chunk
/// would end the body.
///
/// # Errors
///
/// [`Error::Transport`] on a failed or short write.
pub fn write_chunk<W: Write>(w: &mut ResponseWriter<W>, data: &[u8]) -> Result<(), Error> {
    if data.is_empty() {
        return Ok(());
    }
    w.write_body(format!("{:x}\r\n", data.len()).as_bytes())?;
    w.write_body(data)?;
    w.write_body(b"\r\n")?;
    Ok(())
}

/// Write the zero-size chunk that ends the body.
///
/// Follow it with [`write_trailers`], passing an empty table when no trailer
/// fields were announced.
///
/// # Errors
///
/// [`Error::Transport`] on a failed or short write.
pub fn write_last_chunk<W: Write>(w: &mut ResponseWriter<W>) -> Result<(), Error> {
    w.write_body(b"0\r\n")?;
    Ok(())
}

/// Write the trailer section (fields plus the closing empty line).
///
/// Only fields announced through a `Trailer` header belong here.
///
/// # Errors
///
/// [`Error::Transport`] on a failed or short write.
pub fn write_trailers<W: Write>(
    w: &mut ResponseWriter<W>,
    trailers: &HeaderTable,
) -> Result<(), Error> {
    w.write_headers(trailers)
}

/// Default headers switched to chunked framing, announcing `trailers`.
pub fn chunked_headers(trailers: &[&str]) -> HeaderTable {
    let mut headers = default_headers(0);
    headers.remove("content-length");
    headers.set("Transfer-Encoding", "chunked");
    for name in trailers {
        headers.set("Trailer", name);
    }
    headers
}

/// Lowercase hex SHA-256 of `data`, the value of an `X-Content-SHA256`
/// trailer.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        let _ = write!(out, "{b:02x}");
    }
    out
}
