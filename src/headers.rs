use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::ParseError;

const CRLF: &[u8] = b"\r\n";

// ---------------------------------------------------------------------------
// HeaderTable
// ---------------------------------------------------------------------------

/// A table of header fields keyed by lowercased name.
///
/// Repeated names are merged into a single entry whose value is the
/// individual values joined with a bare `,`. Entries keep the order in which
/// each name was first inserted.
///
/// Merging applies to every field, `set-cookie` included, so list-valued
/// headers that forbid comma joining lose their boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTable {
    entries: Vec<(String, String)>,
}

impl HeaderTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, appending to an existing value with `,`.
    ///
    /// ```rust
    /// use microwire::HeaderTable;
    ///
    /// let mut headers = HeaderTable::new();
    /// headers.set("Host", "a");
    /// headers.set("HOST", "b");
    /// assert_eq!(headers.get("host"), Some("a,b"));
    /// ```
    pub fn set(&mut self, name: &str, value: &str) {
        let value = value.trim();
        match self.position(name) {
            Some(i) => {
                let existing = &mut self.entries[i].1;
                existing.push(',');
                existing.push_str(value);
            }
            None => self
                .entries
                .push((name.to_ascii_lowercase(), value.to_owned())),
        }
    }

    /// Insert a field, overwriting any existing value.
    pub fn replace(&mut self, name: &str, value: &str) {
        let value = value.trim().to_owned();
        match self.position(name) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((name.to_ascii_lowercase(), value)),
        }
    }

    /// Remove a field, returning its value if it was present.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    /// Case-insensitive lookup.
    ///
    /// `None` means the field is absent; `Some("")` means it was sent with an
    /// empty value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    /// Returns `true` if a field with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterate over `(name, value)` pairs in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of distinct field names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table holds no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Parse CRLF-terminated field lines from the front of `data`.
    ///
    /// Returns the number of bytes consumed and whether the empty line ending
    /// the header section was seen. A line cut off by the end of `data` is
    /// left unconsumed; call again with the same bytes plus whatever arrives
    /// next. Lines parsed before the cut, or before a failing line, stay in
    /// the table.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MalformedFieldLine`] for a line without `:` and
    /// [`ParseError::MalformedHeaderName`] for a name containing a non-token
    /// byte. Nothing is reported as consumed on error.
    pub fn parse(&mut self, data: &[u8]) -> Result<(usize, bool), ParseError> {
        let mut read = 0;

        while let Some(idx) = find_crlf(&data[read..]) {
            if idx == 0 {
                // Empty line: end of the header section.
                return Ok((read + CRLF.len(), true));
            }

            let (name, value) = parse_field_line(&data[read..read + idx])?;
            self.set(name, &value);
            read += idx + CRLF.len();
        }

        Ok((read, false))
    }
}

impl Serialize for HeaderTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Field-line helpers
// ---------------------------------------------------------------------------

/// Split one field line (without its CRLF) into a validated name and a
/// trimmed value.
fn parse_field_line(line: &[u8]) -> Result<(&str, String), ParseError> {
    let Some(colon) = line.iter().position(|&b| b == b':') else {
        return Err(ParseError::MalformedFieldLine(lossy(line)));
    };

    let raw_name = &line[..colon];
    let name = match std::str::from_utf8(raw_name) {
        Ok(name) if !name.is_empty() && name.bytes().all(is_tchar) => name,
        _ => return Err(ParseError::MalformedHeaderName(lossy(raw_name))),
    };
    let value = String::from_utf8_lossy(line[colon + 1..].trim_ascii()).into_owned();

    Ok((name, value))
}

pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(CRLF.len()).position(|w| w == CRLF)
}

pub(crate) fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// `tchar` – characters allowed in HTTP tokens.
///
/// ```text
/// tchar = "!" / "#" / "$" / "%" / "&" / "'" / "*" / "+" / "-" / "." /
///         "^" / "_" / "`" / "|" / "~" / DIGIT / ALPHA
/// ```
#[inline]
fn is_tchar(b: u8) -> bool {
    matches!(
        b,
        b'!' | b'#'
            | b'$'
            | b'%'
            | b'&'
            | b'\''
            | b'*'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~'
            | b'0'..=b'9'
            | b'a'..=b'z'
            | b'A'..=b'Z'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tchar_accepts_valid_bytes() {
        for &b in b"abcXYZ019AZaz!#$%&'*+-.^_`|~" {
            assert!(is_tchar(b), "expected tchar for byte 0x{b:02X}");
        }
    }

    #[test]
    fn tchar_rejects_invalid_bytes() {
        for &b in b" \t\r\n@[]{}:\"" {
            assert!(!is_tchar(b), "expected non-tchar for byte 0x{b:02X}");
        }
    }

    #[test]
    fn parses_single_header_without_terminator() {
        let mut headers = HeaderTable::new();
        let data = b"Host: localhost:42069\r\nFoo:     barbar  \r\n";
        let (n, done) = headers.parse(data).unwrap();
        assert_eq!(headers.get("Host"), Some("localhost:42069"));
        assert_eq!(headers.get("foo"), Some("barbar"));
        assert_eq!(headers.get("MissingKey"), None);
        assert_eq!(n, data.len());
        assert!(!done);
    }

    #[test]
    fn empty_line_completes_section() {
        let mut headers = HeaderTable::new();
        let (n, done) = headers.parse(b"Host: h\r\n\r\nbody").unwrap();
        assert_eq!(n, 11);
        assert!(done);
    }

    #[test]
    fn space_before_colon_is_rejected() {
        let mut headers = HeaderTable::new();
        let err = headers.parse(b"Name : value\r\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedHeaderName(_)));
        assert!(headers.is_empty());
    }

    #[test]
    fn leading_whitespace_in_name_is_rejected() {
        let mut headers = HeaderTable::new();
        let err = headers
            .parse(b"       Host : localhost:42069       \r\n\r\n")
            .unwrap_err();
        assert!(matches!(err, ParseError::MalformedHeaderName(_)));
    }

    #[test]
    fn invalid_token_character_is_rejected() {
        let mut headers = HeaderTable::new();
        let err = headers.parse(b"N@me: value\r\n").unwrap_err();
        assert_eq!(err, ParseError::MalformedHeaderName("N@me".into()));
    }

    #[test]
    fn non_utf8_name_is_rejected() {
        let mut headers = HeaderTable::new();
        let err = headers.parse(b"X-\xFF: v\r\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedHeaderName(_)));
    }

    #[test]
    fn lines_before_a_bad_line_stay_committed() {
        let mut headers = HeaderTable::new();
        let err = headers.parse(b"A: 1\r\nB@: 2\r\n").unwrap_err();
        assert_eq!(err, ParseError::MalformedHeaderName("B@".into()));
        assert_eq!(headers.get("a"), Some("1"));
    }

    #[test]
    fn missing_colon_is_malformed_field_line() {
        let mut headers = HeaderTable::new();
        let err = headers.parse(b"NoSeparatorHere\r\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedFieldLine(_)));
    }

    #[test]
    fn multivalued_headers_merge_with_bare_comma() {
        let mut headers = HeaderTable::new();
        let data = b"Host: localhost:42069\r\nHost: localhost:42069\r\nHost: localhost:42068 \r\n";
        let (n, done) = headers.parse(data).unwrap();
        assert_eq!(n, data.len());
        assert!(!done);
        assert_eq!(
            headers.get("HOST"),
            Some("localhost:42069,localhost:42069,localhost:42068")
        );
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn partial_line_is_left_unconsumed() {
        let mut headers = HeaderTable::new();
        let (n, done) = headers.parse(b"Host: h\r\nAccept: text/").unwrap();
        assert_eq!(n, 9);
        assert!(!done);
        assert_eq!(headers.get("accept"), None);

        let (n, done) = headers.parse(b"Accept: text/html\r\n\r\n").unwrap();
        assert_eq!(n, 21);
        assert!(done);
        assert_eq!(headers.get("accept"), Some("text/html"));
    }

    #[test]
    fn lone_cr_waits_for_lf() {
        let mut headers = HeaderTable::new();
        assert_eq!(headers.parse(b"\r").unwrap(), (0, false));
    }

    #[test]
    fn empty_value_is_present() {
        let mut headers = HeaderTable::new();
        headers.parse(b"X-Empty:\r\n").unwrap();
        assert_eq!(headers.get("x-empty"), Some(""));
        assert!(headers.contains("X-EMPTY"));
    }

    #[test]
    fn replace_and_remove() {
        let mut headers = HeaderTable::new();
        headers.set("Content-Type", "text/plain");
        headers.set("Content-Length", "0");
        headers.replace("content-type", "text/html");
        assert_eq!(headers.get("Content-Type"), Some("text/html"));
        assert_eq!(headers.remove("CONTENT-LENGTH"), Some("0".into()));
        assert_eq!(headers.remove("content-length"), None);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn iteration_keeps_first_insertion_order() {
        let mut headers = HeaderTable::new();
        headers.set("B", "1");
        headers.set("A", "2");
        headers.set("b", "3");
        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, vec![("b", "1,3"), ("a", "2")]);
    }

    #[test]
    fn serializes_as_json_object() {
        let mut headers = HeaderTable::new();
        headers.set("Host", "example.com");
        headers.set("Accept", "*/*");
        let json = serde_json::to_string(&headers).unwrap();
        assert_eq!(json, r#"{"host":"example.com","accept":"*/*"}"#);
    }
}
