use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::{Args, CommandFactory, Parser as ClapParser, Subcommand};
use tracing_subscriber::EnvFilter;

use microwire::conn::{ReadOptions, RequestReader};
use microwire::{
    Error, HeaderTable, Request, ResponseWriter, StatusCode, chunked, default_headers,
    format_debug, format_headers_only, format_json,
};

/// microwire CLI — incremental HTTP/1.1 request parser and response writer.
///
/// Reads a raw HTTP request from a file, --raw string, or stdin and feeds it
/// to the parser in pieces of at most --chunk-size bytes.
///
/// Escape sequences (\r, \n, \t, \\) in the --raw value are interpreted so
/// you can pass a full HTTP request as a single shell argument.
///
/// Set RUST_LOG (e.g. RUST_LOG=microwire=trace) to see parser activity on
/// stderr.
#[derive(ClapParser)]
#[command(name = "microwire-cli", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a request and print it.
    Parse {
        #[command(flatten)]
        input: InputArgs,

        /// Output format.
        #[arg(short, long, default_value = "json", value_enum)]
        format: OutputFormat,

        /// Pretty-print JSON output (ignored for other formats).
        #[arg(short, long)]
        pretty: bool,
    },
    /// Parse a request and print the response of a built-in echo handler.
    Respond {
        #[command(flatten)]
        input: InputArgs,

        /// Send the echoed body chunk-framed with x-content-sha256 and
        /// x-content-length trailers.
        #[arg(long)]
        chunked: bool,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Path to a file containing a raw HTTP request.
    /// Reads from stdin when neither FILE nor --raw is given.
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Raw HTTP request string (escape sequences \r \n \t \\ are expanded).
    #[arg(long)]
    raw: Option<String>,

    /// Maximum number of bytes handed to the parser per read; also the
    /// chunk size used by `respond --chunked`.
    #[arg(long, default_value = "8")]
    chunk_size: usize,

    /// Initial size of the read buffer in bytes.
    #[arg(long, default_value = "1024")]
    initial_capacity: usize,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable debug output
    Debug,
    /// Request-line + headers only
    Headers,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let input = match &cli.command {
        Command::Parse { input, .. } | Command::Respond { input, .. } => input,
    };

    // When no input source is provided and stdin is a terminal (not piped),
    // show help instead of blocking.
    if input.file.is_none() && input.raw.is_none() && io::stdin().is_terminal() {
        Cli::command().print_help().ok();
        println!();
        process::exit(0);
    }

    let data = match read_input(input) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error reading input: {e}");
            process::exit(1);
        }
    };

    if data.is_empty() {
        eprintln!("Error: empty input");
        process::exit(1);
    }

    let options = ReadOptions {
        initial_capacity: input.initial_capacity,
    };
    let chunk_size = input.chunk_size.max(1);
    let source = Trickle {
        data: &data,
        step: chunk_size,
    };

    let request = match RequestReader::with_options(source, &options).read_request() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Parse error: {e}");
            process::exit(2);
        }
    };

    match cli.command {
        Command::Parse { format, pretty, .. } => {
            let output = match format {
                OutputFormat::Json => format_json(&request, pretty),
                OutputFormat::Debug => format_debug(&request),
                OutputFormat::Headers => format_headers_only(&request),
            };
            print!("{output}");
        }
        Command::Respond { chunked, .. } => {
            let mut writer = ResponseWriter::new(io::stdout().lock());
            let result = if chunked {
                respond_chunked(&request, &mut writer, chunk_size)
            } else {
                respond_plain(&request, &mut writer)
            };
            if let Err(e) = result.and_then(|()| writer.flush()) {
                eprintln!("Response error: {e}");
                process::exit(3);
            }
        }
    }
}

/// Echo the request body, or the target when there is no body.
fn echo_body(request: &Request) -> &[u8] {
    if request.body().is_empty() {
        request.target().as_bytes()
    } else {
        request.body()
    }
}

fn respond_plain<W: Write>(request: &Request, w: &mut ResponseWriter<W>) -> Result<(), Error> {
    let body = echo_body(request);
    w.write_status_line(StatusCode::OK)?;
    w.write_headers(&default_headers(body.len()))?;
    w.write_body(body)?;
    Ok(())
}

fn respond_chunked<W: Write>(
    request: &Request,
    w: &mut ResponseWriter<W>,
    chunk_size: usize,
) -> Result<(), Error> {
    let body = echo_body(request);
    w.write_status_line(StatusCode::OK)?;
    w.write_headers(&chunked::chunked_headers(&["X-Content-SHA256", "X-Content-Length"]))?;
    for piece in body.chunks(chunk_size) {
        chunked::write_chunk(w, piece)?;
    }
    chunked::write_last_chunk(w)?;

    let mut trailers = HeaderTable::new();
    trailers.set("X-Content-SHA256", &chunked::sha256_hex(body));
    trailers.set("X-Content-Length", &body.len().to_string());
    chunked::write_trailers(w, &trailers)
}

/// A byte source that returns at most `step` bytes per read.
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

/// Read raw HTTP bytes from --raw, a file, or stdin.
fn read_input(input: &InputArgs) -> Result<Vec<u8>, io::Error> {
    if let Some(raw) = &input.raw {
        return Ok(unescape(raw).into_bytes());
    }
    match &input.file {
        Some(path) => std::fs::read(path),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Expand C-style escape sequences (`\r`, `\n`, `\t`, `\\`) in a string.
///
/// Any other `\X` sequence is kept as-is (both the backslash and `X`).
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('r') => out.push('\r'),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_echo_carries_checksum_trailers() {
        let request =
            microwire::parse_request(b"POST /e HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello").unwrap();
        let mut w = ResponseWriter::new(Vec::new());
        respond_chunked(&request, &mut w, 2).unwrap();

        let out = String::from_utf8(w.into_inner()).unwrap();
        assert!(out.contains("trailer: X-Content-SHA256,X-Content-Length\r\n"));
        assert!(out.ends_with(
            "2\r\nhe\r\n2\r\nll\r\n1\r\no\r\n0\r\n\
             x-content-sha256: 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824\r\n\
             x-content-length: 5\r\n\r\n"
        ));
    }

    #[test]
    fn plain_echo_falls_back_to_target() {
        let request = microwire::parse_request(b"GET /ping HTTP/1.1\r\n\r\n").unwrap();
        let mut w = ResponseWriter::new(Vec::new());
        respond_plain(&request, &mut w).unwrap();
        assert!(w.into_inner().ends_with(b"\r\n\r\n/ping"));
    }

    #[test]
    fn unescape_expands_known_sequences() {
        assert_eq!(unescape(r"GET / HTTP/1.1\r\n\r\n"), "GET / HTTP/1.1\r\n\r\n");
        assert_eq!(unescape(r"a\qb\\"), "a\\qb\\");
    }
}
