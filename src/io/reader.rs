use std::io;

use http::Uri;
use nom::bytes::complete::{is_not, take_until};
use nom::character::complete::char;
use nom::combinator::{all_consuming, rest};
use nom::sequence::{separated_pair, terminated, tuple};
use nom::IResult;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, trace};

use crate::body::Body;
use crate::error::ParseError;
use crate::header::{Headers, CONTENT_LENGTH};
use crate::Request;

/// Default bound on the length of a single request or header line (without the terminator).
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Largest accepted `Content-Length` (unsigned 63-bit).
const MAX_CONTENT_LENGTH: u64 = i64::MAX as u64;

pub struct RequestReader<R> {
    reader: BufReader<R>,
    max_line_len: usize,
}

impl<R> RequestReader<R>
where
    R: AsyncRead + Unpin,
{
    #[inline]
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_line_len: MAX_LINE_LEN,
        }
    }

    #[inline]
    pub fn max_line_len(mut self, limit: usize) -> Self {
        self.max_line_len = limit;
        self
    }

    /// Reads one line, strips its terminator (LF, optionally preceded by CR).
    async fn read_line(&mut self) -> Result<Vec<u8>, ParseError> {
        let mut line = Vec::with_capacity(128);

        // +2 to leave room for the CRLF itself
        let limit = u64::try_from(self.max_line_len)
            .unwrap_or(u64::MAX)
            .saturating_add(2);
        let n = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut line)
            .await?;

        if !line.ends_with(b"\n") {
            if n as u64 == limit {
                return Err(ParseError::LineTooLong {
                    limit: self.max_line_len,
                });
            }
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "unterminated line").into());
        }

        line.pop();
        if line.ends_with(b"\r") {
            line.pop();
        }

        if line.len() > self.max_line_len {
            return Err(ParseError::LineTooLong {
                limit: self.max_line_len,
            });
        }

        Ok(line)
    }

    async fn read_request_line(&mut self) -> Result<RequestLine, ParseError> {
        let line = self.read_line().await?;

        let line = String::from_utf8(line).map_err(|e| {
            ParseError::MalformedRequestLine(String::from_utf8_lossy(e.as_bytes()).into_owned())
        })?;

        let Ok((_, (method, target, version))) = request_line(&line) else {
            return Err(ParseError::MalformedRequestLine(line.clone()));
        };

        let uri = target
            .parse::<Uri>()
            .map_err(|source| ParseError::InvalidRequestUri {
                target: target.to_owned(),
                source,
            })?;

        Ok(RequestLine {
            method: method.to_owned(),
            uri,
            version: version.to_owned(),
        })
    }

    async fn read_headers(&mut self) -> Result<Headers, ParseError> {
        let mut headers = Headers::new();

        loop {
            let line = match self.read_line().await {
                Ok(line) => line,
                Err(ParseError::Io(e)) => return Err(ParseError::TruncatedHeaders(e)),
                Err(e) => return Err(e),
            };

            // CRLF separating headers and body
            if line.is_empty() {
                break;
            }

            let line = std::str::from_utf8(&line).map_err(|_| {
                ParseError::MalformedHeaderLine(String::from_utf8_lossy(&line).into_owned())
            })?;

            let Ok((_, (name, value))) = header_line(line) else {
                return Err(ParseError::MalformedHeaderLine(line.to_owned()));
            };

            headers.add_raw(name, value);
        }

        Ok(headers)
    }

    /// Reads a single request: request line, header block and (lazily) the body.
    ///
    /// The body is not read here, it is a view over the rest of the stream bounded by
    /// `Content-Length`. Without that header the request has no body. On error the stream position
    /// is undefined and the connection should be dropped.
    pub async fn read_request(mut self) -> Result<Request<R>, ParseError> {
        let RequestLine {
            method,
            uri,
            version,
        } = self.read_request_line().await?;

        trace!(%method, %uri, %version, "request line");

        let headers = self.read_headers().await?;

        let body = match content_length(&headers)? {
            Some(len) => Body::sized(self.reader, len),
            None => Body::absent(self.reader),
        };

        debug!(
            %method,
            %uri,
            headers = headers.len(),
            content_length = ?body.declared_len(),
            "parsed request"
        );

        Ok(Request {
            method,
            uri,
            version,
            headers,
            body,
        })
    }
}

#[derive(Debug)]
struct RequestLine {
    method: String,
    uri: Uri,
    version: String,
}

/// `METHOD SP TARGET SP VERSION`, exactly three non-empty tokens separated by single spaces.
fn request_line(input: &str) -> IResult<&str, (&str, &str, &str)> {
    all_consuming(tuple((
        terminated(is_not(" "), char(' ')),
        terminated(is_not(" "), char(' ')),
        is_not(" "),
    )))(input)
}

/// `NAME ":" VALUE`, split at the first colon.
fn header_line(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(take_until(":"), char(':'), rest)(input)
}

fn content_length(headers: &Headers) -> Result<Option<u64>, ParseError> {
    let Some(values) = headers.get_all(CONTENT_LENGTH) else {
        return Ok(None);
    };

    let [value] = values else {
        return Err(ParseError::MalformedContentLength(format!(
            "expected a single value, got {}",
            values.len()
        )));
    };

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::MalformedContentLength(format!(
            "'{value}' is not a non-negative integer"
        )));
    }

    match value.parse::<u64>() {
        Ok(len) if len <= MAX_CONTENT_LENGTH => Ok(Some(len)),
        _ => Err(ParseError::MalformedContentLength(format!(
            "'{value}' is out of range"
        ))),
    }
}
