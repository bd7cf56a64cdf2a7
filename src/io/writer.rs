use std::io;

use itertools::Itertools as _;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::header::Headers;
use crate::io::CRLF;
use crate::{Response, StatusCode};

const VERSION: &str = "HTTP/1.1";

/// Serializes a single response: status line, header lines, blank line, body.
///
/// The first failed write aborts the rest of the response and is returned to the caller.
pub struct ResponseWriter<W> {
    writer: BufWriter<W>,
    written: u64,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    #[inline]
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            written: 0,
        }
    }

    #[inline]
    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    async fn write_status_line(&mut self, status: StatusCode) -> io::Result<()> {
        let (status, reason) = status.resolve();

        // NOTE: the space after the reason phrase is part of the format
        let line = format!("{VERSION} {} {reason} \r\n", status.as_u16());
        self.write(line.as_bytes()).await
    }

    async fn write_header(&mut self, name: &str, values: &[String]) -> io::Result<()> {
        let line = format!("{name}: {}\r\n", values.iter().join(","));
        self.write(line.as_bytes()).await
    }

    async fn write_headers(&mut self, headers: &Headers) -> io::Result<()> {
        for (name, values) in headers.iter().filter(|(_, values)| !values.is_empty()) {
            self.write_header(name, values).await?;
        }
        self.write(CRLF).await
    }

    /// Writes the response followed by `body` and returns the number of bytes written.
    ///
    /// The body is written verbatim. Nothing checks it against a `Content-Length` the caller may
    /// have set, and none is added.
    pub async fn write_response(
        mut self,
        response: &Response,
        body: impl AsRef<[u8]>,
    ) -> io::Result<u64> {
        let body = body.as_ref();

        self.write_status_line(response.status).await?;
        self.write_headers(&response.headers).await?;

        if !body.is_empty() {
            self.write(body).await?;
        }

        self.writer.flush().await?;

        debug!(
            status = response.status.as_u16(),
            body = body.len(),
            written = self.written,
            "wrote response"
        );

        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::header::{CONTENT_LENGTH, CONTENT_TYPE};

    async fn serialize(response: &Response, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let n = ResponseWriter::new(&mut out)
            .write_response(response, body)
            .await
            .expect("write response");
        assert_eq!(n, out.len() as u64);
        out
    }

    #[tokio::test]
    async fn status_line_has_trailing_space() {
        let out = serialize(&Response::new().status(StatusCode::NOT_FOUND), b"").await;
        assert_eq!(out, b"HTTP/1.1 404 Not Found \r\n\r\n");
    }

    #[tokio::test]
    async fn unknown_status_falls_back_to_ok() {
        for code in [9999_u16, 0, 299, 599] {
            let out = serialize(&Response::new().status(code), b"").await;
            assert_eq!(String::from_utf8_lossy(&out), "HTTP/1.1 200 OK \r\n\r\n");
        }
    }

    #[tokio::test]
    async fn multi_value_header_on_one_line() {
        let response = Response::new()
            .header("X-Multi", "one")
            .header("X-Multi", "two");

        let out = serialize(&response, b"").await;
        assert_eq!(
            String::from_utf8_lossy(&out),
            "HTTP/1.1 200 OK \r\nX-Multi: one,two\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn body_written_verbatim() {
        let response = Response::new()
            .status(StatusCode::ACCEPTED)
            .header(CONTENT_LENGTH, "100");

        // declared length is not checked against the body
        let out = serialize(&response, b"short").await;
        assert_eq!(
            String::from_utf8_lossy(&out),
            "HTTP/1.1 202 Accepted \r\nContent-Length: 100\r\n\r\nshort"
        );
    }

    #[tokio::test]
    async fn every_header_is_emitted() {
        let mut response = Response::new();
        response.headers_mut().add("X-A", "1");
        response.headers_mut().add("X-B", "2");
        response.headers_mut().set("X-B", "3");

        let out = serialize(&response, b"").await;
        let out = String::from_utf8_lossy(&out);

        assert!(out.starts_with("HTTP/1.1 200 OK \r\n"), "{out}");
        assert!(out.ends_with("\r\n\r\n"), "{out}");
        assert!(out.contains("X-A: 1\r\n"), "{out}");
        assert!(out.contains("X-B: 3\r\n"), "{out}");
        assert!(!out.contains("X-B: 2"), "{out}");
    }

    #[tokio::test]
    async fn round_trip_through_reference_parser() {
        let response = Response::new()
            .status(201_u16)
            .header(CONTENT_TYPE, "application/json");

        let out = serialize(&response, b"hello").await;

        let mut headers = [httparse::EMPTY_HEADER; 4];
        let mut parsed = httparse::Response::new(&mut headers);
        let httparse::Status::Complete(offset) = parsed.parse(&out).expect("valid response") else {
            panic!("incomplete response");
        };

        assert_eq!(parsed.code, Some(201));
        assert_eq!(parsed.version, Some(1));
        assert_eq!(parsed.headers.len(), 1);
        assert_eq!(parsed.headers[0].name, CONTENT_TYPE);
        assert_eq!(parsed.headers[0].value, b"application/json");
        assert_eq!(&out[offset..], b"hello");
    }

    /// Accepts up to `capacity` bytes, then fails every write.
    struct BrokenPipe {
        accepted: Vec<u8>,
        capacity: usize,
    }

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            let n = buf.len().min(this.capacity - this.accepted.len());
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
            }
            this.accepted.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn write_error_is_reported() {
        let mut pipe = BrokenPipe {
            accepted: Vec::new(),
            capacity: 10,
        };

        let response = Response::new().header("X-Foo", "bar");
        let error = ResponseWriter::new(&mut pipe)
            .write_response(&response, b"body")
            .await
            .expect_err("broken pipe");

        assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(pipe.accepted, b"HTTP/1.1 2");
    }
}
