use anyhow::{bail, Context, Result};
use http::Uri;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::header::{APPLICATION_JSON, CONTENT_TYPE};

pub use body::Body;
pub use config::Config;
pub use error::ParseError;
pub use header::Headers;
pub use io::{RequestReader, ResponseWriter};

pub mod body;
pub(crate) mod config;
pub mod error;
pub mod header;
pub mod io;

/// A parsed request. Only the body can be consumed, everything else is read-only.
#[derive(Debug)]
pub struct Request<R> {
    method: String,
    uri: Uri,
    version: String,
    headers: Headers,
    body: Body<BufReader<R>>,
}

impl<R> Request<R> {
    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request target, either origin-form (`/path?query`) or absolute.
    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[inline]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[inline]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[inline]
    pub fn body(&self) -> &Body<BufReader<R>> {
        &self.body
    }

    #[inline]
    pub fn body_mut(&mut self) -> &mut Body<BufReader<R>> {
        &mut self.body
    }

    #[inline]
    pub fn into_body(self) -> Body<BufReader<R>> {
        self.body
    }
}

macro_rules! status_code {
    ($(($name:ident, $code:literal, $repr:literal)),+ $(,)?) => {
        impl StatusCode {
            $(pub const $name: StatusCode = StatusCode($code);)+

            /// Standard reason phrase, `None` for codes outside the table.
            #[inline]
            pub const fn canonical_reason(&self) -> Option<&'static str> {
                match self.0 {
                    $($code => Some($repr),)+
                    _ => None,
                }
            }
        }
    };
}

/// Response status code. Any `u16` is accepted, codes without a known reason phrase are sent as
/// `200 OK`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct StatusCode(u16);

status_code! {
    (CONTINUE, 100, "Continue"),
    (SWITCHING_PROTOCOLS, 101, "Switching Protocols"),
    (PROCESSING, 102, "Processing"),
    (OK, 200, "OK"),
    (CREATED, 201, "Created"),
    (ACCEPTED, 202, "Accepted"),
    (NON_AUTHORITATIVE_INFORMATION, 203, "Non-Authoritative Information"),
    (NO_CONTENT, 204, "No Content"),
    (RESET_CONTENT, 205, "Reset Content"),
    (PARTIAL_CONTENT, 206, "Partial Content"),
    (MULTI_STATUS, 207, "Multi-Status"),
    (ALREADY_REPORTED, 208, "Already Reported"),
    (IM_USED, 226, "IM Used"),
    (MULTIPLE_CHOICES, 300, "Multiple Choices"),
    (MOVED_PERMANENTLY, 301, "Moved Permanently"),
    (FOUND, 302, "Found"),
    (SEE_OTHER, 303, "See Other"),
    (NOT_MODIFIED, 304, "Not Modified"),
    (USE_PROXY, 305, "Use Proxy"),
    (TEMPORARY_REDIRECT, 307, "Temporary Redirect"),
    (PERMANENT_REDIRECT, 308, "Permanent Redirect"),
    (BAD_REQUEST, 400, "Bad Request"),
    (UNAUTHORIZED, 401, "Unauthorized"),
    (PAYMENT_REQUIRED, 402, "Payment Required"),
    (FORBIDDEN, 403, "Forbidden"),
    (NOT_FOUND, 404, "Not Found"),
    (METHOD_NOT_ALLOWED, 405, "Method Not Allowed"),
    (NOT_ACCEPTABLE, 406, "Not Acceptable"),
    (PROXY_AUTHENTICATION_REQUIRED, 407, "Proxy Authentication Required"),
    (REQUEST_TIMEOUT, 408, "Request Timeout"),
    (CONFLICT, 409, "Conflict"),
    (GONE, 410, "Gone"),
    (LENGTH_REQUIRED, 411, "Length Required"),
    (PRECONDITION_FAILED, 412, "Precondition Failed"),
    (PAYLOAD_TOO_LARGE, 413, "Payload Too Large"),
    (URI_TOO_LONG, 414, "URI Too Long"),
    (UNSUPPORTED_MEDIA_TYPE, 415, "Unsupported Media Type"),
    (RANGE_NOT_SATISFIABLE, 416, "Range Not Satisfiable"),
    (EXPECTATION_FAILED, 417, "Expectation Failed"),
    (IM_A_TEAPOT, 418, "I'm a teapot"),
    (MISDIRECTED_REQUEST, 421, "Misdirected Request"),
    (UNPROCESSABLE_ENTITY, 422, "Unprocessable Entity"),
    (LOCKED, 423, "Locked"),
    (FAILED_DEPENDENCY, 424, "Failed Dependency"),
    (TOO_EARLY, 425, "Too Early"),
    (UPGRADE_REQUIRED, 426, "Upgrade Required"),
    (PRECONDITION_REQUIRED, 428, "Precondition Required"),
    (TOO_MANY_REQUESTS, 429, "Too Many Requests"),
    (REQUEST_HEADER_FIELDS_TOO_LARGE, 431, "Request Header Fields Too Large"),
    (UNAVAILABLE_FOR_LEGAL_REASONS, 451, "Unavailable For Legal Reasons"),
    (INTERNAL_SERVER_ERROR, 500, "Internal Server Error"),
    (NOT_IMPLEMENTED, 501, "Not Implemented"),
    (BAD_GATEWAY, 502, "Bad Gateway"),
    (SERVICE_UNAVAILABLE, 503, "Service Unavailable"),
    (GATEWAY_TIMEOUT, 504, "Gateway Timeout"),
    (HTTP_VERSION_NOT_SUPPORTED, 505, "HTTP Version Not Supported"),
    (VARIANT_ALSO_NEGOTIATES, 506, "Variant Also Negotiates"),
    (INSUFFICIENT_STORAGE, 507, "Insufficient Storage"),
    (LOOP_DETECTED, 508, "Loop Detected"),
    (NOT_EXTENDED, 510, "Not Extended"),
    (NETWORK_AUTHENTICATION_REQUIRED, 511, "Network Authentication Required"),
}

impl StatusCode {
    #[inline]
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// The code and phrase actually put on the wire: unknown codes become `200 OK`.
    #[inline]
    pub const fn resolve(self) -> (Self, &'static str) {
        match self.canonical_reason() {
            Some(reason) => (self, reason),
            None => (Self::OK, "OK"),
        }
    }
}

impl Default for StatusCode {
    #[inline]
    fn default() -> Self {
        Self::OK
    }
}

impl From<u16> for StatusCode {
    #[inline]
    fn from(code: u16) -> Self {
        Self(code)
    }
}

/// Status and headers of a response, serialized by [`ResponseWriter`].
#[derive(Clone, Debug, Default)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: Headers,
}

impl Response {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn status(mut self, status: impl Into<StatusCode>) -> Self {
        self.status = status.into();
        self
    }

    /// Appends a header value, see [`Headers::add`].
    #[inline]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    #[inline]
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }
}

/// Handle a single HTTP/1.1 request on a client connection.
///
/// The connection is closed when this returns, including when the request cannot be parsed.
pub async fn handle_connection(mut stream: TcpStream, cfg: Config) -> Result<()> {
    let peer = stream.peer_addr().context("peer address")?;
    let (reader, writer) = stream.split();

    let reader = RequestReader::new(reader).max_line_len(cfg.max_line_len());

    let mut req = reader.read_request().await.context("read request")?;

    // the body is not needed, drain it without buffering
    let drained = tokio::io::copy(req.body_mut(), &mut tokio::io::sink())
        .await
        .context("read request body")?;

    if req.body().remaining() > 0 {
        bail!(
            "request body ended after {drained} of {} bytes",
            req.body().declared_len().unwrap_or_default()
        );
    }

    info!(
        %peer,
        method = req.method(),
        uri = %req.uri(),
        version = req.version(),
        body = drained,
        "request"
    );

    let resp = Response::new()
        .status(StatusCode::CREATED)
        .header(CONTENT_TYPE, APPLICATION_JSON)
        .header("X-Multi-Header", "one")
        .header("X-Multi-Header", "two");

    let written = ResponseWriter::new(writer)
        .write_response(&resp, "hello")
        .await
        .context("write response")?;

    debug!(%peer, written, "response sent");

    Ok(())
}

/// Accept connections forever, handling each one on its own task.
///
/// A failing connection is logged and dropped, it never stops the listener.
pub async fn serve(listener: TcpListener, cfg: Config) -> Result<()> {
    info!(addr = %listener.local_addr().context("listen address")?, "accepting connections");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(client) => client,
            Err(error) => {
                tracing::error!(%error, "cannot get client");
                continue;
            }
        };

        if let Err(error) = stream.set_nodelay(true) {
            warn!(%peer, %error, "cannot configure connection, dropping it");
            continue;
        }

        tokio::spawn(async move {
            if let Err(error) = handle_connection(stream, cfg).await {
                warn!(%peer, "connection failed: {error:#}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn known_codes_keep_their_phrase() {
        assert_eq!(StatusCode::CREATED.resolve(), (StatusCode::CREATED, "Created"));
        assert_eq!(
            StatusCode::from(418_u16).resolve(),
            (StatusCode::IM_A_TEAPOT, "I'm a teapot")
        );
        assert_eq!(
            StatusCode::from(511_u16).canonical_reason(),
            Some("Network Authentication Required")
        );
    }

    #[test]
    fn unknown_codes_resolve_to_ok() {
        for code in [0_u16, 1, 199, 306, 499, 9999, u16::MAX] {
            assert_eq!(StatusCode::from(code).canonical_reason(), None);
            assert_eq!(StatusCode::from(code).resolve(), (StatusCode::OK, "OK"));
        }
    }

    #[test]
    fn response_builder() {
        let resp = Response::new()
            .status(StatusCode::NO_CONTENT)
            .header("X-Foo", "a")
            .header("X-Foo", "b");

        assert_eq!(resp.status_code(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers().get_all("X-Foo").unwrap_or_default(), ["a", "b"]);
        assert_eq!(Response::new().status_code(), StatusCode::OK);
    }
}
