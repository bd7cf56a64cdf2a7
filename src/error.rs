use std::io;

use thiserror::Error;

/// Failure to frame a request. Every variant is terminal for the connection.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed request line: '{0}'")]
    MalformedRequestLine(String),

    #[error("invalid request URI '{target}'")]
    InvalidRequestUri {
        target: String,
        #[source]
        source: http::uri::InvalidUri,
    },

    #[error("malformed header line: '{0}'")]
    MalformedHeaderLine(String),

    #[error("stream ended before the end of the header block")]
    TruncatedHeaders(#[source] io::Error),

    #[error("malformed Content-Length: {0}")]
    MalformedContentLength(String),

    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("stream I/O error")]
    Io(#[from] io::Error),
}
