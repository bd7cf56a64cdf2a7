use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf, Take};

/// Request body delimited by `Content-Length`.
///
/// The body is a bounded view over the connection stream: it yields at most the declared number
/// of bytes and then reports end-of-input. Without a `Content-Length` (or with a zero one) the
/// view is exhausted from the start. Whatever follows the body stays in the underlying stream
/// (see [`Body::into_inner`]).
#[derive(Debug)]
pub struct Body<R> {
    declared: Option<u64>,
    reader: Take<R>,
}

impl<R> Body<R>
where
    R: AsyncRead,
{
    /// No `Content-Length` was sent, there is no body.
    #[inline]
    pub(crate) fn absent(reader: R) -> Self {
        Self {
            declared: None,
            reader: reader.take(0),
        }
    }

    #[inline]
    pub(crate) fn sized(reader: R, len: u64) -> Self {
        Self {
            declared: Some(len),
            reader: reader.take(len),
        }
    }

    /// Length declared by the request, `None` if the header was absent.
    #[inline]
    pub fn declared_len(&self) -> Option<u64> {
        self.declared
    }

    #[inline]
    pub fn is_absent(&self) -> bool {
        self.declared.is_none()
    }

    /// Bytes left before the body reports end-of-input.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.reader.limit()
    }

    /// Gives back the stream positioned right after the consumed part of the body.
    #[inline]
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

impl<R> Body<R>
where
    R: AsyncRead + Unpin,
{
    /// Reads the rest of the body into memory.
    ///
    /// Fails with [`io::ErrorKind::UnexpectedEof`] if the peer closes the stream before the
    /// declared length is reached.
    pub async fn bytes(&mut self) -> io::Result<Bytes> {
        let expected = self.remaining();
        if expected == 0 {
            return Ok(Bytes::new());
        }

        // don't trust the peer with the initial allocation
        let capacity = usize::try_from(expected).map_or(usize::MAX, |n| n.min(64 * 1024));
        let mut buf = BytesMut::with_capacity(capacity);

        while self.reader.read_buf(&mut buf).await? > 0 {}

        if self.remaining() > 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("body ended after {} of {expected} bytes", buf.len()),
            ));
        }

        Ok(buf.freeze())
    }
}

impl<R> AsyncRead for Body<R>
where
    R: AsyncRead + Unpin,
{
    #[inline]
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().reader).poll_read(cx, buf)
    }
}
