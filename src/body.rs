//! Streaming request and response body.
//!
//! Requests arrive as a hyper stream and may be wrapped by middleware (see
//! [`LimitedBody`](crate::middleware::LimitedBody)); responses are usually a
//! single buffer but can be fed from any [`AsyncRead`]. Both directions share
//! one boxed type so middleware can swap bodies without knowing their origin.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::{BoxError, Error};

const READ_CHUNK: usize = 8 * 1024;

/// A type-erased HTTP body yielding [`Bytes`] frames.
pub struct Body(UnsyncBoxBody<Bytes, Error>);

impl Body {
    /// Wraps any [`http_body::Body`] producing `Bytes`.
    pub fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self(body.map_err(Error::body).boxed_unsync())
    }

    pub fn empty() -> Self {
        Self::new(Empty::<Bytes>::new())
    }

    pub fn full(data: impl Into<Bytes>) -> Self {
        Self::new(Full::new(data.into()))
    }

    /// Streams the reader in chunks until it reports EOF.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self::new(ReaderBody {
            reader: Box::pin(reader),
            scratch: vec![0; READ_CHUNK],
            done: false,
        })
    }

    /// Buffers the whole body.
    ///
    /// Fails with the first error the stream reports, e.g.
    /// [`Error::PayloadTooLarge`] when a body limit is in place.
    pub async fn collect(self) -> Result<Bytes, Error> {
        Ok(BodyExt::collect(self.0).await?.to_bytes())
    }
}

impl HttpBody for Body {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.0).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.0.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.0.size_hint()
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").field("size_hint", &self.0.size_hint()).finish()
    }
}

impl From<()> for Body {
    fn from((): ()) -> Self {
        Self::empty()
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self::full(s)
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::full(s)
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Self::full(v)
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Self::full(b)
    }
}

struct ReaderBody<R> {
    reader: Pin<Box<R>>,
    scratch: Vec<u8>,
    done: bool,
}

impl<R: AsyncRead> HttpBody for ReaderBody<R> {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        let mut buf = ReadBuf::new(&mut this.scratch);
        match this.reader.as_mut().poll_read(cx, &mut buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(Ok(())) if buf.filled().is_empty() => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(Ok(())) => {
                Poll::Ready(Some(Ok(Frame::data(Bytes::copy_from_slice(buf.filled())))))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done
    }
}
