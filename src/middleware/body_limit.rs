use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http_body::{Body as HttpBody, Frame, SizeHint};

use crate::body::Body;
use crate::error::{BoxError, Error};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

use super::{Middleware, Next, respond_now};

/// Caps the size of request bodies.
///
/// A declared `content-length` above the limit is answered with `413`
/// before the handler runs. Otherwise the body is wrapped in a
/// [`LimitedBody`], so a client that lies about (or omits) the length still
/// cannot push more than `limit` bytes: reading fails with
/// [`Error::PayloadTooLarge`], which converts to a `413` response.
#[derive(Clone, Copy, Debug)]
pub struct BodyLimit {
    limit: u64,
}

impl BodyLimit {
    pub fn new(limit_bytes: u64) -> Self {
        Self { limit: limit_bytes }
    }
}

impl Middleware for BodyLimit {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let declared = req
            .header(CONTENT_LENGTH.as_str())
            .and_then(|v| v.trim().parse::<u64>().ok());
        if declared.is_some_and(|len| len > self.limit) {
            tracing::debug!(limit = self.limit, declared = ?declared, "rejecting oversized request body");
            return respond_now(Response::error(Status::ContentTooLarge));
        }

        let body = req.take_body();
        *req.body_mut() = Body::new(LimitedBody::new(body, self.limit));
        next.run(req)
    }
}

/// A body that fails once more than `limit` bytes have been read from it.
///
/// A body of exactly `limit` bytes is accepted.
#[derive(Debug)]
pub struct LimitedBody<B = Body> {
    inner: B,
    limit: u64,
    read: u64,
    exceeded: bool,
}

impl<B> LimitedBody<B> {
    pub fn new(inner: B, limit: u64) -> Self {
        Self { inner, limit, read: 0, exceeded: false }
    }

    /// Bytes read through this body so far.
    pub fn bytes_read(&self) -> u64 {
        self.read
    }
}

impl<B> HttpBody for LimitedBody<B>
where
    B: HttpBody<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Error>>> {
        let this = self.get_mut();
        if this.exceeded {
            return Poll::Ready(None);
        }

        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.read += data.len() as u64;
                    if this.read > this.limit {
                        this.exceeded = true;
                        return Poll::Ready(Some(Err(Error::PayloadTooLarge { limit: this.limit })));
                    }
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => Poll::Ready(Some(Err(Error::body(e)))),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.exceeded || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::test_support::{body_text, run};

    fn post(body: Body, content_length: Option<usize>) -> Request {
        let mut builder = http::Request::post("/upload");
        if let Some(len) = content_length {
            builder = builder.header("content-length", len);
        }
        builder.body(body).unwrap().into()
    }

    #[tokio::test]
    async fn accepts_body_at_the_limit() {
        let res = run(BodyLimit::new(5), post(Body::from("hello"), Some(5))).await;
        assert_eq!(res.status_code(), 200);
        assert_eq!(body_text(res).await, "hello");
    }

    #[tokio::test]
    async fn rejects_declared_length_before_handler() {
        let res = run(BodyLimit::new(4), post(Body::from("hello"), Some(5))).await;
        assert_eq!(res.status_code(), 413);
        assert_eq!(res.header("x-seen-path"), None);
        assert_eq!(body_text(res).await, "Request Entity Too Large\n");
    }

    #[tokio::test]
    async fn rejects_undeclared_stream_while_reading() {
        let data = vec![b'x'; 20_000];
        let body = Body::from_reader(std::io::Cursor::new(data));
        let res = run(BodyLimit::new(10_000), post(body, None)).await;
        assert_eq!(res.status_code(), 413);
    }

    #[tokio::test]
    async fn lying_content_length_is_still_capped() {
        let res = run(BodyLimit::new(3), post(Body::from("hello"), Some(2))).await;
        assert_eq!(res.status_code(), 413);
    }

    #[tokio::test]
    async fn limited_body_counts_bytes() {
        let body = LimitedBody::new(Body::from("abc"), 3);
        let collected = Body::new(body).collect().await.unwrap();
        assert_eq!(collected, "abc");

        let err = Body::new(LimitedBody::new(Body::from("abcd"), 3))
            .collect()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { limit: 3 }));
    }
}
