use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Instant;

use bytes::Bytes;
use http::header::USER_AGENT;
use http_body::{Body as HttpBody, Frame, SizeHint};
use tracing::Level;

use crate::body::Body;
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;

use super::{Middleware, Next};

/// Access log: one `tracing` event per request.
///
/// The event is `"handled request"` with the fields `method`, `uri`,
/// `user_agent`, `ip`, `code`, `bytes`, `request_time_pretty` and
/// `request_time_ns`. It fires once the response body has been fully sent
/// (or dropped), so `bytes` and the timings cover streamed bodies too.
///
/// Add it as the first layer so it sees the URI before any rewriting.
#[derive(Clone, Copy, Debug)]
pub struct Logger {
    level: Level,
}

impl Logger {
    /// Logs at `INFO`.
    pub fn new() -> Self {
        Self { level: Level::INFO }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for Logger {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let entry = Entry {
            level: self.level,
            method: req.method_str().to_owned(),
            uri: req.path_and_query().to_owned(),
            user_agent: req.header(USER_AGENT.as_str()).unwrap_or_default().to_owned(),
            ip: req.remote_addr().map(|a| a.to_string()).unwrap_or_default(),
            start: Instant::now(),
            code: 0,
        };

        let fut = next.run(req);
        Box::pin(async move {
            let res = fut.await;
            let entry = Entry { code: res.status_code(), ..entry };
            res.map_body(|inner| Body::new(LoggedBody { inner, bytes: 0, entry: Some(entry) }))
        })
    }
}

struct Entry {
    level: Level,
    method: String,
    uri: String,
    user_agent: String,
    ip: String,
    start: Instant,
    code: u16,
}

impl Entry {
    fn emit(self, bytes: u64) {
        let elapsed = self.start.elapsed();
        let ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);

        macro_rules! access {
            ($lvl:expr) => {
                tracing::event!(
                    $lvl,
                    method = %self.method,
                    uri = %self.uri,
                    user_agent = %self.user_agent,
                    ip = %self.ip,
                    code = self.code,
                    bytes,
                    request_time_pretty = ?elapsed,
                    request_time_ns = ns,
                    "handled request"
                )
            };
        }

        match self.level {
            Level::ERROR => access!(Level::ERROR),
            Level::WARN => access!(Level::WARN),
            Level::INFO => access!(Level::INFO),
            Level::DEBUG => access!(Level::DEBUG),
            _ => access!(Level::TRACE),
        }
    }
}

/// Counts body bytes and logs the entry when the stream ends.
struct LoggedBody {
    inner: Body,
    bytes: u64,
    entry: Option<Entry>,
}

impl LoggedBody {
    fn finish(&mut self) {
        if let Some(entry) = self.entry.take() {
            entry.emit(self.bytes);
        }
    }
}

impl HttpBody for LoggedBody {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Error>>> {
        let this = self.get_mut();
        let frame = ready!(Pin::new(&mut this.inner).poll_frame(cx));
        match &frame {
            Some(Ok(f)) => {
                if let Some(data) = f.data_ref() {
                    this.bytes += data.len() as u64;
                }
            }
            Some(Err(_)) | None => this.finish(),
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for LoggedBody {
    fn drop(&mut self) {
        self.finish();
    }
}
