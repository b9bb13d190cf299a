//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Build a [`Response`] in your handler and return it. The
//! [`respond`](crate::respond) module has writers that also set
//! `content-length` and take an explicit status; [`set`](crate::set) tweaks
//! headers on a response you already have.

use http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::body::Body;
use crate::status::Status;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`] and
/// [`set::content_type`](crate::set::content_type).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json; charset=utf-8
    MsgPack,      // application/msgpack
    OctetStream,  // application/octet-stream  (binary / file download)
    Pdf,          // application/pdf
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json; charset=utf-8",
            Self::MsgPack     => "application/msgpack",
            Self::OctetStream => "application/octet-stream",
            Self::Pdf         => "application/pdf",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK)
///
/// ```rust
/// use tsu_ext::{Response, Status};
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(Status::NoContent);
/// Response::error(Status::Forbidden);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use tsu_ext::{Response, ContentType, Status};
///
/// Response::builder()
///     .status(Status::Created)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
///
/// Response::builder()
///     .bytes(ContentType::Xml, b"<ok/>".to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) inner: http::Response<Body>,
}

impl Response {
    /// `200 OK` with `application/json`.
    pub fn json(body: Vec<u8>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK` with `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// `200 OK` with `text/html; charset=utf-8`.
    pub fn html(body: impl Into<String>) -> Self {
        Self::builder().bytes(ContentType::Html, body.into().into_bytes())
    }

    /// Response with no body.
    pub fn status(code: Status) -> Self {
        Self::builder().status(code).no_body()
    }

    /// Plain-text error whose body is the reason phrase and a newline.
    ///
    /// Also sets `x-content-type-options: nosniff` so browsers do not try to
    /// render the body as anything but text.
    pub fn error(code: Status) -> Self {
        Self::error_with(code, code.reason())
    }

    pub(crate) fn error_with(code: Status, message: &str) -> Self {
        let mut res = Self::builder().status(code).text(format!("{message}\n"));
        res.headers_mut().insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        res
    }

    /// Redirect to `location` with the given 3xx status and no body.
    pub fn redirect(location: &str, code: Status) -> Self {
        Self::builder().status(code).header("location", location).no_body()
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HeaderMap::new(), status: Status::Ok }
    }

    pub fn status_code(&self) -> u16 {
        self.inner.status().as_u16()
    }

    pub fn set_status(&mut self, code: Status) {
        *self.inner.status_mut() = code.into();
    }

    pub fn headers(&self) -> &HeaderMap { self.inner.headers() }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { self.inner.headers_mut() }
    pub fn body_mut(&mut self) -> &mut Body { self.inner.body_mut() }
    pub fn into_body(self) -> Body { self.inner.into_body() }

    /// Header value as a string; `None` when absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name).and_then(|v| v.to_str().ok())
    }

    pub(crate) fn map_body(self, f: impl FnOnce(Body) -> Body) -> Self {
        Self { inner: self.inner.map(f) }
    }

    pub(crate) fn into_inner(self) -> http::Response<Body> {
        self.inner
    }
}

impl From<http::Response<Body>> for Response {
    fn from(inner: http::Response<Body>) -> Self {
        Self { inner }
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `Status::Ok` (200).
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: HeaderMap,
    status: Status,
}

impl ResponseBuilder {
    pub fn status(mut self, code: Status) -> Self {
        self.status = code;
        self
    }

    /// Appends a header. Names or values that are not valid HTTP are dropped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::debug!(name, "dropping invalid response header"),
        }
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: Vec<u8>) -> Response {
        self.finish("application/json", Body::from(body))
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Text.as_str(), Body::from(body.into()))
    }

    /// Terminate with a typed body. Use this for XML, HTML, binary, SSE, etc.
    pub fn bytes(self, content_type: ContentType, body: Vec<u8>) -> Response {
        self.finish(content_type.as_str(), Body::from(body))
    }

    /// Terminate with an arbitrary body, streaming or not.
    pub fn body(self, content_type: &'static str, body: Body) -> Response {
        self.finish(content_type, body)
    }

    /// Terminate with no body (e.g. `Status::NoContent`, `Status::MovedPermanently`).
    pub fn no_body(self) -> Response {
        self.build(Body::empty())
    }

    fn finish(mut self, content_type: &'static str, body: Body) -> Response {
        self.headers
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(content_type));
        self.build(body)
    }

    fn build(self, body: Body) -> Response {
        let mut inner = http::Response::new(body);
        *inner.status_mut() = self.status.into();
        *inner.headers_mut() = self.headers;
        Response { inner }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a [`Status`] directly from a handler: `return Status::NotFound`
impl IntoResponse for Status {
    fn into_response(self) -> Response { Response::status(self) }
}

/// `(Status::Created, "done")` overrides the status of the inner response.
impl<T: IntoResponse> IntoResponse for (Status, T) {
    fn into_response(self) -> Response {
        let mut res = self.1.into_response();
        res.set_status(self.0);
        res
    }
}

impl<T: IntoResponse, E: IntoResponse> IntoResponse for Result<T, E> {
    fn into_response(self) -> Response {
        match self {
            Ok(v) => v.into_response(),
            Err(e) => e.into_response(),
        }
    }
}
