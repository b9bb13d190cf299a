//! Response-body writers.
//!
//! Every writer takes the status explicitly and sets both `content-type` and
//! `content-length`, so proxies and clients see a sized body even when a
//! middleware later wraps it.
//!
//! ```rust
//! use serde::Serialize;
//! use tsu_ext::{respond, Request, Response, Status};
//!
//! #[derive(Serialize)]
//! struct User { id: u32, name: &'static str }
//!
//! async fn get_user(_req: Request) -> Response {
//!     respond::json(&User { id: 1, name: "alice" }, Status::Ok)
//! }
//! ```

use std::collections::HashMap;
use std::io;

use bytes::Bytes;
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter, Serializer};
use tokio::io::AsyncRead;

use crate::body::Body;
use crate::error::{BoxError, Error};
use crate::response::{ContentType, Response};
use crate::set;
use crate::status::Status;

/// Writes `body` with the given content type.
pub fn blob(mime: &str, body: impl Into<Bytes>, status: Status) -> Response {
    let body = body.into();
    let len = body.len() as u64;
    let mut res = Response::status(status);
    *res.body_mut() = Body::full(body);
    set::content_length(&mut res, len);
    set::content_type(&mut res, mime);
    res
}

pub fn plain_text(body: impl Into<String>, status: Status) -> Response {
    blob(ContentType::Text.as_str(), Into::<String>::into(body), status)
}

pub fn plain_text_blob(body: impl Into<Bytes>, status: Status) -> Response {
    blob(ContentType::Text.as_str(), body, status)
}

pub fn html(body: impl Into<String>, status: Status) -> Response {
    blob(ContentType::Html.as_str(), Into::<String>::into(body), status)
}

pub fn html_blob(body: impl Into<Bytes>, status: Status) -> Response {
    blob(ContentType::Html.as_str(), body, status)
}

/// Writes an already-encoded JSON document.
pub fn json_string(body: impl Into<String>, status: Status) -> Response {
    blob(ContentType::Json.as_str(), Into::<String>::into(body), status)
}

/// Writes already-encoded JSON bytes.
pub fn json_blob(body: impl Into<Bytes>, status: Status) -> Response {
    blob(ContentType::Json.as_str(), body, status)
}

/// Serializes `value` as compact JSON followed by a newline.
///
/// `<`, `>` and `&` inside strings are written as `\u003c`, `\u003e` and
/// `\u0026` (likewise U+2028 and U+2029), so the output is safe to inline
/// into HTML. A value that fails to serialize produces a `500` whose body is
/// the serializer's message.
pub fn json<T: Serialize + ?Sized>(value: &T, status: Status) -> Response {
    encoded(encode(value, serde_json::ser::CompactFormatter), status)
}

/// Like [`json`], indented by two spaces.
pub fn json_indented<T: Serialize + ?Sized>(value: &T, status: Status) -> Response {
    encoded(encode(value, PrettyFormatter::with_indent(b"  ")), status)
}

fn encoded(result: Result<Vec<u8>, serde_json::Error>, status: Status) -> Response {
    match result {
        Ok(buf) => json_blob(buf, status),
        Err(e) => Response::error_with(Status::InternalServerError, &e.to_string()),
    }
}

fn encode<T, F>(value: &T, formatter: F) -> Result<Vec<u8>, serde_json::Error>
where
    T: Serialize + ?Sized,
    F: Formatter,
{
    let mut buf = Vec::with_capacity(128);
    let mut ser = Serializer::with_formatter(&mut buf, HtmlSafe(formatter));
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Streams `reader` as `application/octet-stream`.
///
/// Change the type afterwards with [`set::content_type`] if you know better.
pub fn stream<R>(reader: R, status: Status) -> Response
where
    R: AsyncRead + Send + 'static,
{
    Response::builder()
        .status(status)
        .body(ContentType::OctetStream.as_str(), Body::from_reader(reader))
}

/// A named collection of templates.
///
/// Plug in any engine by implementing this for its registry. A map from
/// name to render closure works out of the box:
///
/// ```rust
/// use std::collections::HashMap;
/// use tsu_ext::respond::{self, RenderFn};
/// use tsu_ext::Status;
///
/// let mut pages: HashMap<String, RenderFn> = HashMap::new();
/// pages.insert("hello".into(), Box::new(|data| {
///     Ok(format!("<p>Hello, {}</p>", data["name"].as_str().unwrap_or("you")))
/// }));
///
/// let res = respond::template(&pages, "hello", &serde_json::json!({"name": "Ada"}), Status::Ok);
/// assert!(res.is_ok());
/// ```
pub trait TemplateSet {
    /// Renders template `name`. `None` when the set has no such template.
    fn render(&self, name: &str, data: &serde_json::Value) -> Option<Result<String, BoxError>>;
}

/// A boxed render function, the value type of the built-in [`TemplateSet`] map.
pub type RenderFn = Box<dyn Fn(&serde_json::Value) -> Result<String, BoxError> + Send + Sync>;

impl<F> TemplateSet for HashMap<String, F>
where
    F: Fn(&serde_json::Value) -> Result<String, BoxError>,
{
    fn render(&self, name: &str, data: &serde_json::Value) -> Option<Result<String, BoxError>> {
        self.get(name).map(|render| render(data))
    }
}

/// Renders template `name` with `data` into an HTML response.
///
/// Fails with [`Error::TemplateNotFound`] when `templates` has no template
/// by that name, and with [`Error::Template`] when rendering fails.
pub fn template<S, D>(templates: &S, name: &str, data: &D, status: Status) -> Result<Response, Error>
where
    S: TemplateSet + ?Sized,
    D: Serialize + ?Sized,
{
    let data = serde_json::to_value(data)?;
    let html = templates
        .render(name, &data)
        .ok_or_else(|| Error::TemplateNotFound(name.to_owned()))?
        .map_err(Error::Template)?;
    Ok(html_blob(html, status))
}

/// Escapes HTML-significant characters inside JSON strings, delegating
/// layout to the wrapped formatter.
struct HtmlSafe<F>(F);

macro_rules! delegate {
    ($($name:ident($($arg:ident: $ty:ty),*);)+) => {
        $(
            fn $name<W>(&mut self, writer: &mut W $(, $arg: $ty)*) -> io::Result<()>
            where
                W: ?Sized + io::Write,
            {
                self.0.$name(writer $(, $arg)*)
            }
        )+
    };
}

impl<F: Formatter> Formatter for HtmlSafe<F> {
    delegate! {
        begin_array();
        end_array();
        begin_array_value(first: bool);
        end_array_value();
        begin_object();
        end_object();
        begin_object_key(first: bool);
        end_object_key();
        begin_object_value();
        end_object_value();
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            let escaped = match ch {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(&fragment.as_bytes()[start..i])?;
            writer.write_all(escaped.as_bytes())?;
            start = i + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    async fn text(res: Response) -> String {
        let bytes = res.into_body().collect().await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn blob_sets_length_and_type() {
        let res = plain_text("héllo", Status::Accepted);
        assert_eq!(res.status_code(), 202);
        assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(res.header("content-length"), Some("6"));
        assert_eq!(text(res).await, "héllo");

        let res = html_blob(&b"<b>hi</b>"[..], Status::Ok);
        assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(res.header("content-length"), Some("9"));

        let res = json_string(r#"{"a":1}"#, Status::Created);
        assert_eq!(res.header("content-type"), Some("application/json; charset=utf-8"));
        assert_eq!(res.status_code(), 201);
    }

    #[tokio::test]
    async fn json_escapes_html_and_ends_with_newline() {
        let mut v = BTreeMap::new();
        v.insert("html", "<a href=\"x\">&</a>\u{2028}");
        let res = json(&v, Status::Ok);
        assert_eq!(res.header("content-length"), Some("62"));
        assert_eq!(
            text(res).await,
            "{\"html\":\"\\u003ca href=\\\"x\\\"\\u003e\\u0026\\u003c/a\\u003e\\u2028\"}\n"
        );
    }

    #[tokio::test]
    async fn json_indented_uses_two_spaces() {
        let v = serde_json::json!({"a": [1, 2], "b": "<"});
        let res = json_indented(&v, Status::Ok);
        assert_eq!(
            text(res).await,
            "{\n  \"a\": [\n    1,\n    2\n  ],\n  \"b\": \"\\u003c\"\n}\n"
        );
    }

    #[tokio::test]
    async fn json_failure_is_500_with_message() {
        let mut bad = HashMap::new();
        bad.insert(vec![1u8], 1);
        let res = json(&bad, Status::Ok);
        assert_eq!(res.status_code(), 500);
        assert!(text(res).await.contains("key must be a string"));
    }

    #[tokio::test]
    async fn stream_is_octet_stream() {
        let res = stream(std::io::Cursor::new(b"raw bytes".to_vec()), Status::Ok);
        assert_eq!(res.header("content-type"), Some("application/octet-stream"));
        assert_eq!(text(res).await, "raw bytes");
    }

    fn pages() -> HashMap<String, RenderFn> {
        let mut pages: HashMap<String, RenderFn> = HashMap::new();
        pages.insert(
            "greet".into(),
            Box::new(|data| Ok(format!("<h1>{}</h1>", data["name"].as_str().unwrap_or("?")))),
        );
        pages.insert("broken".into(), Box::new(|_| Err("unclosed tag".into())));
        pages
    }

    #[tokio::test]
    async fn template_renders_html() {
        let res = template(&pages(), "greet", &serde_json::json!({"name": "Ada"}), Status::Ok)
            .unwrap();
        assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(res.header("content-length"), Some("12"));
        assert_eq!(text(res).await, "<h1>Ada</h1>");
    }

    #[test]
    fn template_errors() {
        let err = template(&pages(), "missing", &(), Status::Ok).unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(ref n) if n == "missing"));

        let err = template(&pages(), "broken", &(), Status::Ok).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }
}
