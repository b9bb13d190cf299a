//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::uri::{PathAndQuery, Uri};
use serde::de::DeserializeOwned;

use crate::body::Body;
use crate::error::Error;
use crate::method::Method;

/// An incoming HTTP request.
///
/// The head is kept as [`http::request::Parts`]; the body stays a stream
/// until a handler asks for it with [`bytes`](Request::bytes) or
/// [`json`](Request::json).
#[derive(Debug)]
pub struct Request {
    pub(crate) head: http::request::Parts,
    pub(crate) body: Body,
    pub(crate) params: HashMap<String, String>,
    pub(crate) route_path: Option<String>,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl Request {
    pub(crate) fn from_hyper<B>(req: http::Request<B>, remote_addr: SocketAddr) -> Self
    where
        B: Into<Body>,
    {
        let (head, body) = req.into_parts();
        Self {
            head,
            body: body.into(),
            params: HashMap::new(),
            route_path: None,
            remote_addr: Some(remote_addr),
        }
    }

    /// The request method, or `None` for a method this crate does not know.
    pub fn method(&self) -> Option<Method> {
        Method::try_from(&self.head.method).ok()
    }

    /// The method exactly as the client sent it.
    pub fn method_str(&self) -> &str {
        self.head.method.as_str()
    }

    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn query(&self) -> Option<&str> { self.head.uri.query() }
    pub fn headers(&self) -> &http::HeaderMap { &self.head.headers }
    pub fn headers_mut(&mut self) -> &mut http::HeaderMap { &mut self.head.headers }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Path and query, as it appeared on the request line.
    pub fn path_and_query(&self) -> &str {
        self.head.uri.path_and_query().map_or("/", PathAndQuery::as_str)
    }

    /// Case-insensitive header lookup. `None` when absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// First value of a query parameter, form-urldecoded.
    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// The path the router matches against.
    ///
    /// Equal to [`path`](Request::path) unless a mounted router stripped its
    /// prefix on the way in.
    pub fn route_path(&self) -> &str {
        self.route_path.as_deref().unwrap_or_else(|| self.head.uri.path())
    }

    /// Rewrites the URI path, keeping the query string.
    ///
    /// The route path follows the new URI path. A path that does not form a
    /// valid URI together with the query leaves the request untouched and
    /// returns `false`.
    pub fn set_path(&mut self, path: &str) -> bool {
        let pq = match self.query() {
            Some(q) => format!("{path}?{q}"),
            None => path.to_owned(),
        };
        let Ok(pq) = PathAndQuery::try_from(pq) else {
            return false;
        };

        let mut parts = self.head.uri.clone().into_parts();
        parts.path_and_query = Some(pq);
        match Uri::from_parts(parts) {
            Ok(uri) => {
                self.head.uri = uri;
                self.route_path = None;
                true
            }
            Err(_) => false,
        }
    }

    pub(crate) fn set_route_path(&mut self, path: String) {
        self.route_path = Some(path);
    }

    pub fn body_mut(&mut self) -> &mut Body { &mut self.body }

    /// Takes the body out, leaving an empty one behind.
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    /// Buffers the whole body.
    pub async fn bytes(&mut self) -> Result<Bytes, Error> {
        self.take_body().collect().await
    }

    /// Buffers the body and decodes it as UTF-8 (lossy).
    pub async fn text(&mut self) -> Result<String, Error> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Buffers the body and deserializes it from JSON.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl From<http::Request<Body>> for Request {
    fn from(req: http::Request<Body>) -> Self {
        let (head, body) = req.into_parts();
        Self { head, body, params: HashMap::new(), route_path: None, remote_addr: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(uri: &str) -> Request {
        http::Request::get(uri).body(Body::empty()).unwrap().into()
    }

    #[test]
    fn query_param_decodes() {
        let req = get("/search?q=hello+world&tag=%20a%20&q=second");
        assert_eq!(req.query_param("q").as_deref(), Some("hello world"));
        assert_eq!(req.query_param("tag").as_deref(), Some(" a "));
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn set_path_keeps_query_and_resets_route_path() {
        let mut req = get("/a//b?x=1");
        req.set_route_path("/b".to_owned());
        assert!(req.set_path("/a/b"));
        assert_eq!(req.path(), "/a/b");
        assert_eq!(req.query(), Some("x=1"));
        assert_eq!(req.route_path(), "/a/b");
    }

    #[test]
    fn set_path_rejects_invalid_path() {
        let mut req = get("/ok");
        assert!(!req.set_path("/bad path"));
        assert_eq!(req.path(), "/ok");
    }

    #[tokio::test]
    async fn json_body() {
        let mut req: Request = http::Request::post("/")
            .body(Body::from(r#"{"n":3}"#))
            .unwrap()
            .into();
        let v: serde_json::Value = req.json().await.unwrap();
        assert_eq!(v["n"], 3);
    }
}
