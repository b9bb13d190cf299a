use http::HeaderName;

use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

use super::{Middleware, Next, respond_now};

/// Rejects requests whose path contains any of the given fragments.
///
/// ```rust
/// use tsu_ext::middleware::DisallowPaths;
/// use tsu_ext::Status;
///
/// let mw = DisallowPaths::new([".git", "wp-admin"], Status::NotFound);
/// ```
#[derive(Clone, Debug)]
pub struct DisallowPaths {
    fragments: Vec<String>,
    status: Status,
}

impl DisallowPaths {
    pub fn new<I, S>(fragments: I, status: Status) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { fragments: fragments.into_iter().map(Into::into).collect(), status }
    }
}

impl Middleware for DisallowPaths {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let path = req.path();
        if self.fragments.iter().any(|f| path.contains(f.as_str())) {
            return respond_now(Response::error(self.status));
        }
        next.run(req)
    }
}

/// Rejects requests carrying any of the given headers with a non-empty value.
#[derive(Clone, Debug)]
pub struct DisallowHeaders {
    headers: Vec<HeaderName>,
    status: Status,
}

impl DisallowHeaders {
    /// # Panics
    ///
    /// Panics if a name is not a valid header name.
    pub fn new<I, S>(headers: I, status: Status) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let headers = headers
            .into_iter()
            .map(|h| {
                let h = h.as_ref();
                HeaderName::try_from(h).unwrap_or_else(|e| panic!("invalid header `{h}`: {e}"))
            })
            .collect();
        Self { headers, status }
    }
}

impl Middleware for DisallowHeaders {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let present = self.headers.iter().any(|name| {
            req.headers().get(name).is_some_and(|v| !v.is_empty())
        });
        if present {
            return respond_now(Response::error(self.status));
        }
        next.run(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::test_support::{body_text, get, run};

    #[tokio::test]
    async fn blocks_path_fragment() {
        let mw = DisallowPaths::new([".env", "/admin"], Status::Forbidden);
        let res = run(mw.clone(), get("/static/.env")).await;
        assert_eq!(res.status_code(), 403);
        assert_eq!(body_text(res).await, "Forbidden\n");

        let res = run(mw, get("/static/app.js")).await;
        assert_eq!(res.status_code(), 200);
    }

    #[tokio::test]
    async fn blocks_present_header() {
        let mw = DisallowHeaders::new(["X-Forwarded-Host"], Status::BadRequest);

        let mut req = get("/");
        req.headers_mut().insert("x-forwarded-host", "evil".parse().unwrap());
        assert_eq!(run(mw.clone(), req).await.status_code(), 400);

        let mut req = get("/");
        req.headers_mut().insert("x-forwarded-host", "".parse().unwrap());
        assert_eq!(run(mw.clone(), req).await.status_code(), 200);

        assert_eq!(run(mw, get("/")).await.status_code(), 200);
    }
}
