use crate::handler::BoxFuture;
use crate::request::Request;
use crate::util::clean_path;

use super::{Middleware, Next};

/// Cleans the request path before routing.
///
/// `//a/./b/../c/` becomes `/a/c`. A URL embedded in the path keeps its
/// scheme intact: `/proxy/https://x.io` is not collapsed to `https:/x.io`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CleanPath;

impl Middleware for CleanPath {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let cleaned = clean_path(req.path()).replacen("https:/", "https://", 1);
        if cleaned != req.path() && !req.set_path(&cleaned) {
            tracing::debug!(path = %req.path(), "cleaned path is not a valid URI, leaving it as is");
        }
        next.run(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::test_support::{get, run};

    #[tokio::test]
    async fn collapses_slashes_and_dots() {
        let res = run(CleanPath, get("//api//v1/./users/../items/?x=1")).await;
        assert_eq!(res.header("x-seen-path"), Some("/api/v1/items?x=1"));
    }

    #[tokio::test]
    async fn keeps_embedded_https_scheme() {
        let res = run(CleanPath, get("/fetch/https://example.com/a")).await;
        assert_eq!(res.header("x-seen-path"), Some("/fetch/https://example.com/a"));
    }

    #[tokio::test]
    async fn root_stays_root() {
        let res = run(CleanPath, get("/")).await;
        assert_eq!(res.header("x-seen-path"), Some("/"));
    }
}
