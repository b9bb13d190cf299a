//! Middleware layer.
//!
//! A middleware sees every request before the next handler in the chain and
//! every response after it. Router-level middleware added with
//! [`Router::layer`](crate::Router::layer) runs **before routing**, so the
//! path rewriters here ([`CleanPath`], [`PrefixRemove`], [`AddTrailingSlash`])
//! change which route matches.
//!
//! ```rust,no_run
//! use tsu_ext::middleware::{BodyLimit, CleanPath, CorsAny, Logger};
//! use tsu_ext::{Request, Response, Router};
//!
//! # async fn upload(_: Request) -> Response { Response::text("") }
//! let app = Router::new()
//!     .layer(Logger::new())
//!     .layer(CleanPath)
//!     .layer(CorsAny)
//!     .layer(BodyLimit::new(1 << 20))
//!     .post("/upload", upload);
//! ```
//!
//! Ad-hoc middleware is an `async fn` taking the request and [`Next`]:
//!
//! ```rust
//! use tsu_ext::middleware::{from_fn, Next};
//! use tsu_ext::{Request, Response, Router};
//!
//! async fn server_header(req: Request, next: Next) -> Response {
//!     let mut res = next.run(req).await;
//!     res.headers_mut().insert("server", "tsu".parse().unwrap());
//!     res
//! }
//!
//! let app = Router::new().layer(from_fn(server_header));
//! ```

mod auto_reply;
mod body_limit;
mod clean_path;
mod cors;
mod disallow;
mod logger;
mod prefix_remove;
mod trailing_slash;

use std::future::Future;
use std::sync::Arc;

pub use auto_reply::AutoReply;
pub use body_limit::{BodyLimit, LimitedBody};
pub use clean_path::CleanPath;
pub use cors::CorsAny;
pub use disallow::{DisallowHeaders, DisallowPaths};
pub use logger::Logger;
pub use prefix_remove::PrefixRemove;
pub use trailing_slash::AddTrailingSlash;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// Wraps the rest of a handler chain.
pub trait Middleware: Send + Sync + 'static {
    /// Handles `req`, usually by calling `next.run(req)` somewhere inside.
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

/// The remainder of the chain after the current middleware.
pub struct Next {
    handler: BoxedHandler,
}

impl Next {
    pub(crate) fn new(handler: BoxedHandler) -> Self {
        Self { handler }
    }

    /// Runs the rest of the chain.
    pub fn run(self, req: Request) -> BoxFuture {
        self.handler.call(req)
    }
}

/// Turns an `async fn(Request, Next) -> impl IntoResponse` into a [`Middleware`].
pub fn from_fn<F, Fut, R>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    FromFn(f)
}

/// Middleware returned by [`from_fn`].
pub struct FromFn<F>(F);

impl<F, Fut, R> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let fut = (self.0)(req, next);
        Box::pin(async move { fut.await.into_response() })
    }
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// Wraps `inner` so that `middleware` runs first.
pub(crate) fn wrap(middleware: BoxedMiddleware, inner: BoxedHandler) -> BoxedHandler {
    Arc::new(Layered { middleware, next: inner })
}

struct Layered {
    middleware: BoxedMiddleware,
    next: BoxedHandler,
}

impl ErasedHandler for Layered {
    fn call(&self, req: Request) -> BoxFuture {
        self.middleware.call(req, Next::new(Arc::clone(&self.next)))
    }
}

/// Short-circuits with a ready response.
pub(crate) fn respond_now(res: Response) -> BoxFuture {
    Box::pin(std::future::ready(res))
}


#[cfg(test)]
mod tests {
    use super::test_support::{body_text, get, run};
    use super::*;

    #[tokio::test]
    async fn from_fn_wraps_next() {
        let mw = from_fn(|req: Request, next: Next| async move {
            let mut res = next.run(req).await;
            res.headers_mut().insert("x-wrapped", "yes".parse().unwrap());
            res
        });
        let res = run(mw, get("/hi?a=1")).await;
        assert_eq!(res.header("x-wrapped"), Some("yes"));
        assert_eq!(res.header("x-seen-path"), Some("/hi?a=1"));
    }

    #[tokio::test]
    async fn layered_runs_outer_first() {
        let inner = from_fn(|req: Request, next: Next| async move {
            let mut res = next.run(req).await;
            res.headers_mut().append("x-order", "inner".parse().unwrap());
            res
        });
        let outer = from_fn(|req: Request, next: Next| async move {
            let mut res = next.run(req).await;
            res.headers_mut().append("x-order", "outer".parse().unwrap());
            res
        });
        let chain = wrap(Arc::new(outer), wrap(Arc::new(inner), test_support::echo()));
        let res = chain.call(get("/")).await;
        let order: Vec<_> = res.headers().get_all("x-order").iter().collect();
        assert_eq!(order, ["inner", "outer"]);
        assert_eq!(body_text(res).await, "");
    }
}
