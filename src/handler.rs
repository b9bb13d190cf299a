//! Route handlers and their type-erased form.
//!
//! Whatever answers a request (a user's `async fn`, a middleware layer
//! wrapping the rest of its chain, a mounted router, a frozen [`Service`])
//! is stored the same way: an `Arc` of [`ErasedHandler`]. One chain hop
//! costs a virtual call and, for middleware, one `Arc` clone.
//!
//! [`Service`]: crate::Service

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A boxed future resolving to a [`Response`]; what every handler and
/// [`Middleware::call`](crate::middleware::Middleware::call) returns.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Object-safe request handler.
#[doc(hidden)]
pub trait ErasedHandler: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler>;

/// Anything that can be registered on a route or as a fallback.
///
/// Satisfied by `async fn(Request) -> impl IntoResponse` (and closures of
/// that shape) and by a frozen [`Service`](crate::Service), so one router
/// can serve as another's fallback. Sealed.
pub trait Handler: sealed::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

pub(crate) mod sealed {
    pub trait Sealed {}
}

impl<F, Fut, R> sealed::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(AsyncFn(self))
    }
}

struct AsyncFn<F>(F);

impl<F, Fut, R> ErasedHandler for AsyncFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let pending = (self.0)(req);
        Box::pin(async move { pending.await.into_response() })
    }
}
