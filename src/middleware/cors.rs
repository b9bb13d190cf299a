use crate::handler::BoxFuture;
use crate::request::Request;
use crate::set::CORS_ANY;

use super::{Middleware, Next};

/// Allows any origin, method and header.
///
/// Headers the handler already set are left alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct CorsAny;

impl Middleware for CorsAny {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let fut = next.run(req);
        Box::pin(async move {
            let mut res = fut.await;
            let headers = res.headers_mut();
            for (name, value) in CORS_ANY {
                headers.entry(name).or_insert(value);
            }
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::test_support::{get, run};
    use crate::middleware::from_fn;
    use crate::response::Response;

    #[tokio::test]
    async fn sets_permissive_headers() {
        let res = run(CorsAny, get("/")).await;
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        assert_eq!(res.header("access-control-allow-credentials"), Some("true"));
        assert_eq!(res.header("access-control-allow-headers"), Some("*"));
        assert_eq!(
            res.header("access-control-allow-methods"),
            Some("GET, POST, PUT, CONNECT, DELETE, HEAD, PATCH, OPTIONS, TRACE")
        );
    }

    #[tokio::test]
    async fn keeps_handler_origin() {
        let handler = from_fn(|_req: Request, _next: Next| async {
            Response::builder()
                .header("access-control-allow-origin", "https://app.example")
                .no_body()
        });
        let chain = crate::middleware::wrap(
            std::sync::Arc::new(CorsAny),
            crate::middleware::wrap(
                std::sync::Arc::new(handler),
                crate::middleware::test_support::echo(),
            ),
        );
        let res = chain.call(get("/")).await;
        assert_eq!(res.header("access-control-allow-origin"), Some("https://app.example"));
        assert_eq!(res.header("access-control-allow-headers"), Some("*"));
    }
}
