use crate::handler::BoxFuture;
use crate::request::Request;

use super::{Middleware, Next};

/// Removes a path prefix before routing.
///
/// The first `/<prefix>` in the path becomes `/`, then the first `//`
/// collapses. With prefix `api`, `/api/users` is routed as `/users`.
#[derive(Clone, Debug)]
pub struct PrefixRemove {
    needle: String,
}

impl PrefixRemove {
    /// `prefix` is given without the leading slash, e.g. `"api"` or `"v1/api"`.
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self { needle: format!("/{}", prefix.as_ref()) }
    }
}

impl Middleware for PrefixRemove {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let stripped = req.path().replacen(&self.needle, "/", 1).replacen("//", "/", 1);
        if stripped != req.path() && !req.set_path(&stripped) {
            tracing::debug!(path = %req.path(), "stripped path is not a valid URI, leaving it as is");
        }
        next.run(req)
    }
}
