use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;
use crate::util::{path_ext, sanitize_uri};

use super::{Middleware, Next, respond_now};

/// Redirects `301` from `/path` to `/path/`, keeping the query string.
///
/// Paths whose last element has an extension (`/app.js`) are left alone.
/// Add it before [`CleanPath`](super::CleanPath) or
/// [`PrefixRemove`](super::PrefixRemove), which strip the slash again.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddTrailingSlash;

impl Middleware for AddTrailingSlash {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let path = req.path();
        if path.ends_with('/') || !path_ext(path).is_empty() {
            return next.run(req);
        }

        let location = match req.query() {
            Some(q) if !q.is_empty() => format!("{path}/?{q}"),
            _ => format!("{path}/"),
        };
        respond_now(Response::redirect(&sanitize_uri(&location), Status::MovedPermanently))
    }
}
