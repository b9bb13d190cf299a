use std::collections::HashMap;

use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;
use crate::util::clean_path;

use super::{Middleware, Next, respond_now};

/// Answers fixed paths with a bare status, without reaching the router.
///
/// Both the configured paths and the incoming path are cleaned before
/// comparison, so `/robots.txt/` and `//robots.txt` hit the same entry.
///
/// ```rust
/// use tsu_ext::middleware::AutoReply;
/// use tsu_ext::Status;
///
/// let mw = AutoReply::new(["/favicon.ico", "/robots.txt"], Status::NoContent);
/// let mw = AutoReply::from_map([("/healthz", Status::Ok), ("/old", Status::Gone)]);
/// ```
#[derive(Clone, Debug)]
pub struct AutoReply {
    replies: HashMap<String, Status>,
}

impl AutoReply {
    /// Every path in `paths` gets `status`.
    pub fn new<I, S>(paths: I, status: Status) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_map(paths.into_iter().map(|p| (p, status)))
    }

    /// Each path gets its own status.
    pub fn from_map<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = (S, Status)>,
        S: AsRef<str>,
    {
        let replies = replies
            .into_iter()
            .map(|(p, status)| (clean_path(p.as_ref()), status))
            .collect();
        Self { replies }
    }
}

impl Middleware for AutoReply {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        match self.replies.get(&clean_path(req.path())) {
            Some(&status) => respond_now(Response::status(status)),
            None => next.run(req),
        }
    }
}
