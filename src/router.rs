//! Radix-tree request router.
//!
//! One `matchit` tree per HTTP method, O(path-length) lookup. On top of the
//! trees the router keeps a route table in registration order, which is what
//! [`Router::register_trailing`] walks to synthesize `/path/` variants and
//! what [`Router::routes`] exposes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, sealed};
use crate::method::Method;
use crate::middleware::{self, BoxedMiddleware, Middleware, respond_now};
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;
use crate::util::{clean_path, percent_decode};

const MOUNT_PARAM: &str = "tsu_mount_rest";

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve)
/// or turn it into a [`Service`]. Every builder method returns `self` so
/// registrations chain naturally.
///
/// # Panics
///
/// Registration methods panic on a pattern `matchit` rejects (bad syntax,
/// or a conflict with an earlier route). These are programming errors and
/// surface at startup.
pub struct Router {
    trees: HashMap<Method, MatchitRouter<BoxedHandler>>,
    registered: HashSet<(Method, String)>,
    routes: Vec<Route>,
    layers: Vec<BoxedMiddleware>,
    not_found: Option<BoxedHandler>,
    method_not_allowed: Option<BoxedHandler>,
}

/// One entry of the route table: a pattern and the handlers registered on it.
pub struct Route {
    pattern: String,
    handlers: Vec<(Method, BoxedHandler)>,
    sub_router: Option<Arc<Router>>,
}

impl Route {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Methods with a handler on this pattern, in registration order.
    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        self.handlers.iter().map(|(m, _)| *m)
    }

    /// The router mounted here, if this entry is a mount point.
    pub fn sub_router(&self) -> Option<&Router> {
        self.sub_router.as_deref()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            trees: HashMap::new(),
            registered: HashSet::new(),
            routes: Vec::new(),
            layers: Vec::new(),
            not_found: None,
            method_not_allowed: None,
        }
    }

    /// Register a handler for a method + pattern pair.
    ///
    /// Path parameters use `{name}` syntax, catch-alls `{*name}`:
    ///
    /// ```rust,no_run
    /// # use tsu_ext::{Method, Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// # async fn delete_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::Delete, "/users/{id}", delete_user)
    ///     .on(Method::Get,    "/users/{id}", get_user)
    ///     .on(Method::Post,   "/users",      create_user);
    /// ```
    pub fn on(self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.add(method, pattern, handler.into_boxed_handler())
    }

    pub fn get(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, pattern, handler)
    }

    pub fn post(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, pattern, handler)
    }

    pub fn put(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, pattern, handler)
    }

    pub fn patch(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Patch, pattern, handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, pattern, handler)
    }

    /// Registers `handler` on `pattern` for every method in `methods`.
    ///
    /// # Panics
    ///
    /// Panics if a method is not one of the nine RFC 9110 methods.
    pub fn match_methods(self, methods: &[&str], pattern: &str, handler: impl Handler) -> Self {
        self.match_methods_patterns(methods, &[pattern], handler)
    }

    /// Registers `handler` for `method` on every pattern in `patterns`.
    ///
    /// # Panics
    ///
    /// Panics if `method` is not one of the nine RFC 9110 methods.
    pub fn match_patterns(self, method: &str, patterns: &[&str], handler: impl Handler) -> Self {
        self.match_methods_patterns(&[method], patterns, handler)
    }

    /// Registers `handler` for every method on every pattern.
    ///
    /// ```rust,no_run
    /// # use tsu_ext::{Request, Response, Router};
    /// # async fn items(_: Request) -> Response { Response::text("") }
    /// Router::new().match_methods_patterns(&["GET", "HEAD"], &["/items", "/things"], items);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if a method is not one of the nine RFC 9110 methods.
    pub fn match_methods_patterns(
        mut self,
        methods: &[&str],
        patterns: &[&str],
        handler: impl Handler,
    ) -> Self {
        let methods: Vec<Method> = methods.iter().map(|m| standard_method(m)).collect();
        let handler = handler.into_boxed_handler();
        for pattern in patterns {
            for &method in &methods {
                self = self.add(method, pattern, Arc::clone(&handler));
            }
        }
        self
    }

    /// Mounts `router` under `prefix`.
    ///
    /// The sub-router, with its own middleware, receives `prefix`, `prefix/`
    /// and everything below, and routes against the remainder of the path:
    /// mounted at `/api`, a request for `/api/users` matches its `/users`
    /// route. Parameters captured in `prefix` stay visible to its handlers.
    pub fn mount(mut self, prefix: &str, router: Router) -> Self {
        let prefix = prefix.trim_end_matches('/');
        let sub = Arc::new(router);
        let handler: BoxedHandler = Arc::new(Mount { service: service_of(&sub) });

        let catch_all = format!("{prefix}/{{*{MOUNT_PARAM}}}");
        let mut patterns = vec![format!("{prefix}/"), catch_all.clone()];
        if !prefix.is_empty() {
            patterns.push(prefix.to_owned());
        }

        for &method in Method::ALL {
            for pattern in &patterns {
                self.insert_tree(method, pattern, Arc::clone(&handler))
                    .unwrap_or_else(|e| panic!("invalid mount `{pattern}`: {e}"));
            }
        }
        self.routes.push(Route {
            pattern: catch_all,
            handlers: Method::ALL.iter().map(|&m| (m, Arc::clone(&handler))).collect(),
            sub_router: Some(sub),
        });
        self
    }

    /// Adds router-level middleware. It runs before routing, in the order
    /// added: the first layer is the outermost.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    /// Handler for requests no route matches. Defaults to a plain-text 404.
    pub fn not_found(mut self, handler: impl Handler) -> Self {
        self.not_found = Some(handler.into_boxed_handler());
        self
    }

    /// Handler for paths that match under other methods only. Defaults to an
    /// empty 405 with an `allow` header.
    pub fn method_not_allowed(mut self, handler: impl Handler) -> Self {
        self.method_not_allowed = Some(handler.into_boxed_handler());
        self
    }

    /// The route table, in registration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Registers `pattern/` for every route that has no trailing-slash form.
    ///
    /// Routes already ending in `/` or a catch-all are skipped, as are
    /// routes whose `/` or catch-all sibling exists at the same level.
    /// Mounted routers are descended: their routes are registered here,
    /// under the mount prefix and behind the mounted router's middleware.
    /// An existing method + pattern is never registered twice; a synthesized
    /// pattern that conflicts with the tree is skipped.
    ///
    /// Call it last, after every route is in place.
    ///
    /// # Panics
    ///
    /// Panics if no routes are registered.
    pub fn register_trailing(mut self) -> Self {
        assert!(!self.routes.is_empty(), "no routes registered on router");

        let mut additions = Vec::new();
        collect_trailing(&self.routes, "", &mut additions);

        for (method, pattern, handler) in additions {
            if self.registered.contains(&(method, pattern.clone())) {
                continue;
            }
            match self.insert_tree(method, &pattern, Arc::clone(&handler)) {
                Ok(()) => self.record(method, &pattern, handler),
                Err(e) => tracing::debug!(%method, pattern, error = %e, "skipping trailing-slash route"),
            }
        }
        self
    }

    /// Freezes the router into a cloneable request handler.
    pub fn into_service(self) -> Service {
        Service { handler: service_of(&Arc::new(self)) }
    }

    pub(crate) fn add(mut self, method: Method, pattern: &str, handler: BoxedHandler) -> Self {
        self.insert_tree(method, pattern, Arc::clone(&handler))
            .unwrap_or_else(|e| panic!("invalid route `{method} {pattern}`: {e}"));
        self.record(method, pattern, handler);
        self
    }

    fn insert_tree(
        &mut self,
        method: Method,
        pattern: &str,
        handler: BoxedHandler,
    ) -> Result<(), matchit::InsertError> {
        self.trees.entry(method).or_default().insert(pattern, handler)?;
        self.registered.insert((method, pattern.to_owned()));
        Ok(())
    }

    fn record(&mut self, method: Method, pattern: &str, handler: BoxedHandler) {
        let existing = self
            .routes
            .iter_mut()
            .find(|r| r.sub_router.is_none() && r.pattern == pattern);
        match existing {
            Some(route) => route.handlers.push((method, handler)),
            None => self.routes.push(Route {
                pattern: pattern.to_owned(),
                handlers: vec![(method, handler)],
                sub_router: None,
            }),
        }
    }

    fn wrap_layers(&self, handler: BoxedHandler) -> BoxedHandler {
        self.layers
            .iter()
            .rev()
            .fold(handler, |inner, mw| middleware::wrap(Arc::clone(mw), inner))
    }

    fn find(&self, method: Option<Method>, path: &str) -> Lookup {
        if let Some(found) = method
            .and_then(|m| self.trees.get(&m))
            .and_then(|tree| tree.at(path).ok())
        {
            let params = found
                .params
                .iter()
                .map(|(k, v)| {
                    // The mount remainder is routed again and decoded there.
                    let v = if k == MOUNT_PARAM { v.to_owned() } else { percent_decode(v) };
                    (k.to_owned(), v)
                })
                .collect();
            return Lookup::Found(Arc::clone(found.value), params);
        }

        let allowed: Vec<Method> = Method::ALL
            .iter()
            .copied()
            .filter(|m| Some(*m) != method)
            .filter(|m| self.trees.get(m).is_some_and(|t| t.at(path).is_ok()))
            .collect();
        if allowed.is_empty() { Lookup::NotFound } else { Lookup::MethodNotAllowed(allowed) }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

/// A frozen router, ready to answer requests.
///
/// Cheap to clone; every clone shares the same route table.
#[derive(Clone)]
pub struct Service {
    handler: BoxedHandler,
}

impl Service {
    pub fn call(&self, req: Request) -> BoxFuture {
        self.handler.call(req)
    }
}

impl sealed::Sealed for Service {}

impl Handler for Service {
    fn into_boxed_handler(self) -> BoxedHandler {
        self.handler
    }
}

/// `405` whose body is the reason phrase, for use with
/// [`Router::method_not_allowed`].
pub async fn method_not_allowed_status_text(_req: Request) -> Response {
    Response::error(Status::MethodNotAllowed)
}

enum Lookup {
    Found(BoxedHandler, HashMap<String, String>),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

fn service_of(router: &Arc<Router>) -> BoxedHandler {
    router.wrap_layers(Arc::new(Endpoint(Arc::clone(router))))
}

fn standard_method(name: &str) -> Method {
    name.parse::<Method>()
        .ok()
        .filter(|m| m.is_standard())
        .unwrap_or_else(|| panic!("method: {name} is not a valid method"))
}

/// Routing step: the innermost handler of a router's middleware chain.
struct Endpoint(Arc<Router>);

impl ErasedHandler for Endpoint {
    fn call(&self, mut req: Request) -> BoxFuture {
        let router = &self.0;
        match router.find(req.method(), req.route_path()) {
            Lookup::Found(handler, params) => {
                req.params.extend(params);
                handler.call(req)
            }
            Lookup::MethodNotAllowed(allowed) => match &router.method_not_allowed {
                Some(handler) => handler.call(req),
                None => {
                    let allow: Vec<&str> = allowed.iter().map(|m| m.as_str()).collect();
                    respond_now(
                        Response::builder()
                            .status(Status::MethodNotAllowed)
                            .header("allow", &allow.join(", "))
                            .no_body(),
                    )
                }
            },
            Lookup::NotFound => match &router.not_found {
                Some(handler) => handler.call(req),
                None => respond_now(Response::error_with(Status::NotFound, "404 page not found")),
            },
        }
    }
}

/// Hands the request to a mounted router with the prefix stripped from the route path.
struct Mount {
    service: BoxedHandler,
}

impl ErasedHandler for Mount {
    fn call(&self, mut req: Request) -> BoxFuture {
        let rest = req.params.remove(MOUNT_PARAM).unwrap_or_default();
        req.set_route_path(format!("/{rest}"));
        self.service.call(req)
    }
}

fn is_catch_all(pattern: &str) -> bool {
    pattern.rsplit('/').next().is_some_and(|seg| seg.starts_with("{*"))
}

/// `path.Join`-style: concatenates with a slash and cleans.
fn join_paths(prefix: &str, pattern: &str) -> String {
    if prefix.is_empty() {
        clean_path(pattern)
    } else {
        clean_path(&format!("{prefix}/{pattern}"))
    }
}

fn collect_trailing(routes: &[Route], prefix: &str, out: &mut Vec<(Method, String, BoxedHandler)>) {
    let patterns: HashSet<&str> = routes.iter().map(|r| r.pattern.as_str()).collect();
    let has_sibling = |p: &str| {
        patterns.iter().any(|q| {
            q.strip_prefix(p).is_some_and(|rest| rest == "/" || (rest.starts_with("/{*") && is_catch_all(q)))
        })
    };

    for route in routes {
        if let Some(sub) = &route.sub_router {
            let mount_prefix = route.pattern.rsplit_once('/').map_or("", |(head, _)| head);
            let start = out.len();
            collect_trailing(&sub.routes, &join_paths(prefix, mount_prefix), out);
            for entry in &mut out[start..] {
                entry.2 = sub.wrap_layers(Arc::clone(&entry.2));
            }
        }

        let p = route.pattern.as_str();
        if p.ends_with('/') || is_catch_all(p) || has_sibling(p) {
            continue;
        }

        let full = join_paths(prefix, p);
        for (method, handler) in &route.handlers {
            out.push((*method, format!("{full}/"), Arc::clone(handler)));
        }
    }
}
