//! # tsu-ext
//!
//! HTTP server helpers layered over a radix-tree router.
//!
//! - Routing: per-method `matchit` trees, mounts, multi-method and
//!   multi-pattern registration, trailing-slash route synthesis
//! - Middleware: access log, CORS, path cleaning, prefix removal,
//!   body-size limits, path and header deny lists, canned replies
//! - Responders: JSON (HTML-safe), text, HTML, streams, templates
//! - Static files with optional directory listings
//! - Graceful shutdown on SIGTERM / Ctrl-C over hyper (HTTP/1.1 and HTTP/2)
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use serde::Serialize;
//! use tsu_ext::middleware::{BodyLimit, CleanPath, CorsAny, Logger};
//! use tsu_ext::{respond, Request, Response, Router, Server, Status};
//!
//! #[derive(Serialize)]
//! struct User { id: String }
//!
//! #[tokio::main]
//! async fn main() {
//!     let api = Router::new()
//!         .get("/users/{id}", get_user)
//!         .post("/users", create_user);
//!
//!     let app = Router::new()
//!         .layer(Logger::new())
//!         .layer(CleanPath)
//!         .layer(CorsAny)
//!         .layer(BodyLimit::new(1 << 20))
//!         .mount("/api", api)
//!         .file_server("/static", "./public", false)
//!         .register_trailing();
//!
//!     Server::from_env("3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = tsu_ext::util::trimmed_path_param(&req, "id");
//!     respond::json(&User { id }, Status::Ok)
//! }
//!
//! async fn create_user(mut req: Request) -> Response {
//!     match req.text().await {
//!         Ok(body) if !body.is_empty() => respond::plain_text(body, Status::Created),
//!         Ok(_) => Response::error(Status::BadRequest),
//!         Err(e) => Response::error(e.status()),
//!     }
//! }
//! ```

mod body;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod files;
pub mod middleware;
pub mod mime;
pub mod respond;
pub mod set;
pub mod util;

pub use body::Body;
pub use error::{BoxError, Error};
pub use handler::Handler;
pub use method::{Method, UnknownMethod};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::{Route, Router, Service, method_not_allowed_status_text};
pub use server::Server;
pub use status::Status;
