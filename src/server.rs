//! HTTP server and graceful shutdown.
//!
//! On SIGTERM or Ctrl-C (or the future given to
//! [`Server::serve_with_shutdown`]) the accept loop stops at once, every
//! in-flight connection is allowed to finish, and `serve` returns. Give the
//! process manager a grace period longer than your slowest request.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::body::Body;
use crate::error::Error;
use crate::request::Request;
use crate::router::{Router, Service};
use crate::util::env_port_or;

enum Bind {
    Addr(String),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    bind: Bind,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. An unparsable address is reported by `serve`.
    ///
    /// ```rust,no_run
    /// use tsu_ext::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        Self { bind: Bind::Addr(addr.to_owned()) }
    }

    /// Binds all interfaces on `$PORT`, or on `default_port` when unset.
    pub fn from_env(default_port: &str) -> Self {
        Self::bind(&format!("0.0.0.0{}", env_port_or(default_port)))
    }

    /// Serves on an already-bound listener.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { bind: Bind::Listener(listener) }
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), stopping when `signal` resolves instead
    /// of on process signals.
    pub async fn serve_with_shutdown<F>(self, router: Router, signal: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let listener = match self.bind {
            Bind::Listener(listener) => listener,
            Bind::Addr(addr) => {
                let addr: SocketAddr = addr.parse().map_err(|e| {
                    Error::Io(io::Error::new(io::ErrorKind::InvalidInput, format!("{addr}: {e}")))
                })?;
                TcpListener::bind(addr).await?
            }
        };
        let local = listener.local_addr()?;

        // One frozen service shared by every connection task.
        let service = router.into_service();

        info!(addr = %local, "tsu-ext listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = signal;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM stops accepting at once,
                // even if more connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let service = service.clone();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| dispatch(service.clone(), req, remote_addr));

                        // HTTP/1.1 and HTTP/2, whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished tasks so the JoinSet does not grow without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("tsu-ext stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Every failure becomes a response, so hyper never sees an error.
async fn dispatch(
    service: Service,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Body>, Infallible> {
    let req = Request::from_hyper(req.map(Body::new), remote_addr);
    Ok(service.call(req).await.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C only on Windows).
///
/// A handler that cannot be installed never fires; the other one still does.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use super::*;
    use crate::middleware::{CorsAny, Logger};

    async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn serves_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .layer(Logger::new())
            .layer(CorsAny)
            .get("/hello/{name}", |req: Request| async move {
                format!("hello {}", req.param("name").unwrap_or("?"))
            });

        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(Server::from_listener(listener).serve_with_shutdown(app, async {
            stopped.await.ok();
        }));

        let res = roundtrip(addr, "GET /hello/ada HTTP/1.1\r\nhost: x\r\nconnection: close\r\n\r\n").await;
        assert!(res.starts_with("HTTP/1.1 200 OK\r\n"), "{res}");
        assert!(res.contains("access-control-allow-origin: *"), "{res}");
        assert!(res.ends_with("hello ada"), "{res}");

        let res = roundtrip(addr, "DELETE /hello/ada HTTP/1.1\r\nhost: x\r\nconnection: close\r\n\r\n").await;
        assert!(res.starts_with("HTTP/1.1 405"), "{res}");

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bad_address_is_an_error() {
        let err = Server::bind("not an address")
            .serve_with_shutdown(Router::new(), async {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::InvalidInput));
    }
}
