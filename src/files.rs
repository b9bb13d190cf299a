//! Static file serving.
//!
//! ```rust,no_run
//! use tsu_ext::Router;
//!
//! let app = Router::new()
//!     .file_server("/static", "./public", false)
//!     .file_server("/downloads/", "/srv/downloads", true);
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::warn;

use crate::body::Body;
use crate::method::Method;
use crate::mime;
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::router::Router;
use crate::set;
use crate::status::Status;
use crate::util::{clean_path, sanitize_uri, sub_dir};

const FILE_PARAM: &str = "filepath";
const INDEX: &str = "index.html";

impl Router {
    /// Serves the files below `root` at `path`.
    ///
    /// `path` without a trailing slash redirects to its slashed form.
    /// Directory listings are rendered only when `browse` is set; otherwise
    /// a directory without an `index.html` is a 404.
    ///
    /// # Panics
    ///
    /// Panics if `path` contains route parameters (`{`, `}` or `*`).
    pub fn file_server(self, path: &str, root: impl Into<PathBuf>, browse: bool) -> Self {
        file_server(self, path, root, browse)
    }

    /// Like [`file_server`](Router::file_server), rooted at `root/dir`.
    ///
    /// # Panics
    ///
    /// Panics if `dir` is not a valid relative path (see [`sub_dir`]).
    pub fn file_server_sub(self, path: &str, root: impl AsRef<Path>, dir: &str, browse: bool) -> Self {
        file_server_sub(self, path, root, dir, browse)
    }
}

/// Registers a static file server on `router`. See [`Router::file_server`].
pub fn file_server(router: Router, path: &str, root: impl Into<PathBuf>, browse: bool) -> Router {
    assert!(
        !path.contains(['{', '}', '*']),
        "file server does not permit any URL parameters"
    );

    let mut router = router;
    let mut path = path.to_owned();
    if path != "/" && !path.ends_with('/') {
        let target = format!("{path}/");
        router = router.get(&path, move |_req: Request| {
            let target = target.clone();
            async move { Response::redirect(&target, Status::MovedPermanently) }
        });
        path.push('/');
    }

    let files = Arc::new(Files { root: root.into(), browse });
    for method in [Method::Get, Method::Head] {
        for pattern in [path.clone(), format!("{path}{{*{FILE_PARAM}}}")] {
            let files = Arc::clone(&files);
            router = router.on(method, &pattern, move |req: Request| {
                let files = Arc::clone(&files);
                async move { files.serve(req).await }
            });
        }
    }
    router
}

/// Registers a static file server rooted at `root/dir`. See [`Router::file_server_sub`].
pub fn file_server_sub(
    router: Router,
    path: &str,
    root: impl AsRef<Path>,
    dir: &str,
    browse: bool,
) -> Router {
    let root = sub_dir(root, dir).unwrap_or_else(|e| panic!("{e}"));
    file_server(router, path, root, browse)
}

struct Files {
    root: PathBuf,
    browse: bool,
}

impl Files {
    async fn serve(&self, req: Request) -> Response {
        let name = clean_path(&format!("/{}", req.param(FILE_PARAM).unwrap_or("")));
        let head = req.method() == Some(Method::Head);
        let url_path = req.path().to_owned();

        if url_path.ends_with("/index.html") {
            return local_redirect(&req, url_path.trim_end_matches(INDEX));
        }

        let full = self.root.join(name.trim_start_matches('/'));
        let meta = match fs::metadata(&full).await {
            Ok(meta) => meta,
            Err(e) => return io_error(&full, &e),
        };

        if meta.is_dir() {
            if !url_path.ends_with('/') {
                return local_redirect(&req, &format!("{url_path}/"));
            }
            let index = full.join(INDEX);
            return match fs::metadata(&index).await {
                Ok(m) if m.is_file() => send_file(head, &index, m.len()).await,
                _ if self.browse => list_dir(head, &full).await,
                _ => not_found(),
            };
        }

        if url_path.ends_with('/') {
            return local_redirect(&req, url_path.trim_end_matches('/'));
        }
        send_file(head, &full, meta.len()).await
    }
}

async fn send_file(head: bool, path: &Path, len: u64) -> Response {
    let body = if head {
        Body::empty()
    } else {
        match fs::File::open(path).await {
            Ok(file) => Body::from_reader(file),
            Err(e) => return io_error(path, &e),
        }
    };
    let mut res = Response::builder().body(mime::for_path(path), body);
    set::content_length(&mut res, len);
    res
}

async fn list_dir(head: bool, dir: &Path) -> Response {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => return io_error(dir, &e),
    };

    let mut names = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                    name.push('/');
                }
                names.push(name);
            }
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "reading directory failed");
                return Response::error(Status::InternalServerError);
            }
        }
    }
    names.sort();

    let mut html = String::from("<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n");
    for name in &names {
        html.push_str(&format!("<a href=\"{}\">{}</a>\n", escape_html(&escape_href(name)), escape_html(name)));
    }
    html.push_str("</pre>\n");

    let len = html.len() as u64;
    let body = if head { Body::empty() } else { Body::from(html) };
    let mut res = Response::builder().body(ContentType::Html.as_str(), body);
    set::content_length(&mut res, len);
    res
}

fn local_redirect(req: &Request, target: &str) -> Response {
    let target = match req.query() {
        Some(q) => format!("{target}?{q}"),
        None => target.to_owned(),
    };
    Response::redirect(&sanitize_uri(&target), Status::MovedPermanently)
}

fn not_found() -> Response {
    Response::error_with(Status::NotFound, "404 page not found")
}

fn io_error(path: &Path, err: &io::Error) -> Response {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => not_found(),
        io::ErrorKind::PermissionDenied => Response::error_with(Status::Forbidden, "403 Forbidden"),
        _ => {
            warn!(path = %path.display(), error = %err, "serving file failed");
            Response::error_with(Status::InternalServerError, "500 Internal Server Error")
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Percent-encodes everything but unreserved characters and `/`.
fn escape_href(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~' | b'/') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fs as stdfs;

    use super::*;

    struct Site {
        dir: tempfile::TempDir,
    }

    impl Site {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            stdfs::write(root.join("hello.txt"), "hello world").unwrap();
            stdfs::write(root.join("style.css"), "body{}").unwrap();
            stdfs::create_dir_all(root.join("docs")).unwrap();
            stdfs::write(root.join("docs/index.html"), "<h1>docs</h1>").unwrap();
            stdfs::create_dir_all(root.join("raw/nested")).unwrap();
            stdfs::write(root.join("raw/a <b>.txt"), "a").unwrap();
            Self { dir }
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }
    }

    async fn hit(router: Router, method: &str, uri: &str) -> Response {
        let req: Request = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
            .into();
        router.into_service().call(req).await
    }

    async fn text(res: Response) -> String {
        String::from_utf8(res.into_body().collect().await.unwrap().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn serves_files_with_type_and_length() {
        let site = Site::new();
        let app = || Router::new().file_server("/static", site.root(), false);

        let res = hit(app(), "GET", "/static/hello.txt").await;
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(res.header("content-length"), Some("11"));
        assert_eq!(text(res).await, "hello world");

        let res = hit(app(), "GET", "/static/style.css").await;
        assert_eq!(res.header("content-type"), Some("text/css; charset=utf-8"));
    }

    #[tokio::test]
    async fn head_has_headers_only() {
        let site = Site::new();
        let res = hit(Router::new().file_server("/", site.root(), false), "HEAD", "/hello.txt").await;
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.header("content-length"), Some("11"));
        assert_eq!(text(res).await, "");
    }

    #[tokio::test]
    async fn unslashed_mount_redirects() {
        let site = Site::new();
        let res = hit(Router::new().file_server("/static", site.root(), false), "GET", "/static").await;
        assert_eq!(res.status_code(), 301);
        assert_eq!(res.header("location"), Some("/static/"));
    }

    #[tokio::test]
    async fn directories() {
        let site = Site::new();
        let app = || Router::new().file_server("/s/", site.root(), false);

        let res = hit(app(), "GET", "/s/docs").await;
        assert_eq!(res.status_code(), 301);
        assert_eq!(res.header("location"), Some("/s/docs/"));

        let res = hit(app(), "GET", "/s/docs/").await;
        assert_eq!(text(res).await, "<h1>docs</h1>");

        let res = hit(app(), "GET", "/s/docs/index.html?v=2").await;
        assert_eq!(res.status_code(), 301);
        assert_eq!(res.header("location"), Some("/s/docs/?v=2"));

        let res = hit(app(), "GET", "/s/hello.txt/").await;
        assert_eq!(res.header("location"), Some("/s/hello.txt"));

        let res = hit(app(), "GET", "/s/raw/").await;
        assert_eq!(res.status_code(), 404);
    }

    #[tokio::test]
    async fn browse_lists_entries() {
        let site = Site::new();
        let res = hit(Router::new().file_server("/", site.root(), true), "GET", "/raw/").await;
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
        let body = text(res).await;
        assert!(body.contains("<pre>\n<a href=\"a%20%3Cb%3E.txt\">a &lt;b&gt;.txt</a>\n<a href=\"nested/\">nested/</a>\n</pre>"), "{body}");
    }

    #[tokio::test]
    async fn listing_head_matches_get_length() {
        let site = Site::new();
        let app = || Router::new().file_server("/", site.root(), true);

        let get = hit(app(), "GET", "/raw/").await;
        let len = get.header("content-length").map(str::to_owned);
        let body = text(get).await;
        assert_eq!(len, Some(body.len().to_string()));

        let head = hit(app(), "HEAD", "/raw/").await;
        assert_eq!(head.status_code(), 200);
        assert_eq!(head.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(head.header("content-length").map(str::to_owned), len);
        assert_eq!(text(head).await, "");
    }

    #[test]
    fn serve_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let files = Files { root: PathBuf::from("."), browse: true };
        let req: Request = http::Request::builder().method("HEAD").uri("/").body(Body::empty()).unwrap().into();
        let fut = files.serve(req);
        assert_send(&fut);
    }

    #[tokio::test]
    async fn missing_and_escaping_paths_are_404() {
        let site = Site::new();
        let app = || Router::new().file_server("/s", site.root(), true);

        let res = hit(app(), "GET", "/s/nope.txt").await;
        assert_eq!(res.status_code(), 404);
        assert_eq!(text(res).await, "404 page not found\n");

        let res = hit(app(), "GET", "/s/..%2F..%2Fetc%2Fpasswd").await;
        assert_eq!(res.status_code(), 404);
    }

    #[tokio::test]
    async fn sub_directory_root() {
        let site = Site::new();
        let res = hit(Router::new().file_server_sub("/", site.root(), "docs", false), "GET", "/index.html").await;
        assert_eq!(res.status_code(), 301);

        let res = hit(Router::new().file_server_sub("/", site.root(), "docs", false), "GET", "/").await;
        assert_eq!(text(res).await, "<h1>docs</h1>");
    }

    #[test]
    #[should_panic(expected = "file server does not permit any URL parameters")]
    fn rejects_params() {
        let _ = Router::new().file_server("/files/{id}", ".", false);
    }

    #[test]
    #[should_panic(expected = "invalid name")]
    fn sub_rejects_traversal() {
        let _ = file_server_sub(Router::new(), "/", ".", "../etc", false);
    }
}
