//! Small helpers shared by handlers, middleware and the file server.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::method::Method;
use crate::request::Request;

/// Listen port from the `PORT` environment variable, or `port`.
///
/// The result is prefixed with `:` either way, e.g. `":8080"`. A leading
/// `:` on `port` is not doubled.
pub fn env_port_or(port: &str) -> String {
    port_or(std::env::var("PORT").ok(), port)
}

fn port_or(env_port: Option<String>, port: &str) -> String {
    match env_port {
        Some(p) => format!(":{p}"),
        None => format!(":{}", port.trim_start_matches(':')),
    }
}

/// True for the nine RFC 9110 methods, spelled in uppercase.
pub fn is_valid_method(method: &str) -> bool {
    method.parse::<Method>().is_ok_and(Method::is_standard)
}

/// A query parameter with surrounding whitespace removed; `""` when absent.
pub fn trimmed_query_param(req: &Request, name: &str) -> String {
    req.query_param(name)
        .map(|v| v.trim().to_owned())
        .unwrap_or_default()
}

/// A path parameter with surrounding whitespace removed; `""` when absent.
pub fn trimmed_path_param(req: &Request, name: &str) -> String {
    req.param(name).map(str::trim).unwrap_or_default().to_owned()
}

/// Binary search for `x` in `sorted`.
///
/// `sorted` must be in ascending order. Works for floats; a `NaN` is never found.
pub fn contains_sorted<T: PartialOrd>(sorted: &[T], x: &T) -> bool {
    sorted
        .binary_search_by(|probe| probe.partial_cmp(x).unwrap_or(Ordering::Less))
        .is_ok()
}

/// Lexically cleans a slash-separated path.
///
/// Repeated slashes collapse, `.` elements vanish, `..` removes the element
/// before it (and cannot climb above a rooted path), the trailing slash is
/// dropped. An empty result is `/` for rooted paths and `.` otherwise.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_owned();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            _ => parts.push(seg),
        }
    }

    match (rooted, parts.is_empty()) {
        (true, _) => format!("/{}", parts.join("/")),
        (false, true) => ".".to_owned(),
        (false, false) => parts.join("/"),
    }
}

/// Extension of the last path element including the dot, or `""`.
pub(crate) fn path_ext(path: &str) -> &str {
    let last = path.rsplit('/').next().unwrap_or(path);
    last.rfind('.').map_or("", |i| &last[i..])
}

/// Collapses a leading run of slashes or backslashes to a single `/`.
///
/// Browsers read `//host` and `\\host` as absolute URLs; redirecting to one
/// would send the client off-site.
pub(crate) fn sanitize_uri(uri: &str) -> String {
    let b = uri.as_bytes();
    if b.len() > 1 && matches!(b[0], b'/' | b'\\') && matches!(b[1], b'/' | b'\\') {
        format!("/{}", uri.trim_start_matches(['/', '\\']))
    } else {
        uri.to_owned()
    }
}

/// Decodes `%XX` escapes. Malformed escapes pass through untouched and
/// invalid UTF-8 is replaced.
pub(crate) fn percent_decode(s: &str) -> String {
    if !s.contains('%') {
        return s.to_owned();
    }

    let b = s.as_bytes();
    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    while i < b.len() {
        let hex = |c: u8| (c as char).to_digit(16);
        match (b[i], b.get(i + 1).and_then(|&c| hex(c)), b.get(i + 2).and_then(|&c| hex(c))) {
            (b'%', Some(hi), Some(lo)) => {
                out.push((hi * 16 + lo) as u8);
                i += 3;
            }
            (c, _, _) => {
                out.push(c);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Joins a relative sub directory onto `root`.
///
/// `dir` must be `.` or a slash-separated relative path whose elements are
/// neither empty, `.` nor `..`.
pub fn sub_dir(root: impl AsRef<Path>, dir: &str) -> Result<PathBuf, Error> {
    let root = root.as_ref();
    if dir == "." {
        return Ok(root.to_path_buf());
    }

    let valid = !dir.is_empty()
        && dir.split('/').all(|seg| !matches!(seg, "" | "." | ".."))
        && !dir.contains('\\');
    if !valid {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("sub {dir}: invalid name"),
        )));
    }
    Ok(root.join(dir))
}
