//! Header setters for a response you already hold.
//!
//! Each one overwrites any previous value of its header.

use http::header::{self, HeaderName, HeaderValue};

use crate::response::{ContentType, Response};

/// The permissive CORS header set shared by [`cors_any`] and
/// [`CorsAny`](crate::middleware::CorsAny).
pub(crate) const CORS_ANY: [(HeaderName, HeaderValue); 4] = [
    (
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    ),
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
    (
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, CONNECT, DELETE, HEAD, PATCH, OPTIONS, TRACE"),
    ),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*")),
];

pub fn content_length(res: &mut Response, length: u64) {
    res.headers_mut().insert(header::CONTENT_LENGTH, HeaderValue::from(length));
}

/// Sets `content-type` to any MIME string. Invalid values are ignored.
pub fn content_type(res: &mut Response, mime: &str) {
    if let Ok(value) = HeaderValue::try_from(mime) {
        res.headers_mut().insert(header::CONTENT_TYPE, value);
    }
}

/// `content-disposition: attachment; filename="<filename>"`.
///
/// Quotes and backslashes in `filename` are escaped; a name that still is
/// not a valid header value falls back to a bare `attachment`.
pub fn attachment_filename(res: &mut Response, filename: &str) {
    let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
    match HeaderValue::try_from(format!("attachment; filename=\"{escaped}\"")) {
        Ok(value) => {
            res.headers_mut().insert(header::CONTENT_DISPOSITION, value);
        }
        Err(_) => attachment(res),
    }
}

pub fn attachment(res: &mut Response) {
    res.headers_mut()
        .insert(header::CONTENT_DISPOSITION, HeaderValue::from_static("attachment"));
}

pub fn inline(res: &mut Response) {
    res.headers_mut()
        .insert(header::CONTENT_DISPOSITION, HeaderValue::from_static("inline"));
}

pub fn plain_text(res: &mut Response) {
    typed(res, ContentType::Text);
}

pub fn json(res: &mut Response) {
    typed(res, ContentType::Json);
}

pub fn html(res: &mut Response) {
    typed(res, ContentType::Html);
}

/// Allows any origin, method and header.
pub fn cors_any(res: &mut Response) {
    let headers = res.headers_mut();
    for (name, value) in CORS_ANY {
        headers.insert(name, value);
    }
}

fn typed(res: &mut Response, ct: ContentType) {
    res.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(ct.as_str()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;

    #[test]
    fn disposition() {
        let mut res = Response::status(Status::Ok);
        attachment_filename(&mut res, "report \"q3\".csv");
        assert_eq!(
            res.header("content-disposition"),
            Some(r#"attachment; filename="report \"q3\".csv""#)
        );

        inline(&mut res);
        assert_eq!(res.header("content-disposition"), Some("inline"));

        attachment_filename(&mut res, "line\nbreak");
        assert_eq!(res.header("content-disposition"), Some("attachment"));
    }

    #[test]
    fn content_headers_overwrite() {
        let mut res = Response::text("x");
        json(&mut res);
        assert_eq!(res.header("content-type"), Some("application/json; charset=utf-8"));
        html(&mut res);
        assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
        plain_text(&mut res);
        assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
        content_type(&mut res, "image/png");
        assert_eq!(res.header("content-type"), Some("image/png"));

        content_length(&mut res, 42);
        assert_eq!(res.header("content-length"), Some("42"));
    }

    #[test]
    fn cors_any_overwrites() {
        let mut res = Response::builder()
            .header("access-control-allow-origin", "https://a.example")
            .no_body();
        cors_any(&mut res);
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        assert_eq!(res.headers().get_all("access-control-allow-origin").iter().count(), 1);
    }
}
