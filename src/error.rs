//! Unified error type.

use std::fmt;

use crate::response::{IntoResponse, Response};
use crate::status::Status;

/// A boxed error from a body, a template engine, or any other collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by tsu-ext's fallible operations.
///
/// Application-level outcomes (404, 422, etc.) are expressed as HTTP
/// [`Response`] values. This type surfaces failures that happen while
/// producing one: socket I/O, reading a request body, serializing JSON,
/// rendering a template.
#[derive(Debug)]
pub enum Error {
    /// Binding, accepting, or file-system I/O.
    Io(std::io::Error),
    /// The underlying body stream failed.
    Body(BoxError),
    /// A request body grew past the configured limit.
    PayloadTooLarge { limit: u64 },
    Json(serde_json::Error),
    /// No template with the given name exists in the template set.
    TemplateNotFound(String),
    Template(BoxError),
}

impl Error {
    /// Wraps a transport error, unwrapping it first if it already is an [`Error`].
    pub(crate) fn body(err: impl Into<BoxError>) -> Self {
        match err.into().downcast::<Error>() {
            Ok(err) => *err,
            Err(other) => Self::Body(other),
        }
    }

    /// The status code a handler should answer with when it gives up on this error.
    pub fn status(&self) -> Status {
        match self {
            Self::PayloadTooLarge { .. } => Status::ContentTooLarge,
            Self::Body(_) => Status::BadRequest,
            Self::Json(err) if !err.is_io() && !err.is_eof() => Status::BadRequest,
            _ => Status::InternalServerError,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Body(e) => write!(f, "body: {e}"),
            Self::PayloadTooLarge { limit } => {
                write!(f, "request body exceeds the {limit} byte limit")
            }
            Self::Json(e) => write!(f, "json: {e}"),
            Self::TemplateNotFound(name) => write!(f, "template not found: {name}"),
            Self::Template(e) => write!(f, "template: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Body(e) | Self::Template(e) => Some(e.as_ref()),
            Self::Json(e) => Some(e),
            Self::PayloadTooLarge { .. } | Self::TemplateNotFound(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Lets handlers return `Result<_, Error>` and bubble failures with `?`.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if u16::from(status) >= 500 {
            tracing::error!(error = %self, "handler failed");
        }
        Response::error(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_error_is_not_rewrapped() {
        let inner = Error::PayloadTooLarge { limit: 8 };
        let err = Error::body(inner);
        assert!(matches!(err, Error::PayloadTooLarge { limit: 8 }));
    }

    #[test]
    fn foreign_body_error_is_wrapped() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(Error::body(io), Error::Body(_)));
    }

    #[test]
    fn payload_too_large_maps_to_413() {
        let res = Error::PayloadTooLarge { limit: 1 }.into_response();
        assert_eq!(res.status_code(), 413);
    }

    #[test]
    fn missing_template_maps_to_500() {
        let res = Error::TemplateNotFound("index".into()).into_response();
        assert_eq!(res.status_code(), 500);
        assert_eq!(
            Error::TemplateNotFound("index".into()).to_string(),
            "template not found: index"
        );
    }
}
