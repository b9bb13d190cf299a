//! HTTP status codes as a typed enum.
//!
//! Use [`Status`] anywhere a status code is accepted: `Response::status()`,
//! `Response::error()`, the middleware constructors, the `respond` writers,
//! or as a bare handler return value.
//!
//! ```rust
//! use tsu_ext::{Response, Status};
//!
//! Response::status(Status::NoContent);
//! Response::error(Status::Forbidden);
//!
//! async fn delete_user(_req: tsu_ext::Request) -> Status {
//!     Status::NoContent
//! }
//! ```

macro_rules! statuses {
    ($( $(#[$doc:meta])* $name:ident = $code:literal, $reason:literal; )+) => {
        /// All IANA-registered HTTP status codes.
        #[allow(clippy::enum_variant_names)]
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        pub enum Status {
            $( $(#[$doc])* $name, )+
        }

        impl Status {
            /// Numeric code, e.g. `404`.
            pub const fn code(self) -> u16 {
                match self {
                    $( Self::$name => $code, )+
                }
            }

            /// Canonical reason phrase, e.g. `"Not Found"`.
            pub const fn reason(self) -> &'static str {
                match self {
                    $( Self::$name => $reason, )+
                }
            }

            /// Looks up a status by its numeric code.
            pub const fn from_code(code: u16) -> Option<Self> {
                match code {
                    $( $code => Some(Self::$name), )+
                    _ => None,
                }
            }
        }
    };
}

statuses! {
    Continue = 100, "Continue";
    SwitchingProtocols = 101, "Switching Protocols";
    Processing = 102, "Processing";
    EarlyHints = 103, "Early Hints";

    Ok = 200, "OK";
    Created = 201, "Created";
    Accepted = 202, "Accepted";
    NonAuthoritativeInformation = 203, "Non-Authoritative Information";
    NoContent = 204, "No Content";
    ResetContent = 205, "Reset Content";
    PartialContent = 206, "Partial Content";
    MultiStatus = 207, "Multi-Status";
    AlreadyReported = 208, "Already Reported";
    ImUsed = 226, "IM Used";

    MultipleChoices = 300, "Multiple Choices";
    MovedPermanently = 301, "Moved Permanently";
    Found = 302, "Found";
    SeeOther = 303, "See Other";
    NotModified = 304, "Not Modified";
    TemporaryRedirect = 307, "Temporary Redirect";
    PermanentRedirect = 308, "Permanent Redirect";

    BadRequest = 400, "Bad Request";
    Unauthorized = 401, "Unauthorized";
    PaymentRequired = 402, "Payment Required";
    Forbidden = 403, "Forbidden";
    NotFound = 404, "Not Found";
    MethodNotAllowed = 405, "Method Not Allowed";
    NotAcceptable = 406, "Not Acceptable";
    ProxyAuthenticationRequired = 407, "Proxy Authentication Required";
    RequestTimeout = 408, "Request Timeout";
    Conflict = 409, "Conflict";
    Gone = 410, "Gone";
    LengthRequired = 411, "Length Required";
    PreconditionFailed = 412, "Precondition Failed";
    /// Formerly "Request Entity Too Large".
    ContentTooLarge = 413, "Request Entity Too Large";
    UriTooLong = 414, "Request URI Too Long";
    UnsupportedMediaType = 415, "Unsupported Media Type";
    RangeNotSatisfiable = 416, "Requested Range Not Satisfiable";
    ExpectationFailed = 417, "Expectation Failed";
    ImATeapot = 418, "I'm a teapot";
    MisdirectedRequest = 421, "Misdirected Request";
    UnprocessableContent = 422, "Unprocessable Entity";
    Locked = 423, "Locked";
    FailedDependency = 424, "Failed Dependency";
    TooEarly = 425, "Too Early";
    UpgradeRequired = 426, "Upgrade Required";
    PreconditionRequired = 428, "Precondition Required";
    TooManyRequests = 429, "Too Many Requests";
    RequestHeaderFieldsTooLarge = 431, "Request Header Fields Too Large";
    UnavailableForLegalReasons = 451, "Unavailable For Legal Reasons";

    InternalServerError = 500, "Internal Server Error";
    NotImplemented = 501, "Not Implemented";
    BadGateway = 502, "Bad Gateway";
    ServiceUnavailable = 503, "Service Unavailable";
    GatewayTimeout = 504, "Gateway Timeout";
    HttpVersionNotSupported = 505, "HTTP Version Not Supported";
    VariantAlsoNegotiates = 506, "Variant Also Negotiates";
    InsufficientStorage = 507, "Insufficient Storage";
    LoopDetected = 508, "Loop Detected";
    NotExtended = 510, "Not Extended";
    NetworkAuthenticationRequired = 511, "Network Authentication Required";
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        s.code()
    }
}

impl From<Status> for http::StatusCode {
    fn from(s: Status) -> Self {
        // every variant is in 100..=599
        Self::from_u16(s.code()).unwrap_or(Self::INTERNAL_SERVER_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_and_reason() {
        assert_eq!(Status::NotFound.code(), 404);
        assert_eq!(Status::MethodNotAllowed.reason(), "Method Not Allowed");
        assert_eq!(Status::ContentTooLarge.reason(), "Request Entity Too Large");
    }

    #[test]
    fn from_code_round_trips_known_codes() {
        assert_eq!(Status::from_code(301), Some(Status::MovedPermanently));
        assert_eq!(Status::from_code(299), None);
    }
}
