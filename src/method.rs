//! HTTP method as a typed enum.
//!
//! Covers RFC 9110 standard methods, WebDAV extensions (RFC 4918 / 4791 / 3253 / 5323),
//! and `PURGE` used by nginx and Varnish for cache invalidation.
//!
//! Only the nine RFC 9110 methods are accepted by the string-based
//! registration helpers ([`Router::match_methods`](crate::Router::match_methods)
//! and friends); the extensions are still routable through [`Router::on`](crate::Router::on).

use std::fmt;
use std::str::FromStr;

macro_rules! methods {
    ($( $name:ident => $wire:literal, )+) => {
        /// A known HTTP method.
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        pub enum Method {
            $( $name, )+
        }

        impl Method {
            /// Every known method.
            pub const ALL: &'static [Method] = &[$( Method::$name, )+];

            /// Returns the uppercase wire representation (e.g. `"GET"`).
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$name => $wire, )+
                }
            }
        }

        /// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
        impl FromStr for Method {
            type Err = UnknownMethod;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $wire => Ok(Self::$name), )+
                    _ => Err(UnknownMethod),
                }
            }
        }
    };
}

methods! {
    // RFC 9110
    Connect => "CONNECT",
    Delete => "DELETE",
    Get => "GET",
    Head => "HEAD",
    Options => "OPTIONS",
    Patch => "PATCH",
    Post => "POST",
    Put => "PUT",
    Trace => "TRACE",
    // WebDAV RFC 4918
    Copy => "COPY",
    Lock => "LOCK",
    Mkcol => "MKCOL",
    Move => "MOVE",
    Propfind => "PROPFIND",
    Proppatch => "PROPPATCH",
    Unlock => "UNLOCK",
    // WebDAV extensions: CalDAV, RFC 3253, RFC 5323
    Mkcalendar => "MKCALENDAR",
    Report => "REPORT",
    Search => "SEARCH",
    // nginx / Varnish
    Purge => "PURGE",
}

impl Method {
    /// The RFC 9110 methods, in the order CORS headers list them.
    pub const STANDARD: [Method; 9] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Connect,
        Self::Delete,
        Self::Head,
        Self::Patch,
        Self::Options,
        Self::Trace,
    ];

    /// True for the nine RFC 9110 methods.
    pub fn is_standard(self) -> bool {
        Self::STANDARD.contains(&self)
    }
}

/// Returned when a method string names no known method.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnknownMethod;

impl fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown HTTP method")
    }
}

impl std::error::Error for UnknownMethod {}

impl TryFrom<&http::Method> for Method {
    type Error = UnknownMethod;

    fn try_from(m: &http::Method) -> Result<Self, Self::Error> {
        m.as_str().parse()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_sensitive() {
        assert_eq!("GET".parse::<Method>(), Ok(Method::Get));
        assert_eq!("get".parse::<Method>(), Err(UnknownMethod));
    }

    #[test]
    fn extensions_are_not_standard() {
        assert!(Method::Trace.is_standard());
        assert!(!Method::Propfind.is_standard());
        assert!(!Method::Purge.is_standard());
    }

    #[test]
    fn converts_from_http_method() {
        assert_eq!(Method::try_from(&http::Method::PATCH), Ok(Method::Patch));
        let custom = http::Method::from_bytes(b"BREW").unwrap();
        assert_eq!(Method::try_from(&custom), Err(UnknownMethod));
    }
}
