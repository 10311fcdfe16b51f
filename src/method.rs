//! HTTP method as a typed enum.
//!
//! Covers the RFC 9110 methods plus [`Method::Any`], the routing sentinel
//! that matches every method, including ones routers usually never see such
//! as `OPTIONS`.

use std::fmt;
use std::str::FromStr;

/// A routable HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
    /// Matches any incoming method. Written as `ANY`.
    Any,
}

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Delete  => "DELETE",
            Self::Get     => "GET",
            Self::Head    => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch   => "PATCH",
            Self::Post    => "POST",
            Self::Put     => "PUT",
            Self::Trace   => "TRACE",
            Self::Any     => "ANY",
        }
    }

    /// Whether a route registered under `self` accepts an incoming `method`.
    pub fn matches(self, method: &http::Method) -> bool {
        self == Self::Any || self.as_str() == method.as_str()
    }

    /// Maps an incoming request method. Extension methods have no variant and
    /// only ever reach [`Method::Any`] routes.
    pub fn from_http(method: &http::Method) -> Option<Self> {
        match method.as_str().parse() {
            Ok(Self::Any) | Err(_) => None,
            Ok(m) => Some(m),
        }
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Self::Connect),
            "DELETE"  => Ok(Self::Delete),
            "GET"     => Ok(Self::Get),
            "HEAD"    => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "PATCH"   => Ok(Self::Patch),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            "TRACE"   => Ok(Self::Trace),
            "ANY"     => Ok(Self::Any),
            _         => Err(UnknownMethod(s.to_owned())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a method name with no [`Method`] variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown HTTP method `{0}`")]
pub struct UnknownMethod(pub String);
