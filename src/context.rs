//! Request-scoped context.
//!
//! A [`Context`] is a typed bag of values that travels with one request from
//! the [platform factory](crate::platform) through the router, the before
//! hooks, the decoder, the endpoint middleware and the endpoint itself. Values
//! are keyed by their Rust type, so every key below is a newtype.
//!
//! ```rust
//! use perch::{Context, RequestPath};
//!
//! let ctx = Context::new().with(RequestPath("/list.json".into()));
//! assert_eq!(ctx.get::<RequestPath>().map(|p| p.0.as_str()), Some("/list.json"));
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;

use http::Extensions;

/// Typed, request-scoped values.
///
/// Cloning a context clones its values. Put shared state behind an `Arc`
/// when every clone must observe the same thing (a storage handle, say).
#[derive(Clone, Debug, Default)]
pub struct Context {
    values: Extensions,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the context with `value` stored under its type.
    pub fn with<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.values.insert(value);
        self
    }

    /// Stores `value` under its type, returning the previous value.
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.values.insert(value)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get::<T>()
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.get::<T>().is_some()
    }
}

// ── Standard keys ─────────────────────────────────────────────────────────────

/// Value of the platform's inbound identity header
/// ([`INBOUND_APP_ID_HEADER`](crate::INBOUND_APP_ID_HEADER)).
/// Empty when the header was absent.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InboundAppId(pub String);

/// Route parameters extracted by the active router backend.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RouteVars(pub HashMap<String, String>);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestMethod(pub http::Method);

/// The request path, without query string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestPath(pub String);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestUri(pub http::Uri);

/// The peer address of the connection, as `ip:port`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteAddr(pub String);

impl From<SocketAddr> for RemoteAddr {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestHost(pub String);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Authorization(pub String);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserAgent(pub String);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct XRequestId(pub String);

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct XForwardedFor(pub String);

// ── Platform keys ─────────────────────────────────────────────────────────────

/// Identifier of the application this process serves, as reported by the
/// platform. Set by [`platform_context`](crate::platform::platform_context).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AppId(pub String);

/// Trace identifier propagated by the platform's front end.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TraceId(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_keyed_by_type() {
        let ctx = Context::new()
            .with(RequestPath("/a".into()))
            .with(InboundAppId("app".into()));
        assert_eq!(ctx.get::<RequestPath>(), Some(&RequestPath("/a".into())));
        assert_eq!(ctx.get::<InboundAppId>(), Some(&InboundAppId("app".into())));
        assert!(!ctx.contains::<RemoteAddr>());
    }

    #[test]
    fn insert_replaces_and_returns_previous() {
        let mut ctx = Context::new().with(RequestPath("/a".into()));
        let prev = ctx.insert(RequestPath("/b".into()));
        assert_eq!(prev, Some(RequestPath("/a".into())));
        assert_eq!(ctx.get::<RequestPath>().unwrap().0, "/b");
    }

    #[test]
    fn clones_are_independent() {
        let base = Context::new().with(RequestPath("/a".into()));
        let mut copy = base.clone();
        copy.insert(RequestPath("/b".into()));
        assert_eq!(base.get::<RequestPath>().unwrap().0, "/a");
    }
}
