//! Incoming HTTP request type.

use std::borrow::Cow;
use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Uri};

use crate::context::{Context, RouteVars};

/// An incoming HTTP request with its body fully buffered.
///
/// Every request carries its [`Context`] from the moment the server accepts
/// it. Router backends add the route parameters to it; before hooks add
/// request metadata.
#[derive(Debug)]
pub struct Request {
    parts: Parts,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    context: Context,
}

impl Request {
    pub fn new(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self { parts, body, remote_addr: None, context: Context::new() }
    }

    pub(crate) fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> &http::Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Header lookup. Names are case-insensitive; non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of the query parameter `name`, percent-decoded.
    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.parts.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| Cow::into_owned(v))
    }

    pub fn context(&self) -> &Context { &self.context }
    pub fn context_mut(&mut self) -> &mut Context { &mut self.context }

    /// Replaces the request's context.
    pub fn set_context(&mut self, ctx: Context) {
        self.context = ctx;
    }

    /// Returns a named route parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.context.get::<RouteVars>()?.0.get(key).map(String::as_str)
    }

    /// Stores route parameters under the shared [`RouteVars`] key. An empty
    /// mapping leaves the context untouched.
    pub fn set_route_vars(&mut self, vars: HashMap<String, String>) {
        if !vars.is_empty() {
            self.context.insert(RouteVars(vars));
        }
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        Self::new(req)
    }
}
