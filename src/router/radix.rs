//! Radix-tree backend.
//!
//! One matchit tree per method, plus one for [`Method::Any`] routes that is
//! consulted when the method's own tree has no match. O(path-length) lookup.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, boxed};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

use super::{Router, not_found};

/// The default backend.
///
/// Path parameters use `{name}` syntax and catch-alls `{*name}`.
pub struct RadixRouter {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    not_found: BoxedHandler,
}

impl RadixRouter {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), not_found: boxed(not_found) }
    }

    fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for RadixRouter {
    fn default() -> Self { Self::new() }
}

impl Router for RadixRouter {
    fn handle(&mut self, method: Method, path: &str, handler: BoxedHandler) -> Result<(), Error> {
        if !path.starts_with('/') {
            return Err(Error::Route { path: path.to_owned(), reason: "path must begin with '/'".to_owned() });
        }
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler)
            .map_err(|e| Error::Route { path: path.to_owned(), reason: e.to_string() })
    }

    fn set_not_found_handler(&mut self, handler: BoxedHandler) {
        self.not_found = handler;
    }

    fn serve(&self, mut req: Request) -> BoxFuture<'static, Response> {
        let path = req.path().to_owned();
        let found = Method::from_http(req.method())
            .and_then(|m| self.lookup(m, &path))
            .or_else(|| self.lookup(Method::Any, &path));

        match found {
            Some((handler, params)) => {
                req.set_route_vars(params);
                handler.call(req)
            }
            None => self.not_found.call(req),
        }
    }
}
