//! Router abstraction and backend selection.
//!
//! The server talks to routing through the narrow [`Router`] trait. Three
//! backends ship with perch and are picked by name with [`router_select`]:
//!
//! | Name | Backend | Patterns | Not-found handler |
//! |---|---|---|---|
//! | `radix` (default) | [`RadixRouter`], one matchit tree per method | `{id}`, `{*rest}` | yes |
//! | `regex` | [`RegexRouter`], ordered regex table | `{id}`, `{dir:(up|down)}` | yes |
//! | `mux` | [`MuxRouter`], exact and subtree paths | `{id}`, `{id}.json`, trailing `/` | ignored |
//!
//! Unknown names fall back to `radix`. [`custom_router`] plugs in anything
//! else that implements the trait.
//!
//! Whatever the backend, matched route parameters are stored in the request
//! context under [`RouteVars`] before the handler runs; read them with
//! [`vars`] or [`Request::param`].
//!
//! A path that exists only for other methods answers `404`, not `405`, on
//! every backend.

mod mux;
mod pattern;
mod radix;

use std::collections::HashMap;

use http::StatusCode;

use crate::context::RouteVars;
use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

pub use self::mux::MuxRouter;
pub use self::pattern::RegexRouter;
pub use self::radix::RadixRouter;

pub const RADIX: &str = "radix";
pub const REGEX: &str = "regex";
pub const MUX: &str = "mux";

/// The backend used when no router option is given or the name is unknown.
pub const DEFAULT_ROUTER: &str = RADIX;

/// A routing backend.
///
/// Registration happens once, before the first request; after that the
/// router is shared read-only across request tasks.
pub trait Router: Send + Sync + 'static {
    /// Registers `handler` for `method` on `path`. [`Method::Any`] matches
    /// every method.
    fn handle(&mut self, method: Method, path: &str, handler: BoxedHandler) -> Result<(), Error>;

    /// Replaces the handler for unmatched requests. Backends that cannot
    /// honor this accept the call and ignore it.
    fn set_not_found_handler(&mut self, handler: BoxedHandler);

    /// Dispatches one request.
    fn serve(&self, req: Request) -> BoxFuture<'static, Response>;
}

impl dyn Router {
    /// Registers a plain async function as a handler.
    pub fn handle_fn(&mut self, method: Method, path: &str, handler: impl Handler) -> Result<(), Error> {
        self.handle(method, path, handler.into_boxed_handler())
    }
}

// ── Router options ────────────────────────────────────────────────────────────

type Step = Box<dyn FnOnce(Option<Box<dyn Router>>) -> Box<dyn Router> + Send>;

/// One step in building a service's router. Options run in order; each
/// receives the router built so far (`None` for the first).
pub struct RouterOption {
    step: Step,
    selects: bool,
}

impl RouterOption {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Option<Box<dyn Router>>) -> Box<dyn Router> + Send + 'static,
    {
        Self { step: Box::new(f), selects: false }
    }

    /// Whether this step came from [`router_select`].
    pub fn is_select(&self) -> bool {
        self.selects
    }

    pub(crate) fn apply(self, router: Option<Box<dyn Router>>) -> Box<dyn Router> {
        (self.step)(router)
    }
}

/// Puts the backend named `name` ahead of `opts` and drops their own
/// [`router_select`] steps. Every other step still runs, in order, on the
/// chosen backend.
pub fn override_select(name: &str, opts: Vec<RouterOption>) -> Vec<RouterOption> {
    std::iter::once(router_select(name))
        .chain(opts.into_iter().filter(|opt| !opt.is_select()))
        .collect()
}

/// Builds the router from `opts`, or the default router when `opts` is empty.
pub fn build(opts: Vec<RouterOption>) -> Box<dyn Router> {
    opts.into_iter()
        .fold(None, |router, opt| Some(opt.apply(router)))
        .unwrap_or_else(|| select(DEFAULT_ROUTER))
}

/// Replaces the router with a fresh backend chosen by name.
pub fn router_select(name: &str) -> RouterOption {
    let name = name.to_owned();
    RouterOption { selects: true, ..RouterOption::new(move |_| select(&name)) }
}

/// Replaces the router with an externally supplied implementation.
pub fn custom_router(router: impl Router) -> RouterOption {
    RouterOption::new(move |_| Box::new(router))
}

/// Sets the not-found handler on the router built so far (the default
/// backend when this is the first option).
pub fn router_not_found(handler: BoxedHandler) -> RouterOption {
    RouterOption::new(move |router| {
        let mut router = router.unwrap_or_else(|| select(DEFAULT_ROUTER));
        router.set_not_found_handler(handler);
        router
    })
}

/// Instantiates a backend by name. Unknown names yield the default backend.
pub fn select(name: &str) -> Box<dyn Router> {
    match name {
        REGEX => Box::new(RegexRouter::new()),
        MUX   => Box::new(MuxRouter::new()),
        _     => Box::new(RadixRouter::new()),
    }
}

// ── Route parameters ──────────────────────────────────────────────────────────

/// Route parameters of `req`, whichever backend matched it. Empty when the
/// route had none.
pub fn vars(req: &Request) -> HashMap<String, String> {
    req.context()
        .get::<RouteVars>()
        .map(|v| v.0.clone())
        .unwrap_or_default()
}

/// The built-in not-found response.
pub(crate) async fn not_found(_req: Request) -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .text("404 page not found\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    async fn show_id(req: Request) -> String {
        format!("{:?}", vars(&req).get("id"))
    }

    async fn ok(_req: Request) -> &'static str {
        "ok"
    }

    async fn custom_404(_req: Request) -> Response {
        Response::builder().status(StatusCode::NOT_FOUND).text("custom")
    }

    fn req(method: http::Method, uri: &str) -> Request {
        Request::new(http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap())
    }

    fn all_backends() -> Vec<(&'static str, Box<dyn Router>)> {
        vec![(RADIX, select(RADIX)), (REGEX, select(REGEX)), (MUX, select(MUX))]
    }

    #[tokio::test]
    async fn vars_are_normalized_across_backends() {
        for (name, mut router) in all_backends() {
            router.handle_fn(Method::Get, "/cats/{id}", show_id).unwrap();
            router.handle_fn(Method::Get, "/cat/{id}.json", show_id).unwrap();
            let res = router.serve(req(http::Method::GET, "/cats/42")).await;
            assert_eq!(res.body().as_ref(), br#"Some("42")"#, "backend {name}");
            let res = router.serve(req(http::Method::GET, "/cat/7.json")).await;
            assert_eq!(res.body().as_ref(), br#"Some("7")"#, "backend {name}");
        }
    }

    #[tokio::test]
    async fn method_mismatch_is_404_on_every_backend() {
        for (name, mut router) in all_backends() {
            router.handle_fn(Method::Get, "/x.json", ok).unwrap();
            let res = router.serve(req(http::Method::PUT, "/x.json")).await;
            assert_eq!(res.status_code(), StatusCode::NOT_FOUND, "backend {name}");
            let res = router.serve(req(http::Method::GET, "/x.json")).await;
            assert_eq!(res.status_code(), StatusCode::OK, "backend {name}");
        }
    }

    #[tokio::test]
    async fn any_matches_options_on_every_backend() {
        for (name, mut router) in all_backends() {
            router.handle_fn(Method::Any, "/all", ok).unwrap();
            for m in [http::Method::OPTIONS, http::Method::DELETE, http::Method::GET] {
                let res = router.serve(req(m.clone(), "/all")).await;
                assert_eq!(res.status_code(), StatusCode::OK, "backend {name} method {m}");
            }
        }
    }

    #[tokio::test]
    async fn unknown_name_selects_the_default() {
        let mut unknown = select("no-such-router");
        let mut default = select(DEFAULT_ROUTER);
        for r in [&mut unknown, &mut default] {
            r.handle_fn(Method::Get, "/files/{*rest}", ok).unwrap();
        }
        let a = unknown.serve(req(http::Method::GET, "/files/a/b")).await;
        let b = default.serve(req(http::Method::GET, "/files/a/b")).await;
        assert_eq!(a.status_code(), StatusCode::OK);
        assert_eq!(a.status_code(), b.status_code());
        assert_eq!(a.body(), b.body());
    }

    #[tokio::test]
    async fn not_found_option_applies_to_the_selected_router() {
        let router = build(vec![router_select(REGEX), router_not_found(crate::handler::boxed(custom_404))]);
        let res = router.serve(req(http::Method::GET, "/missing")).await;
        assert_eq!(res.body().as_ref(), b"custom");
    }

    #[tokio::test]
    async fn mux_ignores_not_found_handler() {
        let router = build(vec![router_select(MUX), router_not_found(crate::handler::boxed(custom_404))]);
        let res = router.serve(req(http::Method::GET, "/missing")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.body().as_ref(), b"404 page not found\n");
    }

    #[tokio::test]
    async fn override_select_replaces_selection_and_keeps_other_steps() {
        let opts = vec![router_select(MUX), router_not_found(crate::handler::boxed(custom_404))];
        let opts = override_select(REGEX, opts);
        assert_eq!(opts.iter().filter(|o| o.is_select()).count(), 1);

        let mut router = build(opts);
        router.handle_fn(Method::Get, "/scale/{dir:(up|down)}", ok).unwrap();
        let res = router.serve(req(http::Method::GET, "/scale/up")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        let res = router.serve(req(http::Method::GET, "/missing")).await;
        assert_eq!(res.body().as_ref(), b"custom");
    }

    #[tokio::test]
    async fn empty_options_build_the_default() {
        let mut router = build(Vec::new());
        router.handle_fn(Method::Get, "/files/{*rest}", ok).unwrap();
        let res = router.serve(req(http::Method::GET, "/files/x/y")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn custom_router_is_used_verbatim() {
        struct Fixed;
        impl Router for Fixed {
            fn handle(&mut self, _: Method, _: &str, _: BoxedHandler) -> Result<(), Error> { Ok(()) }
            fn set_not_found_handler(&mut self, _: BoxedHandler) {}
            fn serve(&self, _: Request) -> BoxFuture<'static, Response> {
                Box::pin(async { Response::text("fixed") })
            }
        }
        let router = build(vec![custom_router(Fixed)]);
        let res = router.serve(req(http::Method::GET, "/anything")).await;
        assert_eq!(res.body().as_ref(), b"fixed");
    }

    #[test]
    fn vars_default_to_empty() {
        assert!(vars(&req(http::Method::GET, "/")).is_empty());
    }
}
