//! The platform context factory.
//!
//! Every request starts life with a [`Context`] produced by one process-wide
//! factory, consulted exactly once at the top of
//! [`Server::handle`](crate::Server::handle). In production that is
//! [`platform_context`]; tests swap it for a fixture through
//! [`testing::install_fixture`](crate::testing::install_fixture).
//!
//! The slot is an [`ArcSwap`]: reads on the hot path are lock-free, writes are
//! atomic. Writes are meant for process startup and test setup only; nothing
//! orders a write against requests already in flight.

use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;

use crate::context::{AppId, Context, TraceId};
use crate::request::Request;

/// Header the platform's front end uses to propagate trace context, formatted
/// `TRACE_ID/SPAN_ID;o=OPTIONS`.
pub const TRACE_CONTEXT_HEADER: &str = "x-cloud-trace-context";

/// Environment variables naming the application, in lookup order.
const APP_ID_VARS: [&str; 2] = ["GAE_APPLICATION", "GOOGLE_CLOUD_PROJECT"];

struct Factory(Box<dyn Fn(&Request) -> Context + Send + Sync>);

static FACTORY: LazyLock<ArcSwap<Factory>> =
    LazyLock::new(|| ArcSwap::from_pointee(Factory(Box::new(platform_context))));

static APP_ID: LazyLock<Option<String>> = LazyLock::new(|| {
    APP_ID_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .filter(|id| !id.is_empty())
        .map(|id| strip_partition(&id).to_owned())
});

/// Produces the initial context for `req` from the installed factory.
pub fn new_context(req: &Request) -> Context {
    (FACTORY.load().0)(req)
}

/// Replaces the process-wide factory.
pub fn set_context_factory<F>(factory: F)
where
    F: Fn(&Request) -> Context + Send + Sync + 'static,
{
    FACTORY.store(Arc::new(Factory(Box::new(factory))));
}

/// Reinstalls [`platform_context`] as the factory.
pub fn reset_context_factory() {
    set_context_factory(platform_context);
}

/// The production factory.
///
/// Seeds the context with the application id taken from the environment
/// (`GAE_APPLICATION`, then `GOOGLE_CLOUD_PROJECT`, with any `s~`-style
/// partition prefix removed) and the trace id from the
/// [`TRACE_CONTEXT_HEADER`].
pub fn platform_context(req: &Request) -> Context {
    let mut ctx = Context::new();
    if let Some(id) = APP_ID.as_deref() {
        ctx.insert(AppId(id.to_owned()));
    }
    if let Some(trace) = req.header(TRACE_CONTEXT_HEADER).and_then(trace_id) {
        ctx.insert(TraceId(trace.to_owned()));
    }
    ctx
}

fn trace_id(header: &str) -> Option<&str> {
    let id = header.split(['/', ';']).next()?.trim();
    (!id.is_empty()).then_some(id)
}

fn strip_partition(id: &str) -> &str {
    match id.split_once('~') {
        Some((_, rest)) => rest,
        None => id,
    }
}
