//! Per-endpoint transport: server options and the handler the router stores
//! for every registered endpoint.
//!
//! One request through an [`EndpointServer`]:
//!
//! ```text
//! before hooks → decoder → endpoint (wrapped in service middleware)
//!              → after hooks → encoder
//!
//! decoder / endpoint failure → error encoder
//! encoder failure            → error encoder if nothing was written yet,
//!                              otherwise logged and dropped
//! ```

use std::sync::Arc;

use http::header::{AUTHORIZATION, HOST, USER_AGENT};
use tracing::warn;

use crate::context::{
    Authorization, Context, InboundAppId, RemoteAddr, RequestHost, RequestMethod, RequestPath,
    RequestUri, UserAgent, XForwardedFor, XRequestId,
};
use crate::encoding::ErrorEncoder;
use crate::endpoint::{Decoder, Encoder, Endpoint};
use crate::handler::{BoxFuture, ErasedHandler};
use crate::request::Request;
use crate::response::{Response, ResponseWriter};

/// Header through which the platform names the application that sent a
/// request. Only the platform's front end can set it.
pub const INBOUND_APP_ID_HEADER: &str = "x-appengine-inbound-appid";

const X_REQUEST_ID: &str = "x-request-id";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

type BeforeFn = dyn Fn(Context, &Request) -> Context + Send + Sync;
type AfterFn = dyn Fn(Context, &mut ResponseWriter) -> Context + Send + Sync;

#[derive(Clone)]
enum Hook {
    Before(Arc<BeforeFn>),
    After(Arc<AfterFn>),
    ErrorEncoder(ErrorEncoder),
}

/// Customizes how an endpoint's transport runs.
///
/// Service-wide options come first, each endpoint's own options after them.
/// Hooks of one kind run in that order; for the error encoder the last one
/// given wins.
#[derive(Clone)]
pub struct ServerOption(Hook);

impl ServerOption {
    /// Runs before decoding. Receives the context built so far and the raw
    /// request; returns the context the rest of the request sees.
    pub fn before<F>(f: F) -> Self
    where
        F: Fn(Context, &Request) -> Context + Send + Sync + 'static,
    {
        Self(Hook::Before(Arc::new(f)))
    }

    /// Runs after the endpoint succeeded and before its envelope is encoded.
    pub fn after<F>(f: F) -> Self
    where
        F: Fn(Context, &mut ResponseWriter) -> Context + Send + Sync + 'static,
    {
        Self(Hook::After(Arc::new(f)))
    }

    /// Replaces the error encoder.
    pub fn error_encoder(encoder: ErrorEncoder) -> Self {
        Self(Hook::ErrorEncoder(encoder))
    }
}

/// Stores the inbound application id header under [`InboundAppId`]. Requests
/// without the header get an empty id.
pub fn inbound_app_id() -> ServerOption {
    ServerOption::before(|ctx, req| {
        let id = req.header(INBOUND_APP_ID_HEADER).unwrap_or_default();
        ctx.with(InboundAppId(id.to_owned()))
    })
}

/// Copies request metadata into the context: method, path, URI and remote
/// address always; host, authorization, user agent, request id and
/// forwarded-for when present.
pub fn populate_request_context() -> ServerOption {
    ServerOption::before(|mut ctx, req| {
        ctx.insert(RequestMethod(req.method().clone()));
        ctx.insert(RequestPath(req.path().to_owned()));
        ctx.insert(RequestUri(req.uri().clone()));
        if let Some(addr) = req.remote_addr() {
            ctx.insert(RemoteAddr::from(addr));
        }

        let host = req.header(HOST.as_str()).or_else(|| req.uri().host());
        if let Some(host) = host {
            ctx.insert(RequestHost(host.to_owned()));
        }
        if let Some(v) = req.header(AUTHORIZATION.as_str()) {
            ctx.insert(Authorization(v.to_owned()));
        }
        if let Some(v) = req.header(USER_AGENT.as_str()) {
            ctx.insert(UserAgent(v.to_owned()));
        }
        if let Some(v) = req.header(X_REQUEST_ID) {
            ctx.insert(XRequestId(v.to_owned()));
        }
        if let Some(v) = req.header(X_FORWARDED_FOR) {
            ctx.insert(XForwardedFor(v.to_owned()));
        }
        ctx
    })
}

/// The options every endpoint starts with, ahead of the service's own.
pub fn default_options() -> Vec<ServerOption> {
    vec![inbound_app_id(), populate_request_context()]
}

// ── EndpointServer ────────────────────────────────────────────────────────────

struct Inner {
    endpoint: Endpoint,
    decoder: Decoder,
    encoder: Encoder,
    before: Vec<Arc<BeforeFn>>,
    after: Vec<Arc<AfterFn>>,
    error_encoder: ErrorEncoder,
}

/// The raw-HTTP handler registered on the router for one endpoint.
#[derive(Clone)]
pub struct EndpointServer(Arc<Inner>);

impl EndpointServer {
    pub fn new(endpoint: Endpoint, decoder: Decoder, encoder: Encoder, options: Vec<ServerOption>) -> Self {
        let mut inner = Inner {
            endpoint,
            decoder,
            encoder,
            before: Vec::new(),
            after: Vec::new(),
            error_encoder: ErrorEncoder::default(),
        };
        for ServerOption(hook) in options {
            match hook {
                Hook::Before(f) => inner.before.push(f),
                Hook::After(f) => inner.after.push(f),
                Hook::ErrorEncoder(e) => inner.error_encoder = e,
            }
        }
        Self(Arc::new(inner))
    }
}

impl ErasedHandler for EndpointServer {
    fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        let inner = Arc::clone(&self.0);
        Box::pin(async move { inner.serve(req).await })
    }
}

impl Inner {
    async fn serve(&self, mut req: Request) -> Response {
        let mut ctx = std::mem::take(req.context_mut());
        for before in &self.before {
            ctx = before(ctx, &req);
        }
        req.set_context(ctx.clone());

        let mut w = ResponseWriter::new();

        let payload = match self.decoder.decode(ctx.clone(), req).await {
            Ok(payload) => payload,
            Err(err) => {
                self.error_encoder.encode(&ctx, err, &mut w);
                return w.into_response();
            }
        };

        let envelope = match self.endpoint.call(ctx.clone(), payload).await {
            Ok(envelope) => envelope,
            Err(err) => {
                self.error_encoder.encode(&ctx, err, &mut w);
                return w.into_response();
            }
        };

        for after in &self.after {
            ctx = after(ctx, &mut w);
        }

        if let Err(err) = self.encoder.encode(&ctx, &mut w, envelope) {
            if w.wrote_header() {
                warn!(error = %err, "failed encoding response after status was written");
            } else {
                self.error_encoder.encode(&ctx, err, &mut w);
            }
        }
        w.into_response()
    }
}
