//! Endpoint descriptors.
//!
//! An [`HttpEndpoint`] bundles what the server needs to host one
//! (method, path) pair:
//!
//! - an [`Endpoint`]: the business function, context + decoded request to
//!   [`Envelope`] or [`Error`];
//! - an optional [`Decoder`]: context + raw [`Request`] to decoded request.
//!   Without one the endpoint receives the raw `Request` itself;
//! - an optional [`Encoder`]: writes the envelope. Without one the catalog's
//!   wire form decides ([`Encoder::json`] or [`Encoder::proto`]);
//! - per-endpoint [`ServerOption`]s, applied after the service-wide ones.
//!
//! Decoded requests travel between decoder, middleware and endpoint as a
//! type-erased [`Payload`]. [`Endpoint::new`] and [`Decoder::new`] hide the
//! erasure behind ordinary typed closures.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::context::Context;
use crate::encoding;
use crate::envelope::{Envelope, WireForm};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::method::Method;
use crate::request::Request;
use crate::response::ResponseWriter;
use crate::transport::ServerOption;

/// Endpoints of one wire form: path → method → descriptor.
pub type Catalog = HashMap<String, HashMap<Method, HttpEndpoint>>;

// ── Payload ───────────────────────────────────────────────────────────────────

/// A decoded request on its way to an endpoint.
pub struct Payload(Box<dyn Any + Send>);

impl Payload {
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.0.is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Unwraps the payload as a `T`, handing it back unchanged on mismatch.
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        self.0.downcast::<T>().map(|b| *b).map_err(Self)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Payload(..)")
    }
}

// ── Endpoint ──────────────────────────────────────────────────────────────────

type EndpointFn = dyn Fn(Context, Payload) -> BoxFuture<'static, Result<Envelope, Error>> + Send + Sync;

/// The business function of an endpoint. Cheap to clone.
///
/// Decoded-endpoint middleware takes an `Endpoint` and returns a new one
/// wrapping it:
///
/// ```rust,ignore
/// fn middleware(&self, next: Endpoint) -> Endpoint {
///     Endpoint::from_fn(move |ctx, req| {
///         let next = next.clone();
///         async move {
///             if ctx.get::<User>().is_none() {
///                 return Err(Envelope::json("no user").with_status(StatusCode::UNAUTHORIZED).into());
///             }
///             next.call(ctx, req).await
///         }
///     })
/// }
/// ```
#[derive(Clone)]
pub struct Endpoint(Arc<EndpointFn>);

impl Endpoint {
    /// Wraps a typed business function.
    ///
    /// The decoded request is downcast to `Req`; any other type fails the
    /// request with [`Error::RequestType`].
    pub fn new<F, Fut, Req>(f: F) -> Self
    where
        F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope, Error>> + Send + 'static,
        Req: Send + 'static,
    {
        Self::from_fn(move |ctx, payload: Payload| {
            let req = payload.downcast::<Req>();
            let fut = req.map(|req| f(ctx, req));
            async move {
                match fut {
                    Ok(fut) => fut.await,
                    Err(_) => Err(Error::RequestType { expected: type_name::<Req>() }),
                }
            }
        })
    }

    /// Wraps a function working on the erased [`Payload`] directly.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope, Error>> + Send + 'static,
    {
        Self(Arc::new(
            move |ctx: Context, payload: Payload| -> BoxFuture<'static, Result<Envelope, Error>> {
                Box::pin(f(ctx, payload))
            },
        ))
    }

    pub fn call(&self, ctx: Context, req: Payload) -> BoxFuture<'static, Result<Envelope, Error>> {
        (self.0)(ctx, req)
    }
}

// ── Decoder ───────────────────────────────────────────────────────────────────

type DecoderFn = dyn Fn(Context, Request) -> BoxFuture<'static, Result<Payload, Error>> + Send + Sync;

/// Turns a raw request into the value its endpoint expects.
#[derive(Clone)]
pub struct Decoder(Arc<DecoderFn>);

impl Decoder {
    pub fn new<F, Fut, T>(f: F) -> Self
    where
        F: Fn(Context, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
        T: Send + 'static,
    {
        Self(Arc::new(
            move |ctx: Context, req: Request| -> BoxFuture<'static, Result<Payload, Error>> {
                let fut = f(ctx, req);
                Box::pin(async move { fut.await.map(Payload::new) })
            },
        ))
    }

    /// Hands the raw [`Request`] through unchanged.
    pub fn identity() -> Self {
        Self::new(|_ctx, req: Request| async move { Ok(req) })
    }

    pub fn decode(&self, ctx: Context, req: Request) -> BoxFuture<'static, Result<Payload, Error>> {
        (self.0)(ctx, req)
    }
}

// ── Encoder ───────────────────────────────────────────────────────────────────

type EncoderFn = dyn Fn(&Context, &mut ResponseWriter, Envelope) -> Result<(), Error> + Send + Sync;

/// Writes an endpoint's envelope into the response.
#[derive(Clone)]
pub struct Encoder(Arc<EncoderFn>);

impl Encoder {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context, &mut ResponseWriter, Envelope) -> Result<(), Error> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// The JSON catalog's default: [`encoding::encode_json_response`].
    pub fn json() -> Self {
        Self::new(encoding::encode_json_response)
    }

    /// The protobuf catalog's default: [`encoding::encode_proto_response`].
    pub fn proto() -> Self {
        Self::new(encoding::encode_proto_response)
    }

    /// The default encoder of a catalog written in `wire`.
    pub fn for_wire(wire: WireForm) -> Self {
        match wire {
            WireForm::Json  => Self::json(),
            WireForm::Proto => Self::proto(),
        }
    }

    pub fn encode(&self, ctx: &Context, w: &mut ResponseWriter, env: Envelope) -> Result<(), Error> {
        (self.0)(ctx, w, env)
    }
}

// ── HttpEndpoint ──────────────────────────────────────────────────────────────

/// Everything required to host one endpoint on the server.
#[derive(Clone)]
pub struct HttpEndpoint {
    pub endpoint: Endpoint,
    pub decoder: Option<Decoder>,
    pub encoder: Option<Encoder>,
    pub options: Vec<ServerOption>,
}

impl HttpEndpoint {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint, decoder: None, encoder: None, options: Vec::new() }
    }

    pub fn decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn encoder(mut self, encoder: Encoder) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn option(mut self, option: ServerOption) -> Self {
        self.options.push(option);
        self
    }
}

impl From<Endpoint> for HttpEndpoint {
    fn from(endpoint: Endpoint) -> Self {
        Self::new(endpoint)
    }
}
