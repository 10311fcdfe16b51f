//! # perch
//!
//! Endpoint registration and dispatch for HTTP services on a managed
//! serverless platform.
//!
//! A service declares its endpoints in one or two catalogs, JSON and binary
//! protobuf, and perch does the rest: registers them on a selectable router,
//! gives every request a platform context, runs the service's middleware, and
//! writes responses in the catalog's wire form.
//!
//! ## The contract
//!
//! The platform's front end owns TLS, scaling and request-size limits. perch
//! owns the part that changes between applications:
//!
//! - Routing behind a small [`Router`] trait: `radix` (default), `regex`, `mux`
//! - Decoding, endpoint middleware, business logic and encoding per endpoint
//! - [`Envelope`] responses that carry a status code in either wire form and
//!   double as errors
//! - Graceful shutdown on SIGTERM / Ctrl-C, draining in-flight requests
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//!
//! use perch::{Catalog, Endpoint, Envelope, Method, Request, Service};
//!
//! struct Hello;
//!
//! impl Service for Hello {
//!     fn json_endpoints(&self) -> Option<Catalog> {
//!         let hello = Endpoint::new(|_ctx, req: Request| async move {
//!             let name = req.query("name").unwrap_or_else(|| "world".into());
//!             Ok(Envelope::json(format!("hello, {name}")))
//!         });
//!         Some(Catalog::from([
//!             ("/hello.json".to_owned(), HashMap::from([(Method::Get, hello.into())])),
//!         ]))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), perch::Error> {
//!     perch::run(Hello).await
//! }
//! ```

mod config;
mod context;
mod endpoint;
mod envelope;
mod error;
mod method;
mod request;
mod response;
mod server;
mod service;
mod transport;

pub mod encoding;
pub mod handler;
pub mod middleware;
pub mod platform;
pub mod router;
pub mod testing;
pub mod warmup;

pub use config::Config;
pub use context::{
    AppId, Authorization, Context, InboundAppId, RemoteAddr, RequestHost, RequestMethod,
    RequestPath, RequestUri, RouteVars, TraceId, UserAgent, XForwardedFor, XRequestId,
};
pub use endpoint::{Catalog, Decoder, Encoder, Endpoint, HttpEndpoint, Payload};
pub use envelope::{Envelope, WireForm};
pub use error::Error;
pub use handler::{BoxedHandler, Handler};
pub use method::{Method, UnknownMethod};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder, ResponseWriter};
pub use router::{Router, RouterOption, vars};
pub use server::{Server, run};
pub use service::{Capability, Service};
pub use transport::{
    EndpointServer, INBOUND_APP_ID_HEADER, ServerOption, default_options, inbound_app_id,
    populate_request_context,
};
