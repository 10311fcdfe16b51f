//! HTTP server: endpoint registration, dispatch, and graceful shutdown.
//!
//! # Registration
//!
//! [`Server::new`] consumes a [`Service`] once:
//!
//! 1. builds the router from the service's router options;
//! 2. walks the JSON catalog, then the protobuf catalog, filling in each
//!    endpoint's defaults (identity decoder, the catalog's encoder, default
//!    options ahead of the service's and the endpoint's own) and registering
//!    an [`EndpointServer`] under its method and path;
//! 3. installs the default [`warmup`] handler unless a catalog claimed
//!    `GET /_ah/warmup`;
//! 4. wraps the finished router in the service's raw-HTTP middleware.
//!
//! # Dispatch
//!
//! ```text
//! platform context → http middleware → router → decoder
//!     → endpoint middleware → endpoint → encoder
//! ```
//!
//! # Graceful shutdown and the platform
//!
//! When the platform stops an instance it sends **SIGTERM** and waits before
//! killing the process. The server reacts by:
//! 1. Immediately stopping `listener.accept()`, so no new connections are made.
//! 2. Letting every in-flight connection task run to completion.
//! 3. Returning from [`Server::serve`], which lets `main` exit cleanly.

use std::net::SocketAddr;
use std::sync::Arc;

use http::StatusCode;
use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::endpoint::{Decoder, Encoder};
use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, boxed};
use crate::method::Method;
use crate::platform;
use crate::request::Request;
use crate::response::Response;
use crate::router::{self, Router, RouterOption};
use crate::service::{self, Capability, Service};
use crate::transport::{self, EndpointServer};
use crate::warmup::{WARMUP_PATH, warmup};

/// Hosts one [`Service`].
pub struct Server {
    handler: BoxedHandler,
    capability: Capability,
}

impl Server {
    /// Registers every endpoint of `svc` on a fresh router.
    ///
    /// Fails with [`Error::Capability`] when the service offers no catalog
    /// and with [`Error::Route`] when the router rejects a path.
    pub fn new(svc: impl Service) -> Result<Self, Error> {
        Self::build(&svc, svc.router_options())
    }

    /// Like [`Server::new`], letting `config.router` pick the backend. The
    /// configured name replaces the service's own [`router::router_select`]
    /// steps; its other router options still run after that selection.
    pub fn with_config(svc: impl Service, config: &Config) -> Result<Self, Error> {
        let opts = match &config.router {
            Some(name) => router::override_select(name, svc.router_options()),
            None => svc.router_options(),
        };
        Self::build(&svc, opts)
    }

    fn build(svc: &dyn Service, router_options: Vec<RouterOption>) -> Result<Self, Error> {
        let (capability, catalogs) = service::catalogs(svc)?;
        let mut router = router::build(router_options);

        let mut options = transport::default_options();
        options.extend(svc.options());

        let mut has_warmup = false;
        for (wire, catalog) in catalogs {
            for (path, methods) in catalog {
                for (method, ep) in methods {
                    has_warmup |= method == Method::Get && path == WARMUP_PATH;

                    let endpoint = svc.middleware(ep.endpoint);
                    let decoder = ep.decoder.unwrap_or_else(Decoder::identity);
                    let encoder = ep.encoder.unwrap_or_else(|| Encoder::for_wire(wire));
                    let opts = options.iter().cloned().chain(ep.options).collect();

                    let handler = EndpointServer::new(endpoint, decoder, encoder, opts);
                    router.handle(method, &path, Arc::new(handler))?;
                    debug!(%method, %path, %wire, "registered endpoint");
                }
            }
        }

        if !has_warmup {
            router.handle(Method::Get, WARMUP_PATH, boxed(warmup))?;
        }

        let handler = svc.http_middleware(Arc::new(RouterHandler(router)));
        Ok(Self { handler, capability })
    }

    /// Which catalogs the hosted service offered.
    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Runs one request through the full pipeline, starting with a fresh
    /// context from the [platform factory](crate::platform).
    pub async fn handle(&self, mut req: Request) -> Response {
        req.set_context(platform::new_context(&req));
        self.handler.call(req).await
    }

    /// Starts accepting connections on `addr`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, addr: SocketAddr) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;

        // Shared across connection tasks; the router is read-only from here on.
        let server = Arc::new(self);

        info!(%addr, capability = %server.capability, "perch listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown is checked first so SIGTERM stops accepting at once.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let server = Arc::clone(&server);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let server = Arc::clone(&server);
                            async move { dispatch(server, req, remote_addr).await }
                        });

                        // HTTP/1.1 or HTTP/2, whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("perch stopped");
        Ok(())
    }
}

/// Hosts `svc` on the address from [`Config::from_env`] until shutdown.
pub async fn run(svc: impl Service) -> Result<(), Error> {
    let config = Config::from_env()?;
    Server::with_config(svc, &config)?.serve(config.addr()).await
}

/// The router as the innermost raw-HTTP handler.
struct RouterHandler(Box<dyn Router>);

impl ErasedHandler for RouterHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        self.0.serve(req)
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Buffers the body and hands the request to the pipeline. Failures are
/// answered in-band, so hyper never sees an error.
async fn dispatch(
    server: Arc<Server>,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<http_body_util::Full<bytes::Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, "failed reading request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
    };

    let req = Request::new(http::Request::from_parts(parts, body)).with_remote_addr(remote_addr);
    Ok(server.handle(req).await.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives: SIGTERM from
/// the platform or SIGINT (Ctrl-C) locally. On Windows only Ctrl-C exists.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use bytes::Bytes;
    use http::header::CONTENT_TYPE;
    use serde::Serialize;

    use crate::context::{Context, RequestPath};
    use crate::encoding::suffix_error_encoder;
    use crate::endpoint::{Catalog, Endpoint, HttpEndpoint};
    use crate::envelope::Envelope;
    use crate::testing;
    use crate::transport::ServerOption;

    #[derive(Clone, PartialEq, prost::Message, Serialize)]
    struct Note {
        #[prost(string, tag = "1")]
        #[serde(rename = "Note")]
        note: String,
    }

    fn note(text: &str) -> Note {
        Note { note: text.into() }
    }

    fn catalog(entries: Vec<(&str, Method, HttpEndpoint)>) -> Catalog {
        let mut catalog = Catalog::new();
        for (path, method, ep) in entries {
            catalog.entry(path.to_owned()).or_insert_with(HashMap::new).insert(method, ep);
        }
        catalog
    }

    fn request(method: http::Method, uri: &str) -> Request {
        Request::new(http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap())
    }

    /// Echoes the path of the raw request the endpoint received.
    fn raw_path() -> HttpEndpoint {
        Endpoint::new(|_ctx, req: Request| async move {
            Ok(Envelope::new(note(req.path())))
        })
        .into()
    }

    fn teapot() -> HttpEndpoint {
        Endpoint::new(|_ctx, _req: Request| async {
            Err::<Envelope, _>(Envelope::new(note("short and stout")).with_status(StatusCode::IM_A_TEAPOT).into())
        })
        .into()
    }

    #[derive(Default)]
    struct TestService {
        json: Option<Catalog>,
        proto: Option<Catalog>,
        options: Vec<ServerOption>,
        router: Option<&'static str>,
        not_found: Option<&'static str>,
    }

    impl Service for TestService {
        fn options(&self) -> Vec<ServerOption> {
            self.options.clone()
        }

        fn router_options(&self) -> Vec<RouterOption> {
            let mut opts: Vec<RouterOption> = self.router.map(router::router_select).into_iter().collect();
            if let Some(body) = self.not_found {
                let handler = boxed(move |_req: Request| async move {
                    Response::builder().status(StatusCode::NOT_FOUND).text(body)
                });
                opts.push(router::router_not_found(handler));
            }
            opts
        }

        fn json_endpoints(&self) -> Option<Catalog> {
            self.json.clone()
        }

        fn proto_endpoints(&self) -> Option<Catalog> {
            self.proto.clone()
        }
    }

    fn mixed() -> TestService {
        TestService {
            json: Some(catalog(vec![
                ("/echo.json", Method::Get, raw_path()),
                ("/tea.json", Method::Get, teapot()),
            ])),
            proto: Some(catalog(vec![
                ("/echo.proto", Method::Get, raw_path()),
                ("/tea.proto", Method::Get, teapot()),
            ])),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn catalogs_get_their_default_encoder_and_identity_decoder() {
        let server = Server::new(mixed()).unwrap();
        assert_eq!(server.capability(), Capability::Mixed);

        let res = server.handle(request(http::Method::GET, "/echo.json")).await;
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(res.body().as_ref(), br#"{"Note":"/echo.json"}"#);

        let res = server.handle(request(http::Method::GET, "/echo.proto")).await;
        assert_eq!(res.headers()[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(res.body().as_ref(), prost::Message::encode_to_vec(&note("/echo.proto")));
    }

    #[tokio::test]
    async fn warmup_is_installed_by_default() {
        let server = Server::new(mixed()).unwrap();
        let res = server.handle(request(http::Method::GET, WARMUP_PATH)).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.body().is_empty());
    }

    #[tokio::test]
    async fn a_catalogued_warmup_wins() {
        let svc = TestService {
            proto: Some(catalog(vec![(WARMUP_PATH, Method::Get, raw_path())])),
            ..Default::default()
        };
        let server = Server::new(svc).unwrap();
        let res = server.handle(request(http::Method::GET, WARMUP_PATH)).await;
        assert_eq!(res.body().as_ref(), prost::Message::encode_to_vec(&note(WARMUP_PATH)));
    }

    #[tokio::test]
    async fn status_codes_survive_both_wire_forms() {
        let server = Server::new(mixed()).unwrap();
        for path in ["/tea.json", "/tea.proto"] {
            let res = server.handle(request(http::Method::GET, path)).await;
            assert_eq!(res.status_code(), StatusCode::IM_A_TEAPOT, "{path}");
        }
    }

    #[tokio::test]
    async fn suffix_error_encoder_routes_by_path() {
        let svc = TestService {
            options: vec![ServerOption::error_encoder(suffix_error_encoder())],
            ..mixed()
        };
        let server = Server::new(svc).unwrap();

        let res = server.handle(request(http::Method::GET, "/tea.json")).await;
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(res.body().as_ref(), br#"{"Note":"short and stout"}"#);

        let res = server.handle(request(http::Method::GET, "/tea.proto")).await;
        assert_eq!(res.headers()[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(res.body().as_ref(), prost::Message::encode_to_vec(&note("short and stout")));
    }

    #[tokio::test]
    async fn method_mismatch_is_not_found() {
        for backend in [router::RADIX, router::REGEX, router::MUX] {
            let server = Server::new(TestService { router: Some(backend), ..mixed() }).unwrap();
            let res = server.handle(request(http::Method::POST, "/echo.json")).await;
            assert_eq!(res.status_code(), StatusCode::NOT_FOUND, "{backend}");
        }
    }

    #[tokio::test]
    async fn unknown_router_name_behaves_like_the_default() {
        let server = Server::new(TestService { router: Some("gorilla"), ..mixed() }).unwrap();
        let res = server.handle(request(http::Method::GET, "/echo.json")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
    }

    fn with_router(backend: &'static str) -> Config {
        Config { router: Some(backend.to_owned()), ..Config::default() }
    }

    #[tokio::test]
    async fn configured_router_overrides_the_service_selection() {
        // The service asks for radix with a custom not-found handler; mux
        // from the config wins and keeps its built-in 404 body.
        let svc = TestService { router: Some(router::RADIX), not_found: Some("gone"), ..mixed() };
        let server = Server::with_config(svc, &with_router(router::MUX)).unwrap();
        let res = server.handle(request(http::Method::GET, "/missing")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.body().as_ref(), b"404 page not found\n");

        let res = server.handle(request(http::Method::GET, "/echo.json")).await;
        assert_eq!(res.body().as_ref(), br#"{"Note":"/echo.json"}"#);
    }

    #[tokio::test]
    async fn configured_router_keeps_later_not_found_steps() {
        let svc = TestService { router: Some(router::MUX), not_found: Some("gone"), ..mixed() };
        let server = Server::with_config(svc, &with_router(router::REGEX)).unwrap();
        let res = server.handle(request(http::Method::GET, "/missing")).await;
        assert_eq!(res.body().as_ref(), b"gone");
    }

    #[tokio::test]
    async fn default_config_keeps_the_service_selection() {
        let svc = TestService { router: Some(router::MUX), not_found: Some("gone"), ..mixed() };
        let server = Server::with_config(svc, &Config::default()).unwrap();
        let res = server.handle(request(http::Method::GET, "/missing")).await;
        assert_eq!(res.body().as_ref(), b"404 page not found\n");
    }

    #[test]
    fn a_service_without_catalogs_is_rejected() {
        assert!(matches!(Server::new(TestService::default()), Err(Error::Capability)));
    }

    #[test]
    fn bad_patterns_fail_registration() {
        let svc = TestService {
            json: Some(catalog(vec![("no-leading-slash", Method::Get, raw_path())])),
            ..Default::default()
        };
        assert!(matches!(Server::new(svc), Err(Error::Route { .. })));
    }

    #[tokio::test]
    async fn the_factory_context_reaches_endpoints() {
        #[derive(Clone)]
        struct Tenant(&'static str);

        let endpoint = Endpoint::new(|ctx: Context, _req: Request| async move {
            let tenant = ctx.get::<Tenant>().map(|t| t.0).unwrap_or("none");
            let path = ctx.get::<RequestPath>().map(|p| p.0.clone()).unwrap_or_default();
            Ok(Envelope::json(format!("{tenant} {path}")))
        });
        let svc = TestService {
            json: Some(catalog(vec![("/who.json", Method::Get, endpoint.into())])),
            ..Default::default()
        };
        let server = Server::new(svc).unwrap();

        let _guard = testing::install_fixture(Context::new().with(Tenant("acme")));
        let res = server.handle(request(http::Method::GET, "/who.json")).await;
        assert_eq!(res.body().as_ref(), br#""acme /who.json""#);
    }
}
