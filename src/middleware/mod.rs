//! Packaged middleware.
//!
//! Two kinds, matching the two middleware slots of a [`Service`](crate::Service):
//!
//! | Middleware | Slot | Purpose |
//! |---|---|---|
//! | [`cors`] | raw HTTP | CORS headers, blanket `200` for every OPTIONS request |
//! | [`trace`] | raw HTTP | one `info` span per request with status and latency |
//! | [`internal`] | endpoint | only the named application may call |
//! | [`internal_self`] | endpoint | only the application itself may call, id from the context |
//! | [`allow_ip_nets`] | endpoint | only callers inside the given CIDR blocks |
//!
//! Raw-HTTP middleware wraps a [`BoxedHandler`](crate::handler::BoxedHandler),
//! endpoint middleware wraps an [`Endpoint`](crate::Endpoint):
//!
//! ```rust,ignore
//! fn http_middleware(&self, next: BoxedHandler) -> BoxedHandler {
//!     middleware::trace(middleware::cors(next, ".example.com"))
//! }
//!
//! fn middleware(&self, next: Endpoint) -> Endpoint {
//!     middleware::internal(next, "my-app", Denial::default())
//! }
//! ```

mod cors;
mod internal;
mod ipnet;
mod trace;

pub use self::cors::cors;
pub use self::internal::{Denial, internal, internal_self};
pub use self::ipnet::{IpNet, allow_ip_nets, parse_ip_nets};
pub use self::trace::trace;
