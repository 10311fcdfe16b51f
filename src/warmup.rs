//! The platform's warmup request.
//!
//! Before routing live traffic to a new instance the platform sends
//! `GET /_ah/warmup` and waits for it to return. A service that needs to
//! prime caches or open connections first registers its own endpoint on that
//! path in either catalog; otherwise the server installs [`warmup`].

use http::StatusCode;

use crate::{Request, Response};

/// Path of the platform's warmup request.
pub const WARMUP_PATH: &str = "/_ah/warmup";

/// Default warmup handler: `200 OK`, empty body.
pub async fn warmup(_req: Request) -> Response {
    Response::status(StatusCode::OK)
}
