//! Default encoders and error encoders.
//!
//! Both default encoders follow the same rules:
//!
//! 1. refuse an envelope that cannot be written in their wire form, before
//!    anything reaches the writer;
//! 2. set `Content-Type` (`application/json` or `application/octet-stream`);
//! 3. copy the envelope's headers;
//! 4. commit the envelope's status (`200` when unset);
//! 5. stop there for `204 No Content`, otherwise write the serialized body.
//!
//! Error encoders decide how a failed request is written. The
//! [`default_error_encoder`] writes envelopes in whichever wire form their
//! payload supports, preferring JSON. Services that expose the same envelope
//! type on `.json` and `.proto` routes can opt into [`suffix_error_encoder`].

use std::sync::Arc;

use http::header::{CONTENT_TYPE, HeaderValue};
use http::StatusCode;
use tracing::{debug, error, warn};

use crate::context::{Context, RequestPath};
use crate::envelope::{Envelope, WireForm};
use crate::error::Error;
use crate::response::ResponseWriter;

/// Serializes the envelope as JSON.
pub fn encode_json_response(_ctx: &Context, w: &mut ResponseWriter, env: Envelope) -> Result<(), Error> {
    encode_response(w, env, WireForm::Json)
}

/// Serializes the envelope as binary protobuf. Envelopes built with
/// [`Envelope::json`] fail with [`Error::WireMismatch`].
pub fn encode_proto_response(_ctx: &Context, w: &mut ResponseWriter, env: Envelope) -> Result<(), Error> {
    encode_response(w, env, WireForm::Proto)
}

/// Writes `env` in `wire`.
pub fn encode_response(w: &mut ResponseWriter, env: Envelope, wire: WireForm) -> Result<(), Error> {
    if !env.supports(wire) {
        return Err(Error::WireMismatch(wire));
    }

    let headers = w.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(wire.content_type()));
    for name in env.headers().keys() {
        headers.remove(name);
    }
    for (name, value) in env.headers() {
        headers.append(name.clone(), value.clone());
    }

    let code = env.status_code();
    w.write_header(code);
    if code == StatusCode::NO_CONTENT {
        return Ok(());
    }

    let body = env.encode(wire)?;
    w.write(&body);
    Ok(())
}

// ── Error encoders ────────────────────────────────────────────────────────────

type ErrorEncoderFn = dyn Fn(&Context, Error, &mut ResponseWriter) + Send + Sync;

/// Writes a failed request's response.
#[derive(Clone)]
pub struct ErrorEncoder(Arc<ErrorEncoderFn>);

impl ErrorEncoder {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context, Error, &mut ResponseWriter) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn encode(&self, ctx: &Context, err: Error, w: &mut ResponseWriter) {
        (self.0)(ctx, err, w)
    }
}

impl Default for ErrorEncoder {
    fn default() -> Self {
        Self::new(default_error_encoder)
    }
}

/// Envelopes are written with their own status, as JSON when the payload
/// supports it and as protobuf otherwise. Any other error becomes a
/// `text/plain` response carrying [`Error::status_code`]; server errors
/// only ever show the canonical reason phrase.
pub fn default_error_encoder(_ctx: &Context, err: Error, w: &mut ResponseWriter) {
    match err {
        Error::Status(env) => {
            let wire = if env.supports(WireForm::Json) { WireForm::Json } else { WireForm::Proto };
            write_error_envelope(w, *env, wire);
        }
        other => write_plain_error(w, &other),
    }
}

/// Chooses the wire form from the request path: `.json` paths get JSON,
/// everything else protobuf.
pub fn suffix_error_encoder() -> ErrorEncoder {
    ErrorEncoder::new(|ctx, err, w| {
        let wire = ctx.get::<RequestPath>()
            .map(|p| wire_for_path(&p.0))
            .unwrap_or(WireForm::Proto);
        match err {
            Error::Status(env) => write_error_envelope(w, *env, wire),
            other => write_plain_error(w, &other),
        }
    })
}

/// The wire form a path's suffix asks for.
pub fn wire_for_path(path: &str) -> WireForm {
    if path.ends_with(".json") { WireForm::Json } else { WireForm::Proto }
}

fn write_error_envelope(w: &mut ResponseWriter, env: Envelope, wire: WireForm) {
    if let Err(err) = encode_response(w, env, wire) {
        if w.wrote_header() {
            warn!(error = %err, "failed writing error response body");
        } else {
            write_plain_error(w, &err);
        }
    }
}

fn write_plain_error(w: &mut ResponseWriter, err: &Error) {
    let status = err.status_code();
    let body = if status.is_server_error() {
        error!(error = %err, %status, "request failed");
        status.canonical_reason().unwrap_or_default().to_owned()
    } else {
        debug!(error = %err, %status, "request rejected");
        err.to_string()
    };
    w.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    w.write_header(status);
    w.write(body.as_bytes());
}
