//! Response envelopes.
//!
//! An [`Envelope`] is what every endpoint hands back: a payload, an optional
//! status code and optional headers. The payload carries the set of wire forms
//! it can be written in, decided by the constructor you pick:
//!
//! | Constructor | JSON | protobuf |
//! |---|---|---|
//! | [`Envelope::new`]   | yes | yes |
//! | [`Envelope::json`]  | yes | no  |
//! | [`Envelope::proto`] | no  | yes |
//! | [`Envelope::empty`] | yes | yes |
//!
//! Asking an envelope for a wire form its payload lacks is an
//! [`Error::WireMismatch`], never a silently empty body.
//!
//! Envelopes double as errors. Return one through the error channel and the
//! endpoint's error encoder writes it with its status code:
//!
//! ```rust,ignore
//! return Err(Envelope::new(Message { message: "bad request".into() })
//!     .with_status(StatusCode::BAD_REQUEST)
//!     .into());
//! ```

use std::fmt;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde::Serialize;

use crate::error::Error;

/// The serialization family of an endpoint's body.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WireForm {
    Json,
    Proto,
}

impl WireForm {
    /// The `Content-Type` written for this wire form.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json  => "application/json",
            Self::Proto => "application/octet-stream",
        }
    }
}

impl fmt::Display for WireForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json  => "JSON",
            Self::Proto => "protobuf",
        })
    }
}

// ── Payload capabilities ──────────────────────────────────────────────────────

trait JsonBody: Send + Sync {
    fn to_json(&self) -> serde_json::Result<Vec<u8>>;
}

impl<T: Serialize + Send + Sync> JsonBody for T {
    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

trait ProtoBody: Send + Sync {
    fn to_proto(&self) -> Vec<u8>;
}

impl<T: prost::Message> ProtoBody for T {
    fn to_proto(&self) -> Vec<u8> {
        self.encode_to_vec()
    }
}

trait DualBody: JsonBody + ProtoBody {}

impl<T: JsonBody + ProtoBody> DualBody for T {}

enum Body {
    Empty,
    Json(Box<dyn JsonBody>),
    Proto(Box<dyn ProtoBody>),
    Both(Box<dyn DualBody>),
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// A payload plus the status code and headers it should be written with.
pub struct Envelope {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Body,
}

impl Envelope {
    /// Wraps a payload that serializes both as JSON and as protobuf.
    pub fn new<T>(payload: T) -> Self
    where
        T: Serialize + prost::Message + 'static,
    {
        Self::with_body(Body::Both(Box::new(payload)))
    }

    /// Wraps a JSON-only payload.
    pub fn json<T>(payload: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        Self::with_body(Body::Json(Box::new(payload)))
    }

    /// Wraps a protobuf-only payload.
    pub fn proto<T: prost::Message + 'static>(payload: T) -> Self {
        Self::with_body(Body::Proto(Box::new(payload)))
    }

    /// An envelope without a body. Writes as a zero-length body in either
    /// wire form.
    pub fn empty() -> Self {
        Self::with_body(Body::Empty)
    }

    fn with_body(body: Body) -> Self {
        Self { status: None, headers: HeaderMap::new(), body }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Adds a header applied to the HTTP response. Repeated names overwrite.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// The status code to respond with; `200 OK` when none was set.
    pub fn status_code(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Human-readable description derived from the status code.
    pub fn description(&self) -> &'static str {
        self.status_code().canonical_reason().unwrap_or("Unknown Status")
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.body, Body::Empty)
    }

    /// Whether the payload can be written in `wire`.
    pub fn supports(&self, wire: WireForm) -> bool {
        match (&self.body, wire) {
            (Body::Empty | Body::Both(_), _) => true,
            (Body::Json(_), WireForm::Json) => true,
            (Body::Proto(_), WireForm::Proto) => true,
            _ => false,
        }
    }

    /// Serializes the payload as JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, Error> {
        match &self.body {
            Body::Empty => Ok(Vec::new()),
            Body::Json(b) => Ok(b.to_json()?),
            Body::Both(b) => Ok(b.to_json()?),
            Body::Proto(_) => Err(Error::WireMismatch(WireForm::Json)),
        }
    }

    /// Serializes the payload as binary protobuf.
    pub fn to_proto(&self) -> Result<Vec<u8>, Error> {
        match &self.body {
            Body::Empty => Ok(Vec::new()),
            Body::Proto(b) => Ok(b.to_proto()),
            Body::Both(b) => Ok(b.to_proto()),
            Body::Json(_) => Err(Error::WireMismatch(WireForm::Proto)),
        }
    }

    /// Serializes the payload in `wire`.
    pub fn encode(&self, wire: WireForm) -> Result<Vec<u8>, Error> {
        match wire {
            WireForm::Json  => self.to_json(),
            WireForm::Proto => self.to_proto(),
        }
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match self.body {
            Body::Empty   => "empty",
            Body::Json(_) => "json",
            Body::Proto(_) => "proto",
            Body::Both(_) => "json+proto",
        };
        f.debug_struct("Envelope")
            .field("status", &self.status_code())
            .field("headers", &self.headers)
            .field("body", &body)
            .finish()
    }
}
