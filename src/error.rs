//! Unified error type.

use http::StatusCode;

use crate::envelope::{Envelope, WireForm};

/// The error type travelling through perch's registration and request
/// pipelines.
///
/// Two families share this type. Startup failures ([`Error::Capability`],
/// [`Error::Route`], [`Error::Io`]) come out of [`Server::new`](crate::Server::new)
/// and [`Server::serve`](crate::Server::serve). Everything else is produced by
/// decoders, endpoints and encoders while a request is in flight and ends up
/// in the endpoint's error encoder.
///
/// An [`Envelope`] returned as an error is an explicit, well-formed response
/// with a chosen status code: convert it with `?` or `.into()`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value perch cannot use.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The service presented neither a JSON nor a protobuf endpoint catalog.
    #[error("services for servers must provide a JSON or a protobuf endpoint catalog")]
    Capability,

    /// A router backend rejected a route pattern.
    #[error("invalid route `{path}`: {reason}")]
    Route { path: String, reason: String },

    #[error("response does not implement {0}")]
    WireMismatch(WireForm),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protobuf: {0}")]
    ProtoDecode(#[from] prost::DecodeError),

    /// A response envelope surfaced as a failure. Displays as the canonical
    /// reason phrase of its status code.
    #[error("{}", .0.description())]
    Status(Box<Envelope>),

    /// An endpoint received a decoded request of a type it cannot handle.
    #[error("endpoint expected a request of type `{expected}`")]
    RequestType { expected: &'static str },

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps any error as [`Error::Other`].
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Other(err.into())
    }

    /// The envelope carried by this error, if it is one.
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Status(env) => Some(env),
            _ => None,
        }
    }

    /// The HTTP status the default error encoder answers with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Status(env) => env.status_code(),
            Self::Json(_) | Self::ProtoDecode(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Envelope> for Error {
    fn from(env: Envelope) -> Self {
        Self::Status(Box::new(env))
    }
}
