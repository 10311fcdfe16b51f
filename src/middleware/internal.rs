use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;

use crate::context::{AppId, InboundAppId};
use crate::endpoint::Endpoint;
use crate::envelope::Envelope;

/// Builds the response a middleware rejects a request with. A fresh
/// envelope is made for every rejected request.
#[derive(Clone)]
pub struct Denial(Arc<dyn Fn() -> Envelope + Send + Sync>);

impl Denial {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Envelope + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn envelope(&self) -> Envelope {
        (self.0)()
    }
}

/// `401 Unauthorized` with the JSON body `{"msg":"unauthorized"}`.
impl Default for Denial {
    fn default() -> Self {
        Self::new(|| {
            Envelope::json(HashMap::from([("msg", "unauthorized")]))
                .with_status(StatusCode::UNAUTHORIZED)
        })
    }
}

/// Restricts `next` to service-to-service calls from `app_id`.
///
/// The platform stamps the calling application's id on the inbound app id
/// header, which the default before hook copies into [`InboundAppId`].
/// Requests whose id differs from `app_id` fail with the denial.
pub fn internal(next: Endpoint, app_id: impl Into<String>, denial: Denial) -> Endpoint {
    let app_id: Arc<str> = app_id.into().into();
    Endpoint::from_fn(move |ctx, req| {
        let next = next.clone();
        let allowed = ctx.get::<InboundAppId>().is_some_and(|id| *id.0 == *app_id);
        let denial = denial.clone();
        async move {
            if !allowed {
                return Err(denial.envelope().into());
            }
            next.call(ctx, req).await
        }
    })
}

/// Like [`internal`], with the allowed id taken from the request's own
/// [`AppId`], so only the application itself may call `next`. Requests
/// without a non-empty [`AppId`] in their context are denied.
pub fn internal_self(next: Endpoint, denial: Denial) -> Endpoint {
    Endpoint::from_fn(move |ctx, req| {
        let next = next.clone();
        let allowed = match (ctx.get::<AppId>(), ctx.get::<InboundAppId>()) {
            (Some(own), Some(inbound)) => !own.0.is_empty() && own.0 == inbound.0,
            _ => false,
        };
        let denial = denial.clone();
        async move {
            if !allowed {
                return Err(denial.envelope().into());
            }
            next.call(ctx, req).await
        }
    })
}
