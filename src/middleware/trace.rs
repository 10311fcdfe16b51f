use std::sync::Arc;
use std::time::Instant;

use tracing::{Instrument, field, info, info_span};

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::Response;

struct Trace {
    next: BoxedHandler,
}

/// Runs every request inside an `info` span carrying its method and path,
/// then records the status and latency on it.
pub fn trace(next: BoxedHandler) -> BoxedHandler {
    Arc::new(Trace { next })
}

impl ErasedHandler for Trace {
    fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        let span = info_span!(
            "request",
            method = %req.method(),
            path = %req.path(),
            status = field::Empty,
            latency_ms = field::Empty,
        );
        let start = Instant::now();
        let fut = self.next.call(req);

        Box::pin(
            async move {
                let res = fut.await;
                let span = tracing::Span::current();
                span.record("status", res.status_code().as_u16());
                span.record("latency_ms", start.elapsed().as_millis() as u64);
                info!("request complete");
                res
            }
            .instrument(span),
        )
    }
}
