use std::sync::Arc;

use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue, ORIGIN,
};
use http::StatusCode;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::Response;

const ALLOW_HEADERS: &str = "Content-Type, x-requested-by, *";
const ALLOW_METHODS: &str = "GET, PUT, POST, DELETE, OPTIONS";

struct Cors {
    next: BoxedHandler,
    origin_suffix: String,
}

/// Adds CORS headers for requests whose `Origin` ends with `origin_suffix`
/// (any origin when the suffix is empty). Requests without an `Origin` get no
/// CORS headers.
///
/// Every OPTIONS request is answered `200` right here, without reaching the
/// router.
pub fn cors(next: BoxedHandler, origin_suffix: impl Into<String>) -> BoxedHandler {
    Arc::new(Cors { next, origin_suffix: origin_suffix.into() })
}

impl Cors {
    fn allowed_origin(&self, req: &Request) -> Option<HeaderValue> {
        let origin = req.headers().get(ORIGIN)?;
        let text = origin.to_str().ok()?;
        (!text.is_empty() && text.ends_with(self.origin_suffix.as_str())).then(|| origin.clone())
    }
}

impl ErasedHandler for Cors {
    fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        let origin = self.allowed_origin(&req);
        let preflight = req.method() == http::Method::OPTIONS;
        let next = (!preflight).then(|| self.next.call(req));

        Box::pin(async move {
            let mut res = match next {
                Some(fut) => fut.await,
                None => Response::status(StatusCode::OK),
            };
            if let Some(origin) = origin {
                let headers = res.headers_mut();
                headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
                headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
                headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
                headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
            }
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::handler::boxed;

    async fn teapot(_req: Request) -> StatusCode {
        StatusCode::IM_A_TEAPOT
    }

    fn request(method: http::Method, origin: Option<&str>) -> Request {
        let mut b = http::Request::builder().method(method).uri("/list.json");
        if let Some(o) = origin {
            b = b.header("origin", o);
        }
        Request::new(b.body(Bytes::new()).unwrap())
    }

    #[tokio::test]
    async fn matching_origin_is_mirrored() {
        let h = cors(boxed(teapot), ".example.com");
        let res = h.call(request(http::Method::GET, Some("https://app.example.com"))).await;
        assert_eq!(res.status_code(), StatusCode::IM_A_TEAPOT);
        assert_eq!(res.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example.com");
        assert_eq!(res.headers()[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn foreign_or_missing_origin_gets_no_headers() {
        let h = cors(boxed(teapot), ".example.com");
        let res = h.call(request(http::Method::GET, Some("https://evil.test"))).await;
        assert!(res.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        let res = h.call(request(http::Method::GET, None)).await;
        assert!(res.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn options_is_answered_without_the_router() {
        let h = cors(boxed(teapot), "");
        let res = h.call(request(http::Method::OPTIONS, Some("https://anywhere.test"))).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.headers()[ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);

        let res = h.call(request(http::Method::OPTIONS, None)).await;
        assert_eq!(res.status_code(), StatusCode::OK);
    }
}
