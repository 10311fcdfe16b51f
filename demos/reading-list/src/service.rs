//! The reading-list service.
//!
//! | Path | Method | Catalog |
//! |---|---|---|
//! | `/link.json` | PUT | JSON |
//! | `/list.json` | GET | JSON |
//! | `/link.proto` | PUT | protobuf |
//! | `/list.proto` | GET | protobuf |
//!
//! Errors are written in the wire form the path's suffix names.

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use perch::encoding::suffix_error_encoder;
use perch::{
    Authorization, BoxedHandler, Catalog, Context, Decoder, Endpoint, Envelope, Error,
    HttpEndpoint, Method, Request, RouterOption, ServerOption, Service, middleware, router,
};
use prost::Message as _;
use tracing::{error, warn};

use crate::auth::{User, Users, bearer_token};
use crate::db::Db;
use crate::model::{GetLinks, LinkRequest, Links, Message, PutLink};

/// Links returned when the request names no limit.
pub const DEFAULT_LIMIT: usize = 50;

/// Partition of the link store a request works in. Absent means the default
/// (empty) namespace.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Namespace(pub String);

pub struct ReadingList<D, U> {
    db: Arc<D>,
    users: Arc<U>,
}

impl<D: Db, U: Users> ReadingList<D, U> {
    pub fn new(db: D, users: U) -> Self {
        Self { db: Arc::new(db), users: Arc::new(users) }
    }

    fn put_link(&self) -> Endpoint {
        let db = Arc::clone(&self.db);
        Endpoint::new(move |ctx: Context, req: PutLink| {
            let db = Arc::clone(&db);
            async move {
                let user = current_user(&ctx)?;
                let ns = namespace(&ctx);
                let res = if req.delete {
                    db.delete_link(&ns, &user.id, &req.link.url).await
                } else {
                    db.put_link(&ns, &user.id, req.link).await
                };
                if let Err(err) = res {
                    error!(error = %err, user = %user.id, "unable to update link");
                    return Err(reply("problems updating link", StatusCode::INTERNAL_SERVER_ERROR));
                }
                Ok(Envelope::new(Message::new("success")))
            }
        })
    }

    fn get_links(&self) -> Endpoint {
        let db = Arc::clone(&self.db);
        Endpoint::new(move |ctx: Context, req: GetLinks| {
            let db = Arc::clone(&db);
            async move {
                let user = current_user(&ctx)?;
                let limit = if req.limit == 0 { DEFAULT_LIMIT } else { req.limit };
                match db.get_links(&namespace(&ctx), &user.id, limit).await {
                    Ok(links) => Ok(Envelope::new(Links { links })),
                    Err(err) => {
                        error!(error = %err, user = %user.id, "unable to get links");
                        Err(reply("server error", StatusCode::INTERNAL_SERVER_ERROR))
                    }
                }
            }
        })
    }

    fn catalog(&self, suffix: &str, put_decoder: Decoder) -> Catalog {
        let put = HttpEndpoint::new(self.put_link()).decoder(put_decoder);
        let get = HttpEndpoint::new(self.get_links()).decoder(Decoder::new(decode_get));
        Catalog::from([
            (format!("/link.{suffix}"), HashMap::from([(Method::Put, put)])),
            (format!("/list.{suffix}"), HashMap::from([(Method::Get, get)])),
        ])
    }
}

impl<D: Db, U: Users> Service for ReadingList<D, U> {
    fn http_middleware(&self, next: BoxedHandler) -> BoxedHandler {
        middleware::trace(middleware::cors(next, ""))
    }

    /// Rejects requests without a known bearer token; otherwise adds the
    /// [`User`] to the context.
    fn middleware(&self, next: Endpoint) -> Endpoint {
        let users = Arc::clone(&self.users);
        Endpoint::from_fn(move |ctx, req| {
            let users = Arc::clone(&users);
            let next = next.clone();
            let token = ctx.get::<Authorization>()
                .and_then(|a| bearer_token(&a.0))
                .map(str::to_owned);
            async move {
                let user = match token {
                    Some(token) => users.authenticate(&token).await,
                    None => None,
                };
                let Some(user) = user else {
                    return Err(reply("please provide oauth token", StatusCode::UNAUTHORIZED));
                };
                next.call(ctx.with(user), req).await
            }
        })
    }

    fn options(&self) -> Vec<ServerOption> {
        vec![ServerOption::error_encoder(suffix_error_encoder())]
    }

    fn router_options(&self) -> Vec<RouterOption> {
        vec![router::router_select(router::RADIX)]
    }

    fn json_endpoints(&self) -> Option<Catalog> {
        Some(self.catalog("json", Decoder::new(decode_put_json)))
    }

    fn proto_endpoints(&self) -> Option<Catalog> {
        Some(self.catalog("proto", Decoder::new(decode_put_proto)))
    }
}

fn reply(message: &str, status: StatusCode) -> Error {
    Envelope::new(Message::new(message)).with_status(status).into()
}

fn bad_request() -> Error {
    reply("bad request", StatusCode::BAD_REQUEST)
}

fn current_user(ctx: &Context) -> Result<User, Error> {
    ctx.get::<User>()
        .cloned()
        .ok_or_else(|| Error::other("no authenticated user in context"))
}

fn namespace(ctx: &Context) -> String {
    ctx.get::<Namespace>().map(|n| n.0.clone()).unwrap_or_default()
}

fn put_link(req: LinkRequest) -> Result<PutLink, Error> {
    match req.link {
        Some(link) => Ok(PutLink { link, delete: req.delete }),
        None => Err(bad_request()),
    }
}

async fn decode_put_json(_ctx: Context, req: Request) -> Result<PutLink, Error> {
    let parsed = serde_json::from_slice::<LinkRequest>(req.body()).map_err(|err| {
        warn!(error = %err, "malformed link request");
        bad_request()
    })?;
    put_link(parsed)
}

async fn decode_put_proto(_ctx: Context, req: Request) -> Result<PutLink, Error> {
    let parsed = LinkRequest::decode(req.body().as_ref()).map_err(|err| {
        warn!(error = %err, "malformed link request");
        bad_request()
    })?;
    put_link(parsed)
}

/// Shared by both catalogs; there is no body to decode. An unparsable limit
/// counts as no limit.
async fn decode_get(_ctx: Context, req: Request) -> Result<GetLinks, Error> {
    let limit = req.query("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(0);
    Ok(GetLinks { limit })
}
