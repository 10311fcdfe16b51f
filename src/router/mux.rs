//! Exact-and-subtree backend.
//!
//! Patterns are either exact (`/list.json`) or, with a trailing slash,
//! subtrees (`/static/` matches everything beneath it). A segment written
//! `{name}` matches any single non-empty segment; literal text may sit on
//! either side of it, as in `/cat/{id}.json`. When several patterns match a
//! path, exact beats subtree, then more literal segments win, then more
//! literal text around parameters, then longer patterns, and finally the
//! pattern registered first.
//!
//! This backend has no hook for unmatched requests: they always get the
//! built-in 404 and [`Router::set_not_found_handler`] is ignored.

use std::cmp::Reverse;
use std::collections::HashMap;

use tracing::warn;

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, boxed};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

use super::{Router, not_found};

#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Literal(String),
    /// `{name}` with optional literal text glued to either side.
    Param { name: String, prefix: String, suffix: String },
}

impl Segment {
    /// Literal characters this segment pins down.
    fn fixed_len(&self) -> usize {
        match self {
            Self::Literal(lit) => lit.len(),
            Self::Param { prefix, suffix, .. } => prefix.len() + suffix.len(),
        }
    }
}

struct Entry {
    segments: Vec<Segment>,
    subtree: bool,
    /// Registration order of the pattern.
    seq: usize,
    handlers: Vec<(Method, BoxedHandler)>,
}

impl Entry {
    /// Route parameters if `path` falls under this pattern.
    fn matches(&self, path: &[&str]) -> Option<HashMap<String, String>> {
        let fits = if self.subtree {
            path.len() > self.segments.len()
        } else {
            path.len() == self.segments.len()
        };
        if !fits {
            return None;
        }
        let mut vars = HashMap::new();
        for (seg, part) in self.segments.iter().zip(path) {
            match seg {
                Segment::Literal(lit) if lit == part => {}
                Segment::Param { name, prefix, suffix } => {
                    let value = part.strip_prefix(prefix.as_str())
                        .and_then(|rest| rest.strip_suffix(suffix.as_str()))
                        .filter(|value| !value.is_empty())?;
                    vars.insert(name.clone(), value.to_owned());
                }
                _ => return None,
            }
        }
        Some(vars)
    }

    fn rank(&self) -> (bool, usize, usize, usize, Reverse<usize>) {
        let literals = self.segments.iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        let affixes = self.segments.iter()
            .filter(|s| matches!(s, Segment::Param { .. }))
            .map(Segment::fixed_len)
            .sum();
        (!self.subtree, literals, affixes, self.segments.len(), Reverse(self.seq))
    }
}

/// Minimal path multiplexer.
pub struct MuxRouter {
    entries: HashMap<String, Entry>,
    not_found: BoxedHandler,
}

impl MuxRouter {
    pub fn new() -> Self {
        Self { entries: HashMap::new(), not_found: boxed(not_found) }
    }
}

impl Default for MuxRouter {
    fn default() -> Self { Self::new() }
}

impl Router for MuxRouter {
    fn handle(&mut self, method: Method, path: &str, handler: BoxedHandler) -> Result<(), Error> {
        let route_err = |reason: &str| Error::Route { path: path.to_owned(), reason: reason.to_owned() };
        if !path.starts_with('/') {
            return Err(route_err("pattern must begin with '/'"));
        }
        if !self.entries.contains_key(path) {
            let (segments, subtree) = parse(path).map_err(route_err)?;
            let seq = self.entries.len();
            self.entries.insert(path.to_owned(), Entry { segments, subtree, seq, handlers: Vec::new() });
        }
        let Some(entry) = self.entries.get_mut(path) else {
            return Err(route_err("pattern vanished during registration"));
        };
        if entry.handlers.iter().any(|(m, _)| *m == method) {
            return Err(route_err(&format!("{method} already registered")));
        }
        entry.handlers.push((method, handler));
        Ok(())
    }

    fn set_not_found_handler(&mut self, _handler: BoxedHandler) {
        warn!("mux router cannot replace its not-found handler; ignoring");
    }

    fn serve(&self, mut req: Request) -> BoxFuture<'static, Response> {
        let path = req.path().to_owned();
        let parts: Vec<&str> = path.strip_prefix('/').unwrap_or(&path).split('/').collect();

        let best = self.entries.values()
            .filter_map(|e| e.matches(&parts).map(|vars| (e, vars)))
            .max_by_key(|(e, _)| e.rank());

        // Exact method first, then ANY, on the most specific pattern only.
        let found = best.and_then(|(entry, vars)| {
            let pick = |want: &dyn Fn(Method) -> bool| {
                entry.handlers.iter().find(|(m, _)| want(*m)).map(|(_, h)| h.clone())
            };
            pick(&|m| m != Method::Any && m.matches(req.method()))
                .or_else(|| pick(&|m| m == Method::Any))
                .map(|h| (h, vars))
        });

        match found {
            Some((handler, vars)) => {
                req.set_route_vars(vars);
                handler.call(req)
            }
            None => self.not_found.call(req),
        }
    }
}

fn parse(pattern: &str) -> Result<(Vec<Segment>, bool), &'static str> {
    let body = &pattern[1..];
    let subtree = body.is_empty() || body.ends_with('/');
    let body = body.strip_suffix('/').unwrap_or(body);
    if body.is_empty() {
        return Ok((Vec::new(), subtree));
    }
    let segments = body.split('/').map(parse_segment).collect::<Result<_, _>>()?;
    Ok((segments, subtree))
}

fn parse_segment(seg: &str) -> Result<Segment, &'static str> {
    let Some(open) = seg.find('{') else {
        if seg.contains('}') {
            return Err("unbalanced '}'");
        }
        return Ok(Segment::Literal(seg.to_owned()));
    };
    let (prefix, rest) = seg.split_at(open);
    let Some((name, suffix)) = rest[1..].split_once('}') else {
        return Err("unclosed parameter");
    };
    if name.is_empty() {
        return Err("empty parameter name");
    }
    if name.contains('{') || suffix.contains(['{', '}']) {
        return Err("one parameter per segment");
    }
    Ok(Segment::Param { name: name.to_owned(), prefix: prefix.to_owned(), suffix: suffix.to_owned() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;

    async fn exact(_req: Request) -> &'static str { "exact" }
    async fn tree(_req: Request) -> &'static str { "tree" }
    async fn root(_req: Request) -> &'static str { "root" }
    async fn param(req: Request) -> String { req.param("id").unwrap_or_default().to_owned() }

    fn get(uri: &str) -> Request {
        Request::new(http::Request::get(uri).body(Bytes::new()).unwrap())
    }

    #[test]
    fn patterns_parse() {
        assert_eq!(parse("/").unwrap(), (vec![], true));
        assert_eq!(parse("/a/").unwrap(), (vec![Segment::Literal("a".into())], true));
        assert_eq!(
            parse("/a/{id}").unwrap(),
            (vec![
                Segment::Literal("a".into()),
                Segment::Param { name: "id".into(), prefix: String::new(), suffix: String::new() },
            ], false)
        );
        assert_eq!(
            parse("/cat/{id}.json").unwrap().0[1],
            Segment::Param { name: "id".into(), prefix: String::new(), suffix: ".json".into() }
        );
        assert_eq!(
            parse("/a/v{n}").unwrap().0[1],
            Segment::Param { name: "n".into(), prefix: "v".into(), suffix: String::new() }
        );
        assert!(parse("/a/{}").is_err());
        assert!(parse("/a/{id").is_err());
        assert!(parse("/a/id}").is_err());
        assert!(parse("/a/{x}{y}").is_err());
    }

    #[tokio::test]
    async fn params_with_literal_affixes() {
        let mut r = MuxRouter::new();
        r.handle(Method::Get, "/cat/{id}.json", boxed(param)).unwrap();
        r.handle(Method::Get, "/cat/{id}", boxed(exact)).unwrap();

        assert_eq!(r.serve(get("/cat/7.json")).await.body().as_ref(), b"7");
        assert_eq!(r.serve(get("/cat/7")).await.body().as_ref(), b"exact");
        // The parameter itself may not be empty.
        assert_eq!(r.serve(get("/cat/.json")).await.body().as_ref(), b"exact");
    }

    #[tokio::test]
    async fn equal_rank_goes_to_the_first_registration() {
        for _ in 0..16 {
            let mut r = MuxRouter::new();
            r.handle(Method::Get, "/a/{id}", boxed(exact)).unwrap();
            r.handle(Method::Get, "/{x}/b", boxed(tree)).unwrap();
            assert_eq!(r.serve(get("/a/b")).await.body().as_ref(), b"exact");

            let mut r = MuxRouter::new();
            r.handle(Method::Get, "/{x}/b", boxed(tree)).unwrap();
            r.handle(Method::Get, "/a/{id}", boxed(exact)).unwrap();
            assert_eq!(r.serve(get("/a/b")).await.body().as_ref(), b"tree");
        }
    }

    #[tokio::test]
    async fn exact_beats_subtree_and_root_catches_the_rest() {
        let mut r = MuxRouter::new();
        r.handle(Method::Get, "/static/app.js", boxed(exact)).unwrap();
        r.handle(Method::Get, "/static/", boxed(tree)).unwrap();
        r.handle(Method::Get, "/", boxed(root)).unwrap();

        assert_eq!(r.serve(get("/static/app.js")).await.body().as_ref(), b"exact");
        assert_eq!(r.serve(get("/static/img/a.png")).await.body().as_ref(), b"tree");
        assert_eq!(r.serve(get("/static/")).await.body().as_ref(), b"tree");
        assert_eq!(r.serve(get("/static")).await.body().as_ref(), b"root");
        assert_eq!(r.serve(get("/elsewhere")).await.body().as_ref(), b"root");
    }

    #[tokio::test]
    async fn literal_segments_beat_params() {
        let mut r = MuxRouter::new();
        r.handle(Method::Get, "/users/{id}", boxed(param)).unwrap();
        r.handle(Method::Get, "/users/me", boxed(exact)).unwrap();
        assert_eq!(r.serve(get("/users/me")).await.body().as_ref(), b"exact");
        assert_eq!(r.serve(get("/users/7")).await.body().as_ref(), b"7");
        assert_eq!(r.serve(get("/users/")).await.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn several_methods_share_one_pattern() {
        let mut r = MuxRouter::new();
        r.handle(Method::Get, "/link.json", boxed(exact)).unwrap();
        r.handle(Method::Put, "/link.json", boxed(tree)).unwrap();
        let put = Request::new(http::Request::put("/link.json").body(Bytes::new()).unwrap());
        assert_eq!(r.serve(put).await.body().as_ref(), b"tree");
        assert!(r.handle(Method::Get, "/link.json", boxed(root)).is_err());
    }
}
