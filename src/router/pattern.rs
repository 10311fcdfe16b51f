//! Regex-pattern backend.
//!
//! Each route compiles to an anchored regular expression. A `{name}` segment
//! matches one path segment; `{name:pattern}` matches `pattern`, so routes
//! such as `/scale/{dir:(up|down)}` constrain their parameters. Routes are
//! tried in registration order and the first one matching both path and
//! method wins. Registering the same template twice for one method is an
//! error.

use std::collections::HashMap;

use ::regex::Regex;

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, boxed};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

use super::{Router, not_found};

struct Route {
    method: Method,
    template: String,
    pattern: Regex,
    names: Vec<String>,
    handler: BoxedHandler,
}

/// Ordered table of regex routes.
pub struct RegexRouter {
    routes: Vec<Route>,
    not_found: BoxedHandler,
}

impl RegexRouter {
    pub fn new() -> Self {
        Self { routes: Vec::new(), not_found: boxed(not_found) }
    }
}

impl Default for RegexRouter {
    fn default() -> Self { Self::new() }
}

impl Router for RegexRouter {
    fn handle(&mut self, method: Method, path: &str, handler: BoxedHandler) -> Result<(), Error> {
        let route_err = |reason: String| Error::Route { path: path.to_owned(), reason };
        if self.routes.iter().any(|r| r.method == method && r.template == path) {
            return Err(route_err(format!("{method} already registered")));
        }
        let (pattern, names) = compile(path).map_err(route_err)?;
        self.routes.push(Route { method, template: path.to_owned(), pattern, names, handler });
        Ok(())
    }

    fn set_not_found_handler(&mut self, handler: BoxedHandler) {
        self.not_found = handler;
    }

    fn serve(&self, mut req: Request) -> BoxFuture<'static, Response> {
        let matched = self.routes.iter().find_map(|route| {
            if !route.method.matches(req.method()) {
                return None;
            }
            let caps = route.pattern.captures(req.path())?;
            let vars: HashMap<String, String> = route.names.iter()
                .filter_map(|n| caps.name(n).map(|m| (n.clone(), m.as_str().to_owned())))
                .collect();
            Some((route.handler.clone(), vars))
        });

        match matched {
            Some((handler, vars)) => {
                req.set_route_vars(vars);
                handler.call(req)
            }
            None => self.not_found.call(req),
        }
    }
}

/// Translates a route template into an anchored regex and its parameter names.
fn compile(template: &str) -> Result<(Regex, Vec<String>), String> {
    let mut source = String::from("^");
    let mut names = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        source.push_str(&::regex::escape(&rest[..open]));
        let close = closing_brace(&rest[open..]).ok_or("unbalanced braces")? + open;
        let var = &rest[open + 1..close];
        let (name, pattern) = match var.split_once(':') {
            Some((name, pattern)) => (name, pattern),
            None => (var, "[^/]+"),
        };
        if !is_identifier(name) {
            return Err(format!("invalid parameter name `{name}`"));
        }
        if names.iter().any(|n| n == name) {
            return Err(format!("duplicate parameter `{name}`"));
        }
        source.push_str(&format!("(?P<{name}>{pattern})"));
        names.push(name.to_owned());
        rest = &rest[close + 1..];
    }
    if rest.contains('}') {
        return Err("unbalanced braces".to_owned());
    }
    source.push_str(&::regex::escape(rest));
    source.push('$');

    let regex = Regex::new(&source).map_err(|e| e.to_string())?;
    Ok((regex, names))
}

/// Index of the brace closing the one at `s[0]`, honoring nested quantifiers
/// such as `{id:[0-9]{3}}`.
fn closing_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;

    async fn dir(req: Request) -> String {
        req.param("dir").unwrap_or_default().to_owned()
    }

    fn get(uri: &str) -> Request {
        Request::new(http::Request::get(uri).body(Bytes::new()).unwrap())
    }

    #[test]
    fn templates_compile_to_anchored_regexes() {
        let (re, names) = compile("/cat/{id}.json").unwrap();
        assert_eq!(names, ["id"]);
        assert!(re.is_match("/cat/12.json"));
        assert!(!re.is_match("/cat/12.jsonx"));
        assert!(!re.is_match("/cat/1/2.json"));
        assert!(!re.is_match("/cat/12xjson"));
    }

    #[test]
    fn nested_quantifiers_are_kept() {
        let (re, _) = compile("/code/{id:[0-9]{3}}").unwrap();
        assert!(re.is_match("/code/123"));
        assert!(!re.is_match("/code/1234"));
    }

    #[test]
    fn bad_templates_are_rejected() {
        assert!(compile("/a/{id").is_err());
        assert!(compile("/a/id}").is_err());
        assert!(compile("/a/{*rest}").is_err());
        assert!(compile("/a/{id}/{id}").is_err());
        assert!(compile("/a/{id:(}").is_err());
    }

    #[tokio::test]
    async fn constrained_parameters() {
        let mut r = RegexRouter::new();
        r.handle(Method::Get, "/scale/{dir:(up|down)}", boxed(dir)).unwrap();
        assert_eq!(r.serve(get("/scale/up")).await.body().as_ref(), b"up");
        assert_eq!(r.serve(get("/scale/sideways")).await.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut r = RegexRouter::new();
        r.handle(Method::Get, "/cat/{id}", boxed(dir)).unwrap();
        r.handle(Method::Put, "/cat/{id}", boxed(dir)).unwrap();
        let err = r.handle(Method::Get, "/cat/{id}", boxed(dir)).unwrap_err();
        assert!(matches!(err, Error::Route { ref path, .. } if path == "/cat/{id}"));
    }
}
