//! Bearer-token authentication.

use std::collections::HashMap;
use std::future::Future;

use perch::Error;

const BEARER: &str = "Bearer ";

/// An authenticated caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct User {
    pub id: String,
}

/// Resolves bearer tokens to users.
pub trait Users: Send + Sync + 'static {
    fn authenticate(&self, token: &str) -> impl Future<Output = Option<User>> + Send;
}

/// A fixed token table.
#[derive(Clone, Debug, Default)]
pub struct StaticUsers {
    tokens: HashMap<String, User>,
}

impl StaticUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), User { id: user_id.into() });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Parses `token=user,token=user`.
    pub fn parse(table: &str) -> Result<Self, Error> {
        table.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .try_fold(Self::new(), |users, entry| match entry.split_once('=') {
                Some((token, user)) if !token.is_empty() && !user.is_empty() => Ok(users.with(token, user)),
                _ => Err(Error::Config(format!("expected `token=user`, got `{entry}`"))),
            })
    }
}

impl Users for StaticUsers {
    async fn authenticate(&self, token: &str) -> Option<User> {
        self.tokens.get(token).cloned()
    }
}

/// The token of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(authorization: &str) -> Option<&str> {
    authorization.strip_prefix(BEARER)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
