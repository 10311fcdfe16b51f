//! Link storage.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use perch::Error;

use crate::model::Link;

/// Storage the service reads and writes links through. Every call names the
/// namespace and user it acts for.
pub trait Db: Send + Sync + 'static {
    /// Up to `limit` links, oldest first.
    fn get_links(&self, ns: &str, user: &str, limit: usize) -> impl Future<Output = Result<Vec<Link>, Error>> + Send;

    /// Saves `link`. Saving a URL twice keeps one copy.
    fn put_link(&self, ns: &str, user: &str, link: Link) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes every copy of `url`. Removing a missing URL is not an error.
    fn delete_link(&self, ns: &str, user: &str, url: &str) -> impl Future<Output = Result<(), Error>> + Send;
}

type Key = (String, String);

/// Process-local storage.
#[derive(Default)]
pub struct InMemoryDb {
    links: Mutex<HashMap<Key, Vec<Link>>>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_links<T>(&self, f: impl FnOnce(&mut HashMap<Key, Vec<Link>>) -> T) -> Result<T, Error> {
        let mut links = self.links.lock().map_err(|_| Error::other("link store lock poisoned"))?;
        Ok(f(&mut links))
    }
}

fn key(ns: &str, user: &str) -> Key {
    (ns.to_owned(), user.to_owned())
}

impl Db for InMemoryDb {
    async fn get_links(&self, ns: &str, user: &str, limit: usize) -> Result<Vec<Link>, Error> {
        self.with_links(|links| {
            links.get(&key(ns, user))
                .map(|l| l.iter().take(limit).cloned().collect())
                .unwrap_or_default()
        })
    }

    async fn put_link(&self, ns: &str, user: &str, link: Link) -> Result<(), Error> {
        self.with_links(|links| {
            let list = links.entry(key(ns, user)).or_default();
            if !list.contains(&link) {
                list.push(link);
            }
        })
    }

    async fn delete_link(&self, ns: &str, user: &str, url: &str) -> Result<(), Error> {
        self.with_links(|links| {
            if let Some(list) = links.get_mut(&key(ns, user)) {
                list.retain(|l| l.url != url);
            }
        })
    }
}
