//! Test support.
//!
//! Services usually find their request-scoped state (a storage namespace, a
//! fake backend handle) in the [`Context`]. In tests you want every request to
//! see the *same* fixture context, so install one before driving the server:
//!
//! ```rust,ignore
//! let _guard = perch::testing::install_fixture(Context::new().with(Namespace("t1".into())));
//! let server = Server::new(my_service())?;
//! let res = server.handle(request).await;
//! ```
//!
//! Each request gets its own clone of the fixture, so values inserted into it
//! afterwards are not seen. State the test wants to inspect goes behind an
//! `Arc` placed in the fixture before installing it.
//!
//! The factory is process-wide. The guard serializes every fixture user in
//! the process and reinstalls the production factory when dropped, so tests
//! that install fixtures may run on parallel test threads.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::context::Context;
use crate::platform;

static FIXTURE_LOCK: Mutex<()> = Mutex::new(());

/// Keeps a fixture context installed. Dropping it restores
/// [`platform_context`](crate::platform::platform_context).
#[must_use = "the fixture is uninstalled when the guard is dropped"]
pub struct FixtureGuard {
    _lock: MutexGuard<'static, ()>,
}

impl Drop for FixtureGuard {
    fn drop(&mut self) {
        platform::reset_context_factory();
    }
}

/// Makes every request start from a clone of `ctx`.
///
/// Blocks while another guard is alive.
pub fn install_fixture(ctx: Context) -> FixtureGuard {
    let lock = FIXTURE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    platform::set_context_factory(move |_req| ctx.clone());
    FixtureGuard { _lock: lock }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use bytes::Bytes;

    #[derive(Clone, Debug, PartialEq)]
    struct Marker(u32);

    fn request() -> Request {
        Request::new(http::Request::get("/").body(Bytes::new()).unwrap())
    }

    #[test]
    fn fixture_is_installed_until_the_guard_drops() {
        {
            let _guard = install_fixture(Context::new().with(Marker(7)));
            assert_eq!(platform::new_context(&request()).get::<Marker>(), Some(&Marker(7)));
            assert_eq!(platform::new_context(&request()).get::<Marker>(), Some(&Marker(7)));
        }
        let _guard = FIXTURE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        assert!(!platform::new_context(&request()).contains::<Marker>());
    }

    #[test]
    fn shared_state_in_the_fixture_is_visible_to_the_test() {
        use std::sync::Arc;

        #[derive(Clone, Default)]
        struct Seen(Arc<Mutex<Vec<String>>>);

        let seen = Seen::default();
        let _guard = install_fixture(Context::new().with(seen.clone()));
        for path in ["/a", "/b"] {
            let req = Request::new(http::Request::get(path).body(Bytes::new()).unwrap());
            let ctx = platform::new_context(&req);
            if let Some(Seen(log)) = ctx.get::<Seen>() {
                log.lock().unwrap().push(req.path().to_owned());
            }
        }
        assert_eq!(*seen.0.lock().unwrap(), ["/a", "/b"]);
    }
}
