//! The service contract.
//!
//! A [`Service`] is what an application hands to [`Server::new`]: two
//! middleware slots, service-wide options, router options, and at least one
//! endpoint catalog. Which catalogs a service offers decides its
//! [`Capability`]:
//!
//! | `json_endpoints` | `proto_endpoints` | Capability |
//! |---|---|---|
//! | `Some` | `None` | [`Capability::Json`] |
//! | `None` | `Some` | [`Capability::Proto`] |
//! | `Some` | `Some` | [`Capability::Mixed`] |
//! | `None` | `None` | [`Error::Capability`] at startup |
//!
//! Every hook has a pass-through default, so a minimal service only names its
//! catalog:
//!
//! ```rust,ignore
//! struct Hello;
//!
//! impl Service for Hello {
//!     fn json_endpoints(&self) -> Option<Catalog> {
//!         let hello = Endpoint::new(|_ctx, _req: Request| async {
//!             Ok(Envelope::json("hello"))
//!         });
//!         Some(Catalog::from([
//!             ("/hello.json".into(), HashMap::from([(Method::Get, hello.into())])),
//!         ]))
//!     }
//! }
//! ```
//!
//! [`Server::new`]: crate::Server::new

use std::fmt;

use crate::endpoint::{Catalog, Endpoint};
use crate::envelope::WireForm;
use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::router::RouterOption;
use crate::transport::ServerOption;

/// An application served by perch.
pub trait Service: Send + Sync + 'static {
    /// Wraps the whole router. Runs for every request, matched or not, after
    /// the platform context is attached.
    fn http_middleware(&self, next: BoxedHandler) -> BoxedHandler {
        next
    }

    /// Wraps every endpoint after decoding and before the business function.
    fn middleware(&self, next: Endpoint) -> Endpoint {
        next
    }

    /// Options applied to every endpoint, ahead of the endpoint's own.
    fn options(&self) -> Vec<ServerOption> {
        Vec::new()
    }

    /// Router construction steps. None selects the default backend.
    fn router_options(&self) -> Vec<RouterOption> {
        Vec::new()
    }

    /// Endpoints answering in JSON.
    fn json_endpoints(&self) -> Option<Catalog> {
        None
    }

    /// Endpoints answering in binary protobuf.
    fn proto_endpoints(&self) -> Option<Catalog> {
        None
    }
}

/// Which wire forms a service's catalogs cover.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Capability {
    Json,
    Proto,
    Mixed,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json  => "json",
            Self::Proto => "protobuf",
            Self::Mixed => "mixed",
        })
    }
}

/// The service's catalogs in registration order, JSON first, each tagged
/// with its wire form.
pub(crate) fn catalogs(svc: &dyn Service) -> Result<(Capability, Vec<(WireForm, Catalog)>), Error> {
    match (svc.json_endpoints(), svc.proto_endpoints()) {
        (Some(json), Some(proto)) => Ok((
            Capability::Mixed,
            vec![(WireForm::Json, json), (WireForm::Proto, proto)],
        )),
        (Some(json), None) => Ok((Capability::Json, vec![(WireForm::Json, json)])),
        (None, Some(proto)) => Ok((Capability::Proto, vec![(WireForm::Proto, proto)])),
        (None, None) => Err(Error::Capability),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Offers(bool, bool);

    impl Service for Offers {
        fn json_endpoints(&self) -> Option<Catalog> {
            self.0.then(Catalog::new)
        }

        fn proto_endpoints(&self) -> Option<Catalog> {
            self.1.then(Catalog::new)
        }
    }

    #[test]
    fn classification_follows_the_catalogs() {
        let kind = |j, p| catalogs(&Offers(j, p)).map(|(c, _)| c);
        assert_eq!(kind(true, false).unwrap(), Capability::Json);
        assert_eq!(kind(false, true).unwrap(), Capability::Proto);
        assert_eq!(kind(true, true).unwrap(), Capability::Mixed);
        assert!(matches!(kind(false, false), Err(Error::Capability)));
    }

    #[test]
    fn json_registers_before_proto() {
        let (_, order) = catalogs(&Offers(true, true)).unwrap();
        let wires: Vec<_> = order.into_iter().map(|(w, _)| w).collect();
        assert_eq!(wires, [WireForm::Json, WireForm::Proto]);
    }
}
