use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use crate::context::RemoteAddr;
use crate::endpoint::Endpoint;
use crate::error::Error;

use super::Denial;

/// A CIDR block such as `10.0.0.0/8` or `2001:db8::/32`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IpNet {
    network: IpAddr,
    prefix: u8,
}

impl IpNet {
    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix
    }

    /// Whether `ip` lies inside the block. IPv4-mapped IPv6 addresses match
    /// IPv4 blocks.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip.to_canonical()) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(ip) & mask == u32::from(net)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(ip) & mask == u128::from(net)
            }
            _ => false,
        }
    }
}

impl FromStr for IpNet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Config(format!("unable to parse CIDR string `{s}`"));
        let (addr, prefix) = s.split_once('/').ok_or_else(invalid)?;
        let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        let network = match addr {
            IpAddr::V4(v4) if prefix <= 32 => {
                let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
                IpAddr::V4((u32::from(v4) & mask).into())
            }
            IpAddr::V6(v6) if prefix <= 128 => {
                let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
                IpAddr::V6((u128::from(v6) & mask).into())
            }
            _ => return Err(invalid()),
        };
        Ok(Self { network, prefix })
    }
}

impl fmt::Display for IpNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Parses a comma-separated list of CIDR blocks. An empty string yields no
/// blocks.
pub fn parse_ip_nets(list: &str) -> Result<Vec<IpNet>, Error> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }
    list.split(',').map(|s| s.trim().parse()).collect()
}

/// Admits only requests whose [`RemoteAddr`] falls inside one of `nets`;
/// everyone else, including requests with an unreadable address, gets the
/// denial. With no nets every request passes.
pub fn allow_ip_nets(next: Endpoint, nets: Vec<IpNet>, denial: Denial) -> Endpoint {
    if nets.is_empty() {
        return next;
    }
    let nets: Arc<[IpNet]> = nets.into();
    Endpoint::from_fn(move |ctx, req| {
        let next = next.clone();
        let denial = denial.clone();
        let allowed = ctx.get::<RemoteAddr>()
            .and_then(|addr| remote_ip(&addr.0))
            .is_some_and(|ip| nets.iter().any(|net| net.contains(ip)));
        async move {
            if !allowed {
                return Err(denial.envelope().into());
            }
            next.call(ctx, req).await
        }
    })
}

fn remote_ip(addr: &str) -> Option<IpAddr> {
    addr.parse::<IpAddr>()
        .or_else(|_| addr.parse::<SocketAddr>().map(|sa| sa.ip()))
        .ok()
}
