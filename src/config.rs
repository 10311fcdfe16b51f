//! Process configuration from the environment.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `PORT` | `8080` | listening port, set by the platform |
//! | `HOST` | `0.0.0.0` | listening address |
//! | `ROUTER` | unset | router backend name, see [`router`](crate::router) |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::Error;

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub router: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self { host: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: DEFAULT_PORT, router: None }
    }
}

impl Config {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
            config.port = port.parse()
                .map_err(|_| Error::Config(format!("PORT must be a port number, got `{port}`")))?;
        }
        if let Some(host) = lookup("HOST").filter(|v| !v.is_empty()) {
            config.host = host.parse()
                .map_err(|_| Error::Config(format!("HOST must be an IP address, got `{host}`")))?;
        }
        config.router = lookup("ROUTER").filter(|v| !v.is_empty());
        Ok(config)
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_to_the_platform_port() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.addr(), "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.router, None);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[("PORT", "9000"), ("HOST", "127.0.0.1"), ("ROUTER", "mux")])).unwrap();
        assert_eq!(config.addr(), "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.router.as_deref(), Some("mux"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(Config::from_lookup(lookup(&[("PORT", "eighty")])), Err(Error::Config(_))));
        assert!(matches!(Config::from_lookup(lookup(&[("HOST", "localhost")])), Err(Error::Config(_))));
    }
}
