use crate::error::Error;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

pub const DEFAULT_DNS_PORT: u16 = 53;

/// An upstream nameserver address, written `host[:port]`. The port defaults to 53.
///
/// IPv6 literals may be given bare (`::1`) or bracketed with a port (`[::1]:5353`). Host names
/// are resolved each time a query is forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct Nameserver {
    host: String,
    port: u16,
}

impl Nameserver {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve the nameserver to the first socket address its host maps to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Socket`] if the host lookup fails and
    /// [`Error::UnresolvableNameserver`] if it succeeds without any addresses.
    pub async fn socket_addr(&self) -> Result<SocketAddr, Error> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|err| Error::Socket(self.clone(), err))?
            .next()
            .ok_or_else(|| Error::UnresolvableNameserver(self.clone()))
    }
}

impl From<SocketAddr> for Nameserver {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl FromStr for Nameserver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidNameserver(s.to_string());
        let s = s.trim();
        if s.is_empty() {
            return Err(invalid());
        }
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(addr.into());
        }
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::new(ip.to_string(), DEFAULT_DNS_PORT));
        }
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (s, DEFAULT_DNS_PORT),
        };
        if host.is_empty() || host.contains(|c: char| c == ':' || c.is_whitespace()) {
            return Err(invalid());
        }
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for Nameserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            DEFAULT_DNS_PORT => write!(f, "{}", self.host),
            port if self.host.contains(':') => write!(f, "[{}]:{port}", self.host),
            port => write!(f, "{}:{port}", self.host),
        }
    }
}
