use crate::error::Error;
use crate::rules::{RuleTable, Rules};
use ipnetwork::IpNetwork;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

pub type SharedConfig = Arc<Config>;

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "defaults::dns_bind_addr")]
    pub dns_bind_addr: SocketAddr,
    #[serde(flatten)]
    pub rules: Rules,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "defaults::query_timeout")]
    pub query_timeout: Duration,
    #[serde(default)]
    pub reload_config: bool,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "defaults::reload_interval")]
    pub reload_interval: Duration,
    #[serde(default)]
    pub api: ApiConfig,
    /// The file this config was loaded from.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "defaults::api_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Shared secret required for mutating requests. No authentication when unset.
    #[serde(default)]
    pub key: Option<String>,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "defaults::api_timeout")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: defaults::api_bind_addr(),
            key: None,
            timeout: defaults::api_timeout(),
        }
    }
}

mod defaults {
    use std::net::SocketAddr;
    use std::time::Duration;

    pub(super) fn dns_bind_addr() -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], 53))
    }

    pub(super) fn api_bind_addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 5959))
    }

    pub(super) fn query_timeout() -> Duration {
        Duration::from_secs(5)
    }

    pub(super) fn reload_interval() -> Duration {
        Duration::from_secs(5)
    }

    pub(super) fn api_timeout() -> Duration {
        Duration::from_secs(10)
    }
}

lazy_static! {
    // NOTE(XXX): Once the "ip" feature has stabilized we can use Ipv6Addr.is_unique_local[0].
    //            Presently this feature is unstable so we home-roll. See also RFC 4193[1].
    // [0]: https://doc.rust-lang.org/std/net/struct.Ipv6Addr.html#method.is_unique_local
    // [1]: https://www.rfc-editor.org/rfc/rfc4193.html
    static ref IPV6_UNIQUE_LOCAL_NETWORK: IpNetwork = IpNetwork::from_str("fc00::/7").unwrap();
}

impl Config {
    /// Load and validate the config at `p`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the file can't be read, [`Error::InvalidJSON`] if it isn't a
    /// valid config, and any error [`Config::validate`] returns.
    pub async fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = tokio::fs::read(p.as_ref()).await?;
        let mut conf = Self::try_from_slice(&contents)?;
        conf.path = Some(p.as_ref().to_path_buf());
        Ok(conf)
    }

    /// Parse and validate a JSON config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJSON`] if `contents` isn't a valid config, and any error
    /// [`Config::validate`] returns.
    pub fn try_from_slice(contents: &[u8]) -> Result<Self, Error> {
        let conf: Config = serde_json::from_slice(contents)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Check the rules are usable and the admin API isn't exposed unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns the [`RuleTable`] validation error for invalid rules, and
    /// [`Error::InsecureAPIBind`] if the API is enabled without a key on a public address.
    pub fn validate(&self) -> Result<(), Error> {
        self.rule_table()?;
        if self.api.enabled && self.api.key.is_none() {
            self.bind_addr_is_secure()?;
        }
        Ok(())
    }

    /// The [`RuleTable`] for this config's rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyNameservers`] or [`Error::InvalidHostPattern`] for invalid rules.
    pub fn rule_table(&self) -> Result<RuleTable, Error> {
        RuleTable::try_from(self.rules.clone())
    }

    /// Write this config back to the file it was loaded from, with `rules` in place of the
    /// rules it was loaded with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoConfigFile`] if the config wasn't loaded from a file,
    /// [`Error::InvalidJSON`] if it can't be serialized, and [`Error::IO`] if the file can't be
    /// written.
    pub async fn save_rules(&self, rules: &Rules) -> Result<(), Error> {
        let path = self.path.as_ref().ok_or(Error::NoConfigFile)?;
        let mut saved = self.clone();
        saved.rules = rules.clone();
        let data = serde_json::to_string_pretty(&saved)?;
        let mut output_file = File::create(path).await?;
        output_file.write_all(data.as_bytes()).await?;
        output_file.flush().await?;
        Ok(())
    }

    fn bind_addr_is_secure(&self) -> Result<(), Error> {
        match self.api.bind_addr {
            SocketAddr::V4(v4_addr) => {
                let ip = v4_addr.ip();
                if !ip.is_loopback() && !ip.is_private() {
                    return Err(Error::InsecureAPIBind(IpAddr::V4(*ip)));
                }
                Ok(())
            }
            SocketAddr::V6(v6_addr) => {
                let ip = v6_addr.ip();
                if !ip.is_loopback() && !IPV6_UNIQUE_LOCAL_NETWORK.contains(IpAddr::V6(*ip)) {
                    return Err(Error::InsecureAPIBind(IpAddr::V6(*ip)));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::error::Error;
    use std::time::Duration;

    const FULL: &str = r#"{
        "dns_bind_addr": "127.0.0.1:5353",
        "nameservers": ["10.0.0.1", "10.0.0.2:5300"],
        "servers": { "corp": "10.1.1.1" },
        "domains": { "dev": "127.0.0.1" },
        "hosts": { "devlocal": "127.0.0.1", "/^api\\d+$/i": "10.0.0.9" },
        "fallback_timeout": 250,
        "query_timeout": 3000,
        "reload_config": true,
        "reload_interval": 2,
        "api": { "enabled": true, "bind_addr": "0.0.0.0:5959", "key": "sekrit", "timeout": 5 }
    }"#;

    #[test]
    fn full_config() {
        let conf = Config::try_from_slice(FULL.as_bytes()).unwrap();
        assert_eq!(conf.dns_bind_addr.port(), 5353);
        assert_eq!(conf.rules.nameservers.len(), 2);
        assert_eq!(conf.rules.fallback_timeout, Duration::from_millis(250));
        assert_eq!(
            conf.rules.hosts.keys().collect::<Vec<_>>(),
            ["devlocal", r"/^api\d+$/i"]
        );
        assert_eq!(conf.query_timeout, Duration::from_secs(3));
        assert!(conf.reload_config);
        assert_eq!(conf.reload_interval, Duration::from_secs(2));
        assert_eq!(conf.api.key.as_deref(), Some("sekrit"));
        assert!(conf.path.is_none());
    }

    #[test]
    fn minimal_config_defaults() {
        let conf = Config::try_from_slice(br#"{"nameservers":["10.0.0.1"]}"#).unwrap();
        assert_eq!(conf.dns_bind_addr.to_string(), "0.0.0.0:53");
        assert_eq!(conf.rules.fallback_timeout, Duration::from_millis(350));
        assert_eq!(conf.query_timeout, Duration::from_secs(5));
        assert!(!conf.reload_config);
        assert!(!conf.api.enabled);
        assert_eq!(conf.api.bind_addr.to_string(), "127.0.0.1:5959");
    }

    #[test]
    fn nameservers_required() {
        assert!(matches!(
            Config::try_from_slice(br#"{"nameservers":[]}"#),
            Err(Error::EmptyNameservers)
        ));
        assert!(matches!(
            Config::try_from_slice(br#"{"hosts":{}}"#),
            Err(Error::InvalidJSON(_))
        ));
    }

    #[test]
    fn unauthenticated_api_must_be_private() {
        let public = br#"{"nameservers":["10.0.0.1"],"api":{"enabled":true,"bind_addr":"0.0.0.0:5959"}}"#;
        assert!(matches!(
            Config::try_from_slice(public),
            Err(Error::InsecureAPIBind(_))
        ));

        let private = br#"{"nameservers":["10.0.0.1"],"api":{"enabled":true,"bind_addr":"10.8.0.1:5959"}}"#;
        assert!(Config::try_from_slice(private).is_ok());

        let ula = br#"{"nameservers":["10.0.0.1"],"api":{"enabled":true,"bind_addr":"[fd00::1]:5959"}}"#;
        assert!(Config::try_from_slice(ula).is_ok());
    }

    #[tokio::test]
    async fn save_rules_round_trips() {
        let path = std::env::temp_dir().join(format!("dnsproxy-save-{}.json", std::process::id()));
        tokio::fs::write(&path, FULL).await.unwrap();

        let conf = Config::try_from_file(&path).await.unwrap();
        let mut rules = conf.rules.clone();
        rules.domains.insert("test", "10.3.3.3".to_string());
        conf.save_rules(&rules).await.unwrap();

        let reloaded = Config::try_from_file(&path).await.unwrap();
        assert_eq!(reloaded.rules, rules);
        assert_eq!(reloaded.api.key.as_deref(), Some("sekrit"));
        assert_eq!(reloaded.dns_bind_addr, conf.dns_bind_addr);
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn save_without_file() {
        let conf = Config::try_from_slice(br#"{"nameservers":["10.0.0.1"]}"#).unwrap();
        assert!(matches!(
            conf.save_rules(&conf.rules).await,
            Err(Error::NoConfigFile)
        ));
    }
}
