//! The rule table consulted for every query.
//!
//! [`Rules`] is the plain, serializable form that appears in the config file and in the
//! [admin API][crate::api]. [`RuleTable`] is a validated, immutable snapshot of a [`Rules`] with
//! its host patterns compiled. A [`RuleStore`] publishes the current [`RuleTable`] to readers
//! and swaps in replacements atomically.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::time::Duration;

pub mod map;
pub mod nameserver;
pub mod pattern;
pub mod store;

pub use map::RuleMap;
pub use nameserver::Nameserver;
pub use pattern::HostPattern;
pub use store::RuleStore;

const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_millis(350);

fn default_fallback_timeout() -> Duration {
    DEFAULT_FALLBACK_TIMEOUT
}

/// Rule configuration.
///
/// * `nameservers` - default upstream nameservers. The first is also the fallback target.
/// * `servers` - domain suffix to nameserver overrides. The **last** matching suffix wins.
/// * `domains` - domain suffix to answer. The first matching suffix wins.
/// * `hosts` - host pattern to answer. The first matching pattern wins.
/// * `fallback_timeout` - how long to wait on the chosen nameserver before retrying once
///   against the default nameserver.
///
/// An answer in `domains` (or `hosts`) that is itself a key of `domains` (or `hosts`) is
/// replaced by that key's answer. Only one such hop is taken.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Rules {
    pub nameservers: Vec<Nameserver>,
    #[serde(default)]
    pub servers: RuleMap<Nameserver>,
    #[serde(default)]
    pub domains: RuleMap<String>,
    #[serde(default)]
    pub hosts: RuleMap<String>,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_fallback_timeout")]
    pub fallback_timeout: Duration,
}

impl Rules {
    #[must_use]
    pub fn new(nameservers: Vec<Nameserver>) -> Self {
        Self {
            nameservers,
            servers: RuleMap::new(),
            domains: RuleMap::new(),
            hosts: RuleMap::new(),
            fallback_timeout: DEFAULT_FALLBACK_TIMEOUT,
        }
    }
}

/// An immutable, validated snapshot of [`Rules`].
///
/// There is always at least one nameserver and every host pattern has been compiled.
#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct RuleTable {
    rules: Rules,
    host_patterns: Vec<HostPattern>,
}

impl RuleTable {
    #[must_use]
    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// The default nameserver: the first of [`Rules::nameservers`].
    #[must_use]
    pub fn default_nameserver(&self) -> &Nameserver {
        // NB: indexing is safe, construction rejects an empty list.
        &self.rules.nameservers[0]
    }

    #[must_use]
    pub fn fallback_timeout(&self) -> Duration {
        self.rules.fallback_timeout
    }

    /// Host patterns with their (unaliased) answers, in declaration order.
    pub fn host_rules(&self) -> impl Iterator<Item = (&str, &HostPattern, &str)> {
        self.rules
            .hosts
            .iter()
            .zip(&self.host_patterns)
            .map(|((key, answer), pattern)| (key, pattern, answer.as_str()))
    }

    /// Build a new table from a modified copy of this table's rules.
    ///
    /// # Errors
    ///
    /// Returns any validation error [`RuleTable::try_from`] would for the modified rules.
    pub fn modify<F>(&self, f: F) -> Result<RuleTable, Error>
    where
        F: FnOnce(&mut Rules) -> Result<(), Error>,
    {
        let mut rules = self.rules.clone();
        f(&mut rules)?;
        RuleTable::try_from(rules)
    }
}

impl TryFrom<Rules> for RuleTable {
    type Error = Error;

    fn try_from(rules: Rules) -> Result<Self, Self::Error> {
        if rules.nameservers.is_empty() {
            return Err(Error::EmptyNameservers);
        }
        let host_patterns = rules
            .hosts
            .keys()
            .map(HostPattern::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rules,
            host_patterns,
        })
    }
}
