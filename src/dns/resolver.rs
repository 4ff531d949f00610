//! Query resolution: decide whether a query is answered locally or forwarded, and where to.
use crate::rules::{Nameserver, RuleMap, RuleTable};
use std::fmt;

/// The rule set a local answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Host,
    Domain,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuleKind::Host => "host",
            RuleKind::Domain => "domain",
        })
    }
}

/// A query answered from the rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAnswer {
    pub kind: RuleKind,
    /// The host pattern or domain suffix that matched.
    pub rule: String,
    /// The answer after alias resolution.
    pub answer: String,
}

/// A query to forward upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub nameserver: Nameserver,
    /// The `servers` suffix that chose the nameserver, `None` for the default nameserver.
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Local(LocalAnswer),
    Forward(Route),
}

/// Resolve the query name `name` against `table`.
///
/// In order:
/// 1. the first host pattern matching `name` answers it;
/// 2. otherwise the first domain suffix `name` ends with answers it;
/// 3. otherwise the query is forwarded to the nameserver of the **last** `servers` suffix `name`
///    ends with, or to the default nameserver if none does.
///
/// Suffixes are plain string suffixes: `"dev"` matches `"mydev"` as well as `"my.dev"`.
#[must_use]
pub fn resolve(name: &str, table: &RuleTable) -> Decision {
    let rules = table.rules();

    if let Some((rule, _, answer)) = table
        .host_rules()
        .find(|(_, pattern, _)| pattern.is_match(name))
    {
        return Decision::Local(LocalAnswer {
            kind: RuleKind::Host,
            rule: rule.to_string(),
            answer: dealias(&rules.hosts, answer).to_string(),
        });
    }

    if let Some((suffix, answer)) = rules
        .domains
        .iter()
        .find(|(suffix, _)| name.ends_with(suffix))
    {
        return Decision::Local(LocalAnswer {
            kind: RuleKind::Domain,
            rule: suffix.to_string(),
            answer: dealias(&rules.domains, answer).to_string(),
        });
    }

    let route = rules
        .servers
        .iter()
        .filter(|(suffix, _)| name.ends_with(suffix))
        .last()
        .map_or_else(
            || Route {
                nameserver: table.default_nameserver().clone(),
                suffix: None,
            },
            |(suffix, nameserver)| Route {
                nameserver: nameserver.clone(),
                suffix: Some(suffix.to_string()),
            },
        );
    Decision::Forward(route)
}

// One hop only: an alias of an alias is returned as is.
fn dealias<'a>(map: &'a RuleMap<String>, answer: &'a str) -> &'a str {
    map.get(answer).map_or(answer, String::as_str)
}
