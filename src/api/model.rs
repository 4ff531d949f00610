use crate::rules::Nameserver;
use serde::Deserialize;

/// Body of a nameserver `POST` or `PUT`: either a list of nameservers or a single one.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub(super) enum NameserverUpdate {
    Many(Vec<Nameserver>),
    One(Nameserver),
}

impl NameserverUpdate {
    /// Apply a `POST`: a list is appended, a single nameserver becomes the new default.
    pub fn add_to(self, nameservers: &mut Vec<Nameserver>) {
        match self {
            NameserverUpdate::Many(many) => nameservers.extend(many),
            NameserverUpdate::One(one) => nameservers.insert(0, one),
        }
    }

    /// Apply a `PUT`: the nameservers are replaced.
    pub fn replace(self, nameservers: &mut Vec<Nameserver>) {
        *nameservers = match self {
            NameserverUpdate::Many(many) => many,
            NameserverUpdate::One(one) => vec![one],
        };
    }
}
