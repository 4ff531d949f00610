//! DNS Proxy
//!
//! A small forwarding DNS proxy for development networks. Queries are answered from a local
//! table of host and domain overrides where one matches, and otherwise relayed to an upstream
//! nameserver chosen by domain suffix, with a single timed fallback to a default nameserver.
//!
//! The rules can be changed at runtime through an [HTTP API][crate::api] or by editing the
//! config file, without restarting the proxy or disturbing queries in flight.
//!
#![warn(clippy::pedantic)]

pub mod api;
pub mod config;
pub mod dns;
pub mod error;
pub mod reload;
pub mod rules;

pub use api::new as new_http;
pub use config::{Config, SharedConfig};
pub use dns::new as new_dns;
pub use rules::{RuleStore, RuleTable, Rules};
