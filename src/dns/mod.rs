//! DNS proxy.
//!
//! Queries arrive as UDP datagrams on the [`Listener`][server::Listener]. Only the first question
//! of each query is considered, and its name is resolved against the current
//! [`RuleTable`][crate::rules::RuleTable]:
//!
//! # Hosts
//!
//! Each host pattern in declaration order is tried against the full query name. A plain pattern
//! must equal the name; a pattern written `/regex/flags` is used as a regular expression. The
//! first pattern that matches answers the query.
//!
//! # Domains
//!
//! Otherwise, each domain suffix in declaration order is tried. The first suffix the query name
//! ends with answers the query.
//!
//! Host and domain answers are IPv4 addresses, returned as a single `A` record with a 30 second
//! TTL. An answer may instead name another key of the same table, whose answer is then used.
//!
//! E.g. with config:
//! ```json
//! {
//!   "hosts": { "devlocal": "gateway", "gateway": "10.0.0.1" },
//!   "domains": { "dev": "127.0.0.1" },
//!   ...
//! }
//! ```
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 5353 +short devlocal
//! 10.0.0.1
//! ❯ dig @127.0.0.1 -p 5353 +short app.dev
//! 127.0.0.1
//! ```
//!
//! # Servers
//!
//! Anything else is forwarded verbatim to an upstream nameserver: the nameserver of the **last**
//! `servers` suffix the query name ends with, or the first of the default `nameservers`. If the
//! upstream doesn't answer within `fallback_timeout` the query is sent once more to the first
//! default nameserver, and whichever answer arrives first is relayed back to the client.

pub mod codec;
pub mod forwarder;
mod handlers;
pub mod resolver;
pub mod server;

pub use server::new;
