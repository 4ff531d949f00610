//! Error types.

use crate::rules::Nameserver;
use axum::extract::rejection::JsonRejection;
use std::net::IpAddr;
use trust_dns_proto::error::ProtoError;

/// Error enumerates the possible DNS proxy error states.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when an inbound datagram can't be decoded as a DNS message. The query is
    /// dropped without a response.
    #[error("malformed DNS packet: {0}")]
    MalformedPacket(#[source] ProtoError),

    /// Returned when an inbound DNS message carries no question entry.
    #[error("DNS message has no question")]
    NoQuestion,

    /// Returned when the UDP transport fails while forwarding a query upstream.
    #[error("socket error forwarding to {0}")]
    Socket(Nameserver, #[source] std::io::Error),

    /// Returned when neither the chosen nameserver nor the single fallback to the default
    /// nameserver answered before the query was abandoned.
    #[error("no response from {primary} or fallback {fallback}")]
    TimeoutExhausted {
        primary: Nameserver,
        fallback: Nameserver,
    },

    /// Returned when a nameserver host name doesn't resolve to any socket address.
    #[error("nameserver {0} did not resolve to an address")]
    UnresolvableNameserver(Nameserver),

    /// Returned when the answer selected for a local response isn't an IPv4 address.
    #[error("local answer \"{0}\" is not an IPv4 address")]
    InvalidAnswer(String),

    /// Returned when a mutating [admin API][crate::api] request doesn't present the configured
    /// [`ApiConfig::key`][`crate::config::ApiConfig::key`].
    #[error("unauthorized")]
    Unauthorized,

    /// Returned when an [admin API][crate::api] request body has the wrong shape.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Returned when an [admin API][crate::api] request names a rule that doesn't exist.
    #[error("\"{0}\" not found")]
    NotFound(String),

    /// Returned when clients send invalid JSON to the [admin API][crate::api].
    #[error(transparent)]
    JsonExtractorRejection(#[from] JsonRejection),

    /// Returned when a host pattern doesn't compile to a regular expression.
    #[error("invalid host pattern \"{pattern}\": {source}")]
    InvalidHostPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Returned when a nameserver isn't of the form `host[:port]`.
    #[error("invalid nameserver address \"{0}\"")]
    InvalidNameserver(String),

    /// Returned when a rule table would be left without a default nameserver.
    #[error("at least one default nameserver is required")]
    EmptyNameservers,

    /// Returned when the [admin API][crate::api] is enabled without a key on an address that
    /// isn't loopback or within a private network space.
    #[error("API bind address ({0}) must be a loopback or private IP when no API key is set")]
    InsecureAPIBind(IpAddr),

    /// Returned when the running rules are saved but the process wasn't started from a
    /// config file.
    #[error("no config file to save to")]
    NoConfigFile,

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when processing JSON from disk (e.g.
    /// [trying to load a `Config`][crate::config::Config::try_from_file]) fails due to invalid
    /// JSON content.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),

    /// Returned when a DNS message can't be encoded.
    #[error("DNS error")]
    DNSError(#[from] ProtoError),
}
