//! Forwarding of raw queries to upstream nameservers.
//!
//! Each forwarded query gets its own UDP socket. The query is sent to the chosen nameserver and
//! a fallback timer is armed; if the timer fires first the same bytes are sent once more, over
//! the same socket, to the default nameserver. The first datagram to arrive on the socket is the
//! answer, whichever nameserver it came from.
use crate::error::Error;
use crate::rules::{Nameserver, RuleTable};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error};

/// Largest datagram accepted from an upstream nameserver.
const MAX_RESPONSE_LEN: usize = 65_535;

#[derive(Debug, Clone, Copy)]
pub struct Forwarder {
    query_timeout: Duration,
}

impl Forwarder {
    /// A forwarder that abandons a query once neither nameserver has answered `query_timeout`
    /// after the fallback was sent.
    #[must_use]
    pub fn new(query_timeout: Duration) -> Self {
        Self { query_timeout }
    }

    /// Forward `query` to `target`, falling back once to the default nameserver of `rules` if
    /// `target` doesn't answer within the fallback timeout of `rules`.
    ///
    /// The socket is closed when this returns, on every path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Socket`] on transport errors with `target` and [`Error::TimeoutExhausted`]
    /// if nothing answers in time. A failure to reach the fallback is only logged.
    pub async fn forward(
        &self,
        query: &[u8],
        target: &Nameserver,
        rules: &RuleTable,
    ) -> Result<Vec<u8>, Error> {
        let fallback = rules.default_nameserver();
        let socket_err = |ns: &Nameserver| {
            let ns = ns.clone();
            move |err: std::io::Error| Error::Socket(ns, err)
        };

        let primary_addr = target.socket_addr().await?;
        let socket = UdpSocket::bind(unspecified_for(primary_addr))
            .await
            .map_err(socket_err(target))?;
        socket
            .send_to(query, primary_addr)
            .await
            .map_err(socket_err(target))?;

        let fallback_at = Instant::now() + rules.fallback_timeout();
        // Rearmed when the fallback goes out, so every nameserver asked gets a full
        // `query_timeout` to answer.
        let mut abandon_at = fallback_at + self.query_timeout;
        let mut fell_back = false;
        let mut buf = vec![0u8; MAX_RESPONSE_LEN];

        loop {
            tokio::select! {
                received = socket.recv_from(&mut buf) => {
                    let (len, from) = received.map_err(socket_err(target))?;
                    debug!(%from, len, fell_back, "upstream response");
                    buf.truncate(len);
                    return Ok(buf);
                }
                () = sleep_until(fallback_at), if !fell_back => {
                    fell_back = true;
                    abandon_at = Instant::now() + self.query_timeout;
                    debug!(primary = %target, %fallback, "no response, falling back");
                    // The primary may still answer late.
                    if let Err(err) = send_fallback(&socket, query, fallback).await {
                        error!(primary = %target, "fallback failed: {err}");
                    }
                }
                () = sleep_until(abandon_at) => {
                    return Err(Error::TimeoutExhausted {
                        primary: target.clone(),
                        fallback: fallback.clone(),
                    });
                }
            }
        }
    }
}

async fn send_fallback(
    socket: &UdpSocket,
    query: &[u8],
    fallback: &Nameserver,
) -> Result<(), Error> {
    let addr = fallback.socket_addr().await?;
    socket
        .send_to(query, addr)
        .await
        .map_err(|err| Error::Socket(fallback.clone(), err))?;
    Ok(())
}

fn unspecified_for(addr: SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::Forwarder;
    use crate::error::Error;
    use crate::rules::{Nameserver, RuleTable, Rules};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::UdpSocket;
    use tokio::time::{sleep, timeout};

    /// A fake nameserver that answers every datagram it receives with `reply` after `delay`,
    /// reporting each received datagram on the returned channel.
    async fn upstream(
        reply: &'static [u8],
        delay: Option<Duration>,
    ) -> (SocketAddr, tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            while let Ok((len, from)) = socket.recv_from(&mut buf).await {
                let _ = tx.send(buf[..len].to_vec());
                if let Some(delay) = delay {
                    sleep(delay).await;
                    let _ = socket.send_to(reply, from).await;
                }
            }
        });
        (addr, rx)
    }

    fn rules(default: SocketAddr, fallback_timeout: Duration) -> RuleTable {
        let mut rules = Rules::new(vec![Nameserver::from(default)]);
        rules.fallback_timeout = fallback_timeout;
        RuleTable::try_from(rules).unwrap()
    }

    #[tokio::test]
    async fn primary_answers_before_fallback() {
        let (primary, mut primary_rx) = upstream(b"primary", Some(Duration::ZERO)).await;
        let (default, mut default_rx) = upstream(b"default", Some(Duration::ZERO)).await;
        let rules = rules(default, Duration::from_millis(200));

        let res = Forwarder::new(Duration::from_secs(2))
            .forward(b"query", &primary.into(), &rules)
            .await
            .unwrap();
        assert_eq!(res, b"primary");
        assert_eq!(primary_rx.recv().await.unwrap(), b"query");

        sleep(Duration::from_millis(300)).await;
        assert!(default_rx.try_recv().is_err(), "fallback must not be sent");
    }

    #[tokio::test]
    async fn silent_primary_falls_back_once() {
        let (primary, mut primary_rx) = upstream(b"primary", None).await;
        let (default, mut default_rx) = upstream(b"default", Some(Duration::ZERO)).await;
        let rules = rules(default, Duration::from_millis(50));

        let res = Forwarder::new(Duration::from_secs(2))
            .forward(b"query", &primary.into(), &rules)
            .await
            .unwrap();
        assert_eq!(res, b"default");
        assert_eq!(primary_rx.recv().await.unwrap(), b"query");
        assert_eq!(default_rx.recv().await.unwrap(), b"query");
        assert!(default_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_primary_still_wins() {
        let (primary, _primary_rx) = upstream(b"primary", Some(Duration::from_millis(100))).await;
        let (default, mut default_rx) = upstream(b"default", None).await;
        let rules = rules(default, Duration::from_millis(20));

        let res = Forwarder::new(Duration::from_secs(2))
            .forward(b"query", &primary.into(), &rules)
            .await
            .unwrap();
        assert_eq!(res, b"primary");
        assert_eq!(default_rx.recv().await.unwrap(), b"query");
    }

    #[tokio::test]
    async fn abandoned_after_query_timeout() {
        let (primary, _primary_rx) = upstream(b"primary", None).await;
        let (default, mut default_rx) = upstream(b"default", None).await;
        let rules = rules(default, Duration::from_millis(20));

        let res = timeout(
            Duration::from_secs(2),
            Forwarder::new(Duration::from_millis(200)).forward(b"query", &primary.into(), &rules),
        )
        .await
        .expect("forward should give up by itself");
        assert!(matches!(res, Err(Error::TimeoutExhausted { .. })));

        assert_eq!(default_rx.recv().await.unwrap(), b"query");
        assert!(default_rx.try_recv().is_err(), "only one fallback is sent");
    }

    #[tokio::test]
    async fn fallback_outlasting_query_timeout_is_still_sent() {
        let (primary, _primary_rx) = upstream(b"primary", None).await;
        let (default, mut default_rx) = upstream(b"default", Some(Duration::ZERO)).await;
        let rules = rules(default, Duration::from_millis(300));

        let res = Forwarder::new(Duration::from_millis(200))
            .forward(b"query", &primary.into(), &rules)
            .await
            .unwrap();
        assert_eq!(res, b"default");
        assert_eq!(default_rx.recv().await.unwrap(), b"query");
    }

    #[tokio::test]
    async fn unreachable_fallback_still_accepts_late_primary() {
        let (primary, _primary_rx) = upstream(b"primary", Some(Duration::from_millis(150))).await;
        // An IPv6 fallback can't be reached from the IPv4 socket of the primary.
        let default: SocketAddr = "[::1]:5399".parse().unwrap();
        let rules = rules(default, Duration::from_millis(30));

        let res = Forwarder::new(Duration::from_secs(2))
            .forward(b"query", &primary.into(), &rules)
            .await
            .unwrap();
        assert_eq!(res, b"primary");
    }
}
