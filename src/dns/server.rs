use crate::config::SharedConfig;
use crate::dns::forwarder::Forwarder;
use crate::dns::handlers::Handler;
use crate::rules::RuleStore;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tracing::error;

/// Largest inbound query datagram.
const MAX_QUERY_LEN: usize = 4096;

/// Queries handled at once. Reading stops while all are busy.
const MAX_IN_FLIGHT: usize = 1024;

/// The UDP DNS listener.
///
/// Every datagram received is handled on its own task, so a query waiting on an upstream
/// nameserver never holds up the next one.
#[derive(Debug)]
pub struct Listener {
    socket: Arc<UdpSocket>,
    handler: Arc<Handler>,
    in_flight: Arc<Semaphore>,
}

/// Bind the listener to [`Config::dns_bind_addr`][`crate::config::Config::dns_bind_addr`].
///
/// # Errors
///
/// Returns an error if the UDP socket can't be bound.
pub async fn new(config: SharedConfig, rules: RuleStore) -> anyhow::Result<Listener> {
    let socket = UdpSocket::bind(config.dns_bind_addr).await?;
    let handler = Handler::new(rules, Forwarder::new(config.query_timeout));
    Ok(Listener {
        socket: Arc::new(socket),
        handler: Arc::new(handler),
        in_flight: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
    })
}

impl Listener {
    /// The address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address can't be read.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    #[cfg(test)]
    fn with_max_in_flight(mut self, permits: usize) -> Self {
        self.in_flight = Arc::new(Semaphore::new(permits));
        self
    }

    /// Serve queries forever. A failed query, or a failed receive, never stops the listener.
    pub async fn block_until_done(self) {
        let mut buf = vec![0u8; MAX_QUERY_LEN];
        loop {
            let Ok(permit) = Arc::clone(&self.in_flight).acquire_owned().await else {
                // The semaphore is never closed.
                return;
            };
            let (len, source) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(err) => {
                    error!("udp socket error: {err}");
                    continue;
                }
            };
            let datagram = buf[..len].to_vec();
            let socket = Arc::clone(&self.socket);
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                handler.handle_datagram(&socket, &datagram, source).await;
                drop(permit);
            });
        }
    }
}
