use crate::dns::codec::{self, Question};
use crate::dns::forwarder::Forwarder;
use crate::dns::resolver::{resolve, Decision, LocalAnswer, Route};
use crate::error::Error;
use crate::rules::RuleStore;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};
use trust_dns_proto::op::Message;

/// Handles one inbound datagram at a time. Cheap to share between per-query tasks.
#[derive(Debug, Clone)]
pub struct Handler {
    rules: RuleStore,
    forwarder: Forwarder,
}

impl Handler {
    pub(super) fn new(rules: RuleStore, forwarder: Forwarder) -> Self {
        Handler { rules, forwarder }
    }

    /// Answer `datagram` from `source` on `socket`. Failures are logged and leave the query
    /// unanswered.
    pub(super) async fn handle_datagram(
        &self,
        socket: &UdpSocket,
        datagram: &[u8],
        source: SocketAddr,
    ) {
        match self.dispatch(socket, datagram, source).await {
            Ok(()) => {}
            Err(err @ Error::Socket(..)) => error!(%source, "dropped query: {err}"),
            Err(err) => warn!(%source, "dropped query: {err}"),
        }
    }

    async fn dispatch(
        &self,
        socket: &UdpSocket,
        datagram: &[u8],
        source: SocketAddr,
    ) -> Result<(), Error> {
        let request = codec::decode(datagram)?;
        let question = Question::first(&request)?;
        debug!(%source, query = ?request, "query");

        // One snapshot for the whole query, however long forwarding takes.
        let rules = self.rules.snapshot();
        match resolve(&question.name, &rules) {
            Decision::Local(local) => {
                send_local_answer(socket, request, &question, &local, source, datagram.len()).await
            }
            Decision::Forward(route) => {
                let response = self
                    .forwarder
                    .forward(datagram, &route.nameserver, &rules)
                    .await?;
                log_forwarded(&question, &route, &response, source, datagram.len());
                socket.send_to(&response, source).await?;
                Ok(())
            }
        }
    }
}

async fn send_local_answer(
    socket: &UdpSocket,
    request: Message,
    question: &Question,
    local: &LocalAnswer,
    source: SocketAddr,
    size: usize,
) -> Result<(), Error> {
    info!(
        target: "dnsproxy::query",
        kind = %local.kind,
        domain = %question.name,
        rule = %local.rule,
        answer = %local.answer,
        %source,
        size,
        "local answer"
    );
    let addr: Ipv4Addr = local
        .answer
        .parse()
        .map_err(|_| Error::InvalidAnswer(local.answer.clone()))?;
    let response = codec::encode(&codec::local_answer(request, addr)?)?;
    socket.send_to(&response, source).await?;
    Ok(())
}

fn log_forwarded(
    question: &Question,
    route: &Route,
    response: &[u8],
    source: SocketAddr,
    size: usize,
) {
    info!(
        target: "dnsproxy::query",
        kind = "forward",
        nameserver = %route.nameserver,
        suffix = route.suffix.as_deref().unwrap_or("-"),
        domain = %question.name,
        qtype = %question.query_type,
        answer = %codec::summarize_answers(response),
        %source,
        size,
        "forwarded"
    );
}
