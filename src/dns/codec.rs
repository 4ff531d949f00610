//! DNS message encoding and decoding.
use crate::error::Error;
use std::net::Ipv4Addr;
use trust_dns_proto::op::{Message, MessageType};
use trust_dns_proto::rr::{RData, Record, RecordType};

/// TTL in seconds of every locally synthesized answer.
pub const LOCAL_ANSWER_TTL: u32 = 30;

/// The first question of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Query name in its ASCII wire form (internationalized labels stay punycode), without the
    /// trailing root label dot.
    pub name: String,
    pub query_type: RecordType,
}

impl Question {
    /// Extract the first question of `message`. Any further questions are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoQuestion`] if `message` has no question.
    pub fn first(message: &Message) -> Result<Self, Error> {
        let query = message.queries().first().ok_or(Error::NoQuestion)?;
        let name = query.name().to_ascii();
        Ok(Self {
            name: name.strip_suffix('.').unwrap_or(&name).to_string(),
            query_type: query.query_type(),
        })
    }
}

/// Decode a DNS message.
///
/// # Errors
///
/// Returns [`Error::MalformedPacket`] if `bytes` isn't a DNS message.
pub fn decode(bytes: &[u8]) -> Result<Message, Error> {
    Message::from_vec(bytes).map_err(Error::MalformedPacket)
}

/// Encode a DNS message.
///
/// # Errors
///
/// Returns [`Error::DNSError`] if the message can't be encoded.
pub fn encode(message: &Message) -> Result<Vec<u8>, Error> {
    Ok(message.to_vec()?)
}

/// Turn `query` into a response answering its first question with a single `A` record for
/// `addr`.
///
/// The query's ID, questions and EDNS options are kept; the response and recursion
/// desired/available flags are set.
///
/// # Errors
///
/// Returns [`Error::NoQuestion`] if `query` has no question.
pub fn local_answer(mut query: Message, addr: Ipv4Addr) -> Result<Message, Error> {
    let name = query
        .queries()
        .first()
        .ok_or(Error::NoQuestion)?
        .name()
        .clone();
    query
        .set_message_type(MessageType::Response)
        .set_recursion_desired(true)
        .set_recursion_available(true)
        .add_answer(Record::from_rdata(
            name,
            LOCAL_ANSWER_TTL,
            RData::A(addr),
        ));
    Ok(query)
}

/// Describe the answers of an upstream response for logging: the record data of each answer
/// joined with `", "`, or `nxdomain` if there are none.
#[must_use]
pub fn summarize_answers(response: &[u8]) -> String {
    match decode(response) {
        Ok(message) if message.answers().is_empty() => "nxdomain".to_string(),
        Ok(message) => message
            .answers()
            .iter()
            .map(|r| r.data().map_or_else(String::new, ToString::to_string))
            .collect::<Vec<_>>()
            .join(", "),
        Err(_) => "unparsable".to_string(),
    }
}
