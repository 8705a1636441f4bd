//! Error types shared by the codec, the transport and the resolver.

use std::net::SocketAddr;

use thiserror::Error;

use crate::dns::ResponseCode;

/// Malformed or truncated wire data.
///
/// Any of these aborts the decode that produced it; nothing is patched up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("need {needed} byte(s) at offset {position}, only {remaining} left")]
    OutOfBounds {
        position: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("compression pointer at offset {at} targets {target}, which is not behind it")]
    BadPointer { at: usize, target: usize },

    #[error("reserved label type {0:#04x}")]
    ReservedLabel(u8),

    #[error("decoded name exceeds 255 octets")]
    NameTooLong,

    #[error("{rtype} RDATA declared {declared} byte(s) but its fields span {consumed}")]
    RDataLength {
        rtype: String,
        declared: usize,
        consumed: usize,
    },
}

/// An outgoing name that cannot be put on the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("name {0:?} contains an empty label")]
    EmptyLabel(String),

    #[error("label {0:?} exceeds maximum length of 63 octets")]
    LabelTooLong(String),

    #[error("name {name:?} encodes to {length} octets, more than 255")]
    NameTooLong { name: String, length: usize },

    #[error("name {0:?} contains a malformed escape")]
    BadEscape(String),
}

/// A message or record that cannot be put on the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error(transparent)]
    Name(#[from] NameError),

    #[error("{rtype} RDATA is {length} bytes, more than 65535")]
    RDataTooLong { rtype: String, length: usize },

    #[error("TXT character-string is {length} bytes, more than 255")]
    CharacterStringTooLong { length: usize },

    #[error("{0} section already holds 65535 entries")]
    SectionFull(&'static str),
}

/// Failures of the datagram round trip.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no response from {0} before the timeout")]
    Timeout(SocketAddr),

    #[error("I/O error talking to {server}: {source}")]
    Io {
        server: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// The delegation walk could not reach an answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("seed server returned no root nameserver with an address")]
    NoRootServers,

    #[error("CNAME chain starting at {name} is longer than {limit} hops")]
    CnameDepthExceeded { name: String, limit: u8 },

    #[error("resolving nameserver {name} nests deeper than {limit} levels")]
    NsDepthExceeded { name: String, limit: u8 },

    #[error("gave up on {name} after {limit} referrals")]
    TooManyReferrals { name: String, limit: u8 },

    #[error("nameserver {0} has no IPv4 address")]
    NoAddress(String),
}

/// Top-level error returned by resolver operations.
#[derive(Error, Debug)]
pub enum DnsError {
    #[error("malformed DNS message: {0}")]
    Format(#[from] FormatError),

    #[error("cannot encode query: {0}")]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{server} answered {rcode}")]
    Protocol {
        server: SocketAddr,
        rcode: ResponseCode,
    },

    #[error("response ID {received:#06x} does not match query ID {expected:#06x}")]
    UnexpectedId { expected: u16, received: u16 },

    #[error("resolution failed: {0}")]
    Resolution(#[from] ResolutionError),
}

pub type Result<T, E = DnsError> = std::result::Result<T, E>;
