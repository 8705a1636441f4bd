//! A small DNS client: an RFC 1035 message codec, a pluggable datagram
//! transport and an iterative resolver that walks delegations from the root.

pub mod cursor;
pub mod dns;
pub mod error;
pub mod resolver;
pub mod transport;

pub use dns::{Message, RecordType};
pub use error::{DnsError, Result};
pub use resolver::{Resolver, ResolverConfig};
pub use transport::{Transport, UdpTransport};
