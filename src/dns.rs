//! DNS message types and their wire encoding.
//!
//! This module provides the typed representation of a DNS message and the
//! codec between those types and RFC 1035 wire bytes. It covers the 12-byte
//! header, questions, resource records and a closed set of RDATA shapes,
//! plus the EDNS(0) OPT pseudo-record (RFC 6891).
//!
//! # Core Types
//!
//! - [`RecordType`] - record type codes with their mnemonics
//! - [`Header`] - the 12-byte message header with its flag bits unpacked
//! - [`Question`] - a name/type/class triple
//! - [`ResourceRecord`] and [`RData`] - records and their type-specific payload
//! - [`Message`] - header plus the four sections
//!
//! # Examples
//!
//! Building a query and reading it back:
//!
//! ```rust
//! use dns_trace::dns::{Header, Message, Question, RecordType};
//!
//! let header = Header {
//!     id: 0x1b9d,
//!     recursion_desired: true,
//!     ..Header::default()
//! };
//! let mut query = Message::with_header(header);
//! query
//!     .add_question(Question::new("example.com", RecordType::A))
//!     .unwrap()
//!     .add_opt(4096)
//!     .unwrap();
//!
//! let bytes = query.pack().unwrap();
//! let decoded = Message::from_bytes(&bytes).unwrap();
//! assert_eq!(decoded, query);
//! assert_eq!(decoded.header().question_count, 1);
//! assert_eq!(decoded.header().additional_count, 1);
//! ```
//!
//! # Wire Format Compatibility
//!
//! Multi-byte fields are big-endian. Names are decompressed on decode but
//! always written uncompressed on encode, so the size of an encoded message
//! depends only on its contents.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    net::{Ipv4Addr, Ipv6Addr},
    str::FromStr,
};

use crate::cursor::{ByteCursor, encode_name};
use crate::error::{EncodeError, FormatError, NameError};

/// A resource record type.
///
/// Known types carry their mnemonic; any other code is kept as
/// [`RecordType::Unknown`] so that records of new types still decode.
///
/// # Examples
///
/// ```rust
/// use dns_trace::dns::RecordType;
///
/// assert_eq!("mx".parse::<RecordType>().unwrap(), RecordType::MX);
/// assert_eq!(u16::from(RecordType::AAAA), 28);
/// assert_eq!(RecordType::from(65280).to_string(), "TYPE65280");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address (RFC 1035).
    A,
    /// Authoritative nameserver (RFC 1035).
    NS,
    MD,
    MF,
    /// Canonical name (RFC 1035).
    CNAME,
    /// Start of a zone of authority (RFC 1035).
    SOA,
    MB,
    MG,
    MR,
    NULL,
    WKS,
    /// Domain name pointer (RFC 1035).
    PTR,
    HINFO,
    MINFO,
    /// Mail exchange (RFC 1035).
    MX,
    /// Text strings (RFC 1035).
    TXT,
    /// IPv6 address (RFC 3596).
    AAAA,
    SRV,
    /// EDNS(0) pseudo-record (RFC 6891).
    OPT,
    DS,
    RRSIG,
    DNSKEY,
    TLSA,
    /// Query for all records; only meaningful in a question.
    ANY,
    CAA,
    /// Any code not listed above.
    Unknown(u16),
}

const KNOWN_TYPES: &[(RecordType, u16, &str)] = &[
    (RecordType::A, 1, "A"),
    (RecordType::NS, 2, "NS"),
    (RecordType::MD, 3, "MD"),
    (RecordType::MF, 4, "MF"),
    (RecordType::CNAME, 5, "CNAME"),
    (RecordType::SOA, 6, "SOA"),
    (RecordType::MB, 7, "MB"),
    (RecordType::MG, 8, "MG"),
    (RecordType::MR, 9, "MR"),
    (RecordType::NULL, 10, "NULL"),
    (RecordType::WKS, 11, "WKS"),
    (RecordType::PTR, 12, "PTR"),
    (RecordType::HINFO, 13, "HINFO"),
    (RecordType::MINFO, 14, "MINFO"),
    (RecordType::MX, 15, "MX"),
    (RecordType::TXT, 16, "TXT"),
    (RecordType::AAAA, 28, "AAAA"),
    (RecordType::SRV, 33, "SRV"),
    (RecordType::OPT, 41, "OPT"),
    (RecordType::DS, 43, "DS"),
    (RecordType::RRSIG, 46, "RRSIG"),
    (RecordType::DNSKEY, 48, "DNSKEY"),
    (RecordType::TLSA, 52, "TLSA"),
    (RecordType::ANY, 255, "ANY"),
    (RecordType::CAA, 257, "CAA"),
];

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        KNOWN_TYPES
            .iter()
            .find(|(_, code, _)| *code == value)
            .map(|(rtype, _, _)| *rtype)
            .unwrap_or(RecordType::Unknown(value))
    }
}

impl From<RecordType> for u16 {
    fn from(rtype: RecordType) -> Self {
        match rtype {
            RecordType::Unknown(code) => code,
            known => KNOWN_TYPES
                .iter()
                .find(|(entry, _, _)| *entry == known)
                .map(|(_, code, _)| *code)
                .unwrap_or_default(),
        }
    }
}

impl FromStr for RecordType {
    type Err = String;

    /// Parses a mnemonic such as `aaaa`, case-insensitively, or the generic
    /// `TYPE<n>` form from RFC 3597.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        if let Some((rtype, _, _)) = KNOWN_TYPES.iter().find(|(_, _, name)| *name == upper) {
            return Ok(*rtype);
        }
        upper
            .strip_prefix("TYPE")
            .and_then(|code| code.parse::<u16>().ok())
            .map(RecordType::from)
            .ok_or_else(|| format!("Unknown record type: {}", s))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match KNOWN_TYPES.iter().find(|(rtype, _, _)| rtype == self) {
            Some((_, _, name)) => f.write_str(name),
            None => write!(f, "TYPE{}", u16::from(*self)),
        }
    }
}

/// The class of a question or record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordClass {
    /// The Internet.
    #[default]
    IN,
    CH,
    HS,
    NONE,
    ANY,
    Unknown(u16),
}

impl From<u16> for RecordClass {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordClass::IN,
            3 => RecordClass::CH,
            4 => RecordClass::HS,
            254 => RecordClass::NONE,
            255 => RecordClass::ANY,
            other => RecordClass::Unknown(other),
        }
    }
}

impl From<RecordClass> for u16 {
    fn from(class: RecordClass) -> Self {
        match class {
            RecordClass::IN => 1,
            RecordClass::CH => 3,
            RecordClass::HS => 4,
            RecordClass::NONE => 254,
            RecordClass::ANY => 255,
            RecordClass::Unknown(other) => other,
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordClass::IN => f.write_str("IN"),
            RecordClass::CH => f.write_str("CH"),
            RecordClass::HS => f.write_str("HS"),
            RecordClass::NONE => f.write_str("NONE"),
            RecordClass::ANY => f.write_str("ANY"),
            RecordClass::Unknown(other) => write!(f, "CLASS{}", other),
        }
    }
}

/// The 16-bit CLASS field of a resource record.
///
/// OPT pseudo-records reuse the field for the sender's UDP payload size,
/// so it is tagged by what it actually holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassField {
    Class(RecordClass),
    PayloadSize(u16),
}

impl ClassField {
    /// The 16-bit value carried in the CLASS position.
    pub fn to_u16(self) -> u16 {
        match self {
            ClassField::Class(class) => class.into(),
            ClassField::PayloadSize(size) => size,
        }
    }
}

impl fmt::Display for ClassField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassField::Class(class) => write!(f, "{}", class),
            ClassField::PayloadSize(size) => write!(f, "{}", size),
        }
    }
}

/// Response codes carried in the low four bits of the header flags.
///
/// Every 4-bit value maps to a variant, so decoding and re-encoding a header
/// never loses information.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Default)]
pub enum ResponseCode {
    /// No error condition.
    #[default]
    NoError,
    /// The server was unable to interpret the query.
    FormatError,
    /// The server failed to process the query.
    ServerFailure,
    /// The queried name does not exist (NXDOMAIN).
    NameError,
    /// The server does not support this kind of query.
    NotImplemented,
    /// The server refuses to answer for policy reasons.
    Refused,
    YxDomain,
    YxRrSet,
    NxRrSet,
    NotAuth,
    NotZone,
    /// Values 11 to 15.
    Unknown(u8),
}

impl From<u8> for ResponseCode {
    fn from(value: u8) -> Self {
        match value & 0x0F {
            0 => ResponseCode::NoError,
            1 => ResponseCode::FormatError,
            2 => ResponseCode::ServerFailure,
            3 => ResponseCode::NameError,
            4 => ResponseCode::NotImplemented,
            5 => ResponseCode::Refused,
            6 => ResponseCode::YxDomain,
            7 => ResponseCode::YxRrSet,
            8 => ResponseCode::NxRrSet,
            9 => ResponseCode::NotAuth,
            10 => ResponseCode::NotZone,
            other => ResponseCode::Unknown(other),
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(rcode: ResponseCode) -> Self {
        match rcode {
            ResponseCode::NoError => 0,
            ResponseCode::FormatError => 1,
            ResponseCode::ServerFailure => 2,
            ResponseCode::NameError => 3,
            ResponseCode::NotImplemented => 4,
            ResponseCode::Refused => 5,
            ResponseCode::YxDomain => 6,
            ResponseCode::YxRrSet => 7,
            ResponseCode::NxRrSet => 8,
            ResponseCode::NotAuth => 9,
            ResponseCode::NotZone => 10,
            ResponseCode::Unknown(other) => other & 0x0F,
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseCode::NoError => "NOERROR",
            ResponseCode::FormatError => "FORMERR",
            ResponseCode::ServerFailure => "SERVFAIL",
            ResponseCode::NameError => "NXDOMAIN",
            ResponseCode::NotImplemented => "NOTIMP",
            ResponseCode::Refused => "REFUSED",
            ResponseCode::YxDomain => "YXDOMAIN",
            ResponseCode::YxRrSet => "YXRRSET",
            ResponseCode::NxRrSet => "NXRRSET",
            ResponseCode::NotAuth => "NOTAUTH",
            ResponseCode::NotZone => "NOTZONE",
            ResponseCode::Unknown(other) => return write!(f, "RCODE{}", other),
        };
        f.write_str(name)
    }
}

/// Represents the 12-byte header of a DNS message according to RFC 1035.
///
/// The flags word is kept unpacked, one field per bit group:
///
/// ```text
///   0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// `opcode` uses the low four bits and `z` the low three; higher bits are
/// dropped on encode.
///
/// The section counts describe the message the header was decoded from. For
/// messages being built, [`Message`] keeps them in step with its sections.
///
/// # Examples
///
/// ```rust
/// use dns_trace::dns::{Header, ResponseCode};
///
/// let header = Header::from_flags(0x1b9d, 0x8183);
/// assert!(header.response);
/// assert!(header.recursion_desired);
/// assert_eq!(header.rcode, ResponseCode::NameError);
/// assert_eq!(header.flags(), 0x8183);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Transaction ID, echoed by the server.
    pub id: u16,
    /// QR: set on responses.
    pub response: bool,
    pub opcode: u8,
    /// AA: the responding server is authoritative for the answer.
    pub authoritative: bool,
    /// TC: the message was cut to fit the transport.
    pub truncated: bool,
    /// RD: the client asks the server to recurse.
    pub recursion_desired: bool,
    /// RA: the server offers recursion.
    pub recursion_available: bool,
    /// Reserved bits (AD and CD in DNSSEC-aware servers).
    pub z: u8,
    pub rcode: ResponseCode,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

impl Header {
    pub const LEN: usize = 12;

    /// Builds a header with all counts zero from an ID and a packed flags word.
    pub fn from_flags(id: u16, flags: u16) -> Self {
        Header {
            id,
            response: flags & 0x8000 != 0,
            opcode: ((flags >> 11) & 0x0F) as u8,
            authoritative: flags & 0x0400 != 0,
            truncated: flags & 0x0200 != 0,
            recursion_desired: flags & 0x0100 != 0,
            recursion_available: flags & 0x0080 != 0,
            z: ((flags >> 4) & 0x07) as u8,
            rcode: ResponseCode::from((flags & 0x0F) as u8),
            ..Header::default()
        }
    }

    /// Packs the flag fields into the 16-bit wire word.
    pub fn flags(&self) -> u16 {
        (u16::from(self.response) << 15)
            | (u16::from(self.opcode & 0x0F) << 11)
            | (u16::from(self.authoritative) << 10)
            | (u16::from(self.truncated) << 9)
            | (u16::from(self.recursion_desired) << 8)
            | (u16::from(self.recursion_available) << 7)
            | (u16::from(self.z & 0x07) << 4)
            | u16::from(u8::from(self.rcode))
    }

    /// Serializes the header and appends exactly 12 bytes to `buffer`.
    pub fn pack(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.id.to_be_bytes());
        buffer.extend_from_slice(&self.flags().to_be_bytes());
        buffer.extend_from_slice(&self.question_count.to_be_bytes());
        buffer.extend_from_slice(&self.answer_count.to_be_bytes());
        buffer.extend_from_slice(&self.authority_count.to_be_bytes());
        buffer.extend_from_slice(&self.additional_count.to_be_bytes());
    }

    /// Reads a header from the cursor, advancing it by 12 bytes.
    pub fn unpack(cursor: &mut ByteCursor<'_>) -> Result<Self, FormatError> {
        let id = cursor.read_u16()?;
        let flags = cursor.read_u16()?;
        Ok(Header {
            question_count: cursor.read_u16()?,
            answer_count: cursor.read_u16()?,
            authority_count: cursor.read_u16()?,
            additional_count: cursor.read_u16()?,
            ..Header::from_flags(id, flags)
        })
    }

    fn counts_zeroed(self) -> Self {
        Header {
            question_count: 0,
            answer_count: 0,
            authority_count: 0,
            additional_count: 0,
            ..self
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            ";; opcode: {}, status: {}, id: {}",
            self.opcode, self.rcode, self.id
        )?;
        let flags: Vec<&str> = [
            (self.response, "qr"),
            (self.authoritative, "aa"),
            (self.truncated, "tc"),
            (self.recursion_desired, "rd"),
            (self.recursion_available, "ra"),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, name)| *name)
        .collect();
        write!(
            f,
            ";; flags: {}; QUERY: {}, ANSWER: {}, AUTHORITY: {}, ADDITIONAL: {}",
            flags.join(" "),
            self.question_count,
            self.answer_count,
            self.authority_count,
            self.additional_count
        )
    }
}

/// A question: what is being asked about which name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: RecordType,
    pub qclass: RecordClass,
}

impl Question {
    /// A question of class IN.
    pub fn new(name: impl Into<String>, qtype: RecordType) -> Self {
        Question {
            name: name.into(),
            qtype,
            qclass: RecordClass::IN,
        }
    }

    /// Appends the question in wire order: name, QTYPE, QCLASS.
    ///
    /// # Errors
    ///
    /// Returns a [`NameError`] if the name cannot be encoded.
    pub fn pack(&self, buffer: &mut Vec<u8>) -> Result<(), NameError> {
        encode_name(buffer, &self.name)?;
        buffer.extend_from_slice(&u16::from(self.qtype).to_be_bytes());
        buffer.extend_from_slice(&u16::from(self.qclass).to_be_bytes());
        Ok(())
    }

    /// Reads a question at the cursor, following compression pointers.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dns_trace::cursor::ByteCursor;
    /// use dns_trace::dns::{Question, RecordType};
    ///
    /// let bytes = [3, b'c', b'o', b'm', 0, 0, 2, 0, 1];
    /// let question = Question::unpack(&mut ByteCursor::new(&bytes)).unwrap();
    /// assert_eq!(question, Question::new("com", RecordType::NS));
    /// ```
    pub fn unpack(cursor: &mut ByteCursor<'_>) -> Result<Self, FormatError> {
        let name = cursor.read_name()?;
        let qtype = RecordType::from(cursor.read_u16()?);
        let qclass = RecordClass::from(cursor.read_u16()?);
        Ok(Question {
            name,
            qtype,
            qclass,
        })
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            ";{:<39} {:<7} {}",
            fqdn(&self.name),
            self.qclass,
            self.qtype
        )
    }
}

/// Start-of-authority fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Soa {
    /// Primary nameserver of the zone.
    pub mname: String,
    /// Mailbox of the person responsible, with the `@` as the first dot.
    pub rname: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    /// Minimum TTL, also the negative-caching TTL (RFC 2308).
    pub minimum: u32,
}

/// The type-specific payload of a resource record.
///
/// Names inside RDATA are decompressed against the whole message. Types
/// without a dedicated variant decode to [`RData::Other`]; that is a
/// fallback, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    NS(String),
    CNAME(String),
    PTR(String),
    MX { preference: u16, exchange: String },
    SOA(Soa),
    /// One entry per <character-string>, each at most 255 bytes. The
    /// bytes are kept as sent; TXT data need not be UTF-8.
    TXT(Vec<Vec<u8>>),
    /// EDNS(0) options, left unparsed.
    OPT(Vec<u8>),
    Other(Vec<u8>),
}

impl RData {
    /// Decodes `len` bytes of RDATA of type `rtype` at the cursor.
    ///
    /// The caller checks that exactly `len` bytes were consumed.
    fn unpack(
        rtype: RecordType,
        len: usize,
        cursor: &mut ByteCursor<'_>,
    ) -> Result<Self, FormatError> {
        let rdata = match rtype {
            RecordType::A => {
                expect_len(rtype, len, 4)?;
                let b = cursor.read_bytes(4)?;
                RData::A(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
            }
            RecordType::AAAA => {
                expect_len(rtype, len, 16)?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(cursor.read_bytes(16)?);
                RData::AAAA(Ipv6Addr::from(octets))
            }
            RecordType::NS => RData::NS(cursor.read_name()?),
            RecordType::CNAME => RData::CNAME(cursor.read_name()?),
            RecordType::PTR => RData::PTR(cursor.read_name()?),
            RecordType::MX => {
                let preference = cursor.read_u16()?;
                let exchange = cursor.read_name()?;
                RData::MX {
                    preference,
                    exchange,
                }
            }
            RecordType::SOA => RData::SOA(Soa {
                mname: cursor.read_name()?,
                rname: cursor.read_name()?,
                serial: cursor.read_u32()?,
                refresh: cursor.read_u32()?,
                retry: cursor.read_u32()?,
                expire: cursor.read_u32()?,
                minimum: cursor.read_u32()?,
            }),
            RecordType::TXT => {
                // One or more length-prefixed <character-string>s.
                let end = cursor.position() + len;
                let mut strings = Vec::new();
                while cursor.position() < end {
                    let text_len = usize::from(cursor.read_u8()?);
                    strings.push(cursor.read_bytes(text_len)?.to_vec());
                }
                RData::TXT(strings)
            }
            RecordType::OPT => RData::OPT(cursor.read_bytes(len)?.to_vec()),
            _ => RData::Other(cursor.read_bytes(len)?.to_vec()),
        };
        Ok(rdata)
    }

    /// Appends the uncompressed wire form of this payload.
    fn pack(&self, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
        match self {
            RData::A(addr) => buffer.extend_from_slice(&addr.octets()),
            RData::AAAA(addr) => buffer.extend_from_slice(&addr.octets()),
            RData::NS(name) | RData::CNAME(name) | RData::PTR(name) => {
                encode_name(buffer, name)?
            }
            RData::MX {
                preference,
                exchange,
            } => {
                buffer.extend_from_slice(&preference.to_be_bytes());
                encode_name(buffer, exchange)?;
            }
            RData::SOA(soa) => {
                encode_name(buffer, &soa.mname)?;
                encode_name(buffer, &soa.rname)?;
                for value in [soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum] {
                    buffer.extend_from_slice(&value.to_be_bytes());
                }
            }
            RData::TXT(strings) => {
                for text in strings {
                    let length = u8::try_from(text.len()).map_err(|_| {
                        EncodeError::CharacterStringTooLong { length: text.len() }
                    })?;
                    buffer.push(length);
                    buffer.extend_from_slice(text);
                }
            }
            RData::OPT(bytes) | RData::Other(bytes) => buffer.extend_from_slice(bytes),
        }
        Ok(())
    }
}

fn expect_len(rtype: RecordType, declared: usize, expected: usize) -> Result<(), FormatError> {
    if declared == expected {
        Ok(())
    } else {
        Err(FormatError::RDataLength {
            rtype: rtype.to_string(),
            declared,
            consumed: expected,
        })
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RData::A(addr) => write!(f, "{}", addr),
            RData::AAAA(addr) => write!(f, "{}", addr),
            RData::NS(name) | RData::CNAME(name) | RData::PTR(name) => {
                write!(f, "{}", fqdn(name))
            }
            RData::MX {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, fqdn(exchange)),
            RData::SOA(soa) => write!(
                f,
                "{} {} {} {} {} {} {}",
                fqdn(&soa.mname),
                fqdn(&soa.rname),
                soa.serial,
                soa.refresh,
                soa.retry,
                soa.expire,
                soa.minimum
            ),
            RData::TXT(strings) => {
                for (i, text) in strings.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    f.write_str("\"")?;
                    for &byte in text {
                        match byte {
                            b'"' | b'\\' => write!(f, "\\{}", char::from(byte))?,
                            0x20..=0x7e => write!(f, "{}", char::from(byte))?,
                            _ => write!(f, "\\{:03}", byte)?,
                        }
                    }
                    f.write_str("\"")?;
                }
                Ok(())
            }
            // RFC 3597 generic form.
            RData::OPT(bytes) | RData::Other(bytes) => {
                write!(f, "\\# {}", bytes.len())?;
                if !bytes.is_empty() {
                    f.write_str(" ")?;
                    for byte in bytes {
                        write!(f, "{:02x}", byte)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// A resource record.
///
/// Besides the decoded [`RData`], the record keeps the RDATA bytes exactly
/// as they appeared on the wire (or as they were first encoded, for records
/// built locally), available through [`ResourceRecord::raw_rdata`]. For
/// received records those bytes may contain compression pointers into the
/// original message; [`ResourceRecord::pack`] therefore always re-encodes
/// from the typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: String,
    pub rtype: RecordType,
    pub class: ClassField,
    /// Time to live in seconds.
    pub ttl: u32,
    pub data: RData,
    raw: Vec<u8>,
}

impl ResourceRecord {
    /// Builds a record, encoding its RDATA once to validate it.
    ///
    /// # Errors
    ///
    /// Fails if a name in the RDATA cannot be encoded, a TXT string is over
    /// 255 bytes or the encoded RDATA does not fit a 16-bit RDLENGTH.
    pub fn new(
        name: impl Into<String>,
        rtype: RecordType,
        class: ClassField,
        ttl: u32,
        data: RData,
    ) -> Result<Self, EncodeError> {
        let mut raw = Vec::new();
        data.pack(&mut raw)?;
        rdlength(rtype, raw.len())?;
        Ok(ResourceRecord {
            name: name.into(),
            rtype,
            class,
            ttl,
            data,
            raw,
        })
    }

    /// The EDNS(0) OPT pseudo-record advertising `payload_size`.
    ///
    /// Root owner, zero TTL (extended RCODE and flags all clear), no options.
    pub fn opt(payload_size: u16) -> Self {
        ResourceRecord {
            name: String::new(),
            rtype: RecordType::OPT,
            class: ClassField::PayloadSize(payload_size),
            ttl: 0,
            data: RData::OPT(Vec::new()),
            raw: Vec::new(),
        }
    }

    /// RDATA bytes as received, before any interpretation.
    pub fn raw_rdata(&self) -> &[u8] {
        &self.raw
    }

    /// The address of an A record.
    pub fn ipv4_address(&self) -> Option<Ipv4Addr> {
        match &self.data {
            RData::A(addr) => Some(*addr),
            _ => None,
        }
    }

    /// The target of an NS, CNAME or PTR record.
    pub fn target_name(&self) -> Option<&str> {
        match &self.data {
            RData::NS(name) | RData::CNAME(name) | RData::PTR(name) => Some(name),
            _ => None,
        }
    }

    /// Appends the record without name compression.
    ///
    /// # Errors
    ///
    /// Besides name errors, fails with [`EncodeError::RDataTooLong`] when
    /// the RDATA does not fit in RDLENGTH. Nothing usable is left in
    /// `buffer` on error.
    pub fn pack(&self, buffer: &mut Vec<u8>) -> Result<(), EncodeError> {
        encode_name(buffer, &self.name)?;
        buffer.extend_from_slice(&u16::from(self.rtype).to_be_bytes());
        buffer.extend_from_slice(&self.class.to_u16().to_be_bytes());
        buffer.extend_from_slice(&self.ttl.to_be_bytes());

        let length_at = buffer.len();
        buffer.extend_from_slice(&[0, 0]);
        self.data.pack(buffer)?;
        let length = rdlength(self.rtype, buffer.len() - length_at - 2)?;
        buffer[length_at..length_at + 2].copy_from_slice(&length.to_be_bytes());
        Ok(())
    }

    /// Decodes one record. The cursor must cover the whole message so that
    /// compressed names can be followed.
    pub fn unpack(cursor: &mut ByteCursor<'_>) -> Result<Self, FormatError> {
        let name = cursor.read_name()?;
        let rtype = RecordType::from(cursor.read_u16()?);
        // OPT is checked first: its CLASS field is not a class at all.
        let class_value = cursor.read_u16()?;
        let class = if rtype == RecordType::OPT {
            ClassField::PayloadSize(class_value)
        } else {
            ClassField::Class(RecordClass::from(class_value))
        };
        let ttl = cursor.read_u32()?;
        let rdlength = usize::from(cursor.read_u16()?);

        let start = cursor.position();
        let raw = cursor.read_bytes(rdlength)?.to_vec();
        cursor.set_position(start);

        let data = RData::unpack(rtype, rdlength, cursor)?;
        let consumed = cursor.position() - start;
        if consumed != rdlength {
            return Err(FormatError::RDataLength {
                rtype: rtype.to_string(),
                declared: rdlength,
                consumed,
            });
        }

        Ok(ResourceRecord {
            name,
            rtype,
            class,
            ttl,
            data,
            raw,
        })
    }
}

fn rdlength(rtype: RecordType, length: usize) -> Result<u16, EncodeError> {
    u16::try_from(length).map_err(|_| EncodeError::RDataTooLong {
        rtype: rtype.to_string(),
        length,
    })
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<30} {:<8} {:<7} {:<7} {}",
            fqdn(&self.name),
            self.ttl,
            self.class,
            self.rtype,
            self.data
        )
    }
}

/// The three record sections of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Answer,
    Authority,
    Additional,
}

/// A complete DNS message: header plus four ordered sections.
///
/// A message is either decoded with [`Message::from_bytes`], which copies
/// everything out of the datagram, or built with [`Message::with_header`]
/// and the `add_*` methods. In both cases the header's four counts match
/// the section lengths; the sections are only reachable through methods
/// that keep it that way.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    header: Header,
    questions: Vec<Question>,
    answers: Vec<ResourceRecord>,
    authorities: Vec<ResourceRecord>,
    additionals: Vec<ResourceRecord>,
}

impl Message {
    /// An empty message with the given flags. The header's counts are
    /// reset to zero.
    pub fn with_header(header: Header) -> Self {
        Message {
            header: header.counts_zeroed(),
            ..Message::default()
        }
    }

    /// The header, with counts matching the sections.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Transaction ID.
    pub fn id(&self) -> u16 {
        self.header.id
    }

    pub fn response_code(&self) -> ResponseCode {
        self.header.rcode
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &[ResourceRecord] {
        &self.answers
    }

    pub fn authorities(&self) -> &[ResourceRecord] {
        &self.authorities
    }

    /// Additional records, including any OPT pseudo-record.
    pub fn additionals(&self) -> &[ResourceRecord] {
        &self.additionals
    }

    /// Records of one section, in wire order.
    pub fn section(&self, section: Section) -> &[ResourceRecord] {
        match section {
            Section::Answer => &self.answers,
            Section::Authority => &self.authorities,
            Section::Additional => &self.additionals,
        }
    }

    /// Appends a question and bumps QDCOUNT.
    ///
    /// # Errors
    ///
    /// [`EncodeError::SectionFull`] once the section holds 65535 entries;
    /// the message is left unchanged.
    pub fn add_question(&mut self, question: Question) -> Result<&mut Self, EncodeError> {
        self.header.question_count = bump(self.header.question_count, "question")?;
        self.questions.push(question);
        Ok(self)
    }

    /// Appends a record to `section` and bumps that section's count.
    ///
    /// # Errors
    ///
    /// [`EncodeError::SectionFull`] once the section holds 65535 entries;
    /// the message is left unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::net::Ipv4Addr;
    /// use dns_trace::dns::{ClassField, Header, Message, RData, RecordClass, RecordType, ResourceRecord, Section};
    ///
    /// let record = ResourceRecord::new(
    ///     "example.com",
    ///     RecordType::A,
    ///     ClassField::Class(RecordClass::IN),
    ///     300,
    ///     RData::A(Ipv4Addr::new(192, 0, 2, 1)),
    /// )
    /// .unwrap();
    /// let mut message = Message::with_header(Header::default());
    /// message.add_record(Section::Answer, record).unwrap();
    /// assert_eq!(message.header().answer_count, 1);
    /// ```
    pub fn add_record(
        &mut self,
        section: Section,
        record: ResourceRecord,
    ) -> Result<&mut Self, EncodeError> {
        let (count, records, label) = match section {
            Section::Answer => (&mut self.header.answer_count, &mut self.answers, "answer"),
            Section::Authority => (
                &mut self.header.authority_count,
                &mut self.authorities,
                "authority",
            ),
            Section::Additional => (
                &mut self.header.additional_count,
                &mut self.additionals,
                "additional",
            ),
        };
        *count = bump(*count, label)?;
        records.push(record);
        Ok(self)
    }

    /// Appends an OPT pseudo-record to the additional section.
    pub fn add_opt(&mut self, payload_size: u16) -> Result<&mut Self, EncodeError> {
        self.add_record(Section::Additional, ResourceRecord::opt(payload_size))
    }

    /// Serializes header and sections in wire order, without compression.
    ///
    /// # Errors
    ///
    /// Returns the first [`EncodeError`] hit by a question or record.
    pub fn pack(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buffer = Vec::with_capacity(512);
        self.header.pack(&mut buffer);
        for question in &self.questions {
            question.pack(&mut buffer)?;
        }
        for record in self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additionals)
        {
            record.pack(&mut buffer)?;
        }
        Ok(buffer)
    }

    /// Decodes a complete message. Trailing bytes after the last declared
    /// record are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut cursor = ByteCursor::new(bytes);
        let header = Header::unpack(&mut cursor)?;

        let mut questions = Vec::with_capacity(usize::from(header.question_count));
        for _ in 0..header.question_count {
            questions.push(Question::unpack(&mut cursor)?);
        }

        let answers = unpack_records(&mut cursor, header.answer_count)?;
        let authorities = unpack_records(&mut cursor, header.authority_count)?;
        let additionals = unpack_records(&mut cursor, header.additional_count)?;

        Ok(Message {
            header,
            questions,
            answers,
            authorities,
            additionals,
        })
    }

    /// Maps nameserver names to glue addresses.
    ///
    /// Collects the NS records of `section` (the authority section for a
    /// referral, the answer section for a direct NS query) and pairs each
    /// with the A records for the same name in the additional section.
    /// Nameservers without glue are left out.
    pub fn glue(&self, section: Section) -> BTreeMap<String, Vec<Ipv4Addr>> {
        let nameservers: BTreeSet<String> = self
            .section(section)
            .iter()
            .filter(|record| record.rtype == RecordType::NS)
            .filter_map(|record| record.target_name())
            .map(normalize_name)
            .collect();

        let mut glue: BTreeMap<String, Vec<Ipv4Addr>> = BTreeMap::new();
        for record in &self.additionals {
            let Some(addr) = record.ipv4_address() else {
                continue;
            };
            let owner = normalize_name(&record.name);
            if nameservers.contains(&owner) {
                glue.entry(owner).or_default().push(addr);
            }
        }
        glue
    }

    /// Nameserver names from the NS records of the authority section.
    pub fn authority_ns(&self) -> Vec<&str> {
        self.authorities
            .iter()
            .filter(|record| record.rtype == RecordType::NS)
            .filter_map(|record| record.target_name())
            .collect()
    }

    /// Answer records of the given type.
    pub fn answer_records(&self, rtype: RecordType) -> impl Iterator<Item = &ResourceRecord> {
        self.answers.iter().filter(move |record| record.rtype == rtype)
    }

    /// The target of the answer-section CNAME owned by `name`, if any.
    pub fn cname_target(&self, name: &str) -> Option<&str> {
        self.answer_records(RecordType::CNAME)
            .find(|record| names_equal(&record.name, name))
            .and_then(|record| record.target_name())
    }

    /// All IPv4 addresses in the answer section.
    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        self.answers
            .iter()
            .filter_map(ResourceRecord::ipv4_address)
            .collect()
    }
}

fn bump(count: u16, section: &'static str) -> Result<u16, EncodeError> {
    count
        .checked_add(1)
        .ok_or(EncodeError::SectionFull(section))
}

fn unpack_records(
    cursor: &mut ByteCursor<'_>,
    count: u16,
) -> Result<Vec<ResourceRecord>, FormatError> {
    let mut records = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        records.push(ResourceRecord::unpack(cursor)?);
    }
    Ok(records)
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        writeln!(f)?;
        writeln!(f, ";; QUESTION SECTION:")?;
        for question in &self.questions {
            writeln!(f, "{}", question)?;
        }
        for (title, records) in [
            ("ANSWER", &self.answers),
            ("AUTHORITY", &self.authorities),
            ("ADDITIONAL", &self.additionals),
        ] {
            if records.is_empty() {
                continue;
            }
            writeln!(f)?;
            writeln!(f, ";; {} SECTION:", title)?;
            for record in records {
                writeln!(f, "{}", record)?;
            }
        }
        Ok(())
    }
}

/// Compares two names ASCII case-insensitively, ignoring a trailing dot.
pub fn names_equal(a: &str, b: &str) -> bool {
    a.trim_end_matches('.')
        .eq_ignore_ascii_case(b.trim_end_matches('.'))
}

fn normalize_name(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

/// Renders a name in absolute form, with the root as `.`.
pub fn fqdn(name: &str) -> String {
    match name {
        "" | "." => ".".to_string(),
        _ if name.ends_with('.') => name.to_string(),
        _ => format!("{}.", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Root NS response from 1.1.1.1: 14 answers (13 NS and an RRSIG) and
    /// 26 additional records (A/AAAA glue and OPT), heavily compressed.
    const RESPONSE_NS_ROOT: &[&str] = &[
        "1b9d81800001000e0000001a0000020001000002000100070bf2001401660c726f6f742d7365727665727303",
        "6e657400000002000100070bf200040163c01e000002000100070bf20004016ac01e000002000100070bf200",
        "04016dc01e000002000100070bf20004016bc01e000002000100070bf200040165c01e000002000100070bf2",
        "0004016cc01e000002000100070bf200040162c01e000002000100070bf200040161c01e000002000100070b",
        "f200040164c01e000002000100070bf200040169c01e000002000100070bf200040167c01e00000200010007",
        "0bf200040168c01e00002e000100070bf20113000208000007e9006243e3d06232b2402647001dfbd924aea4",
        "1fac479152a8b01572487d61d43af61a4f15a0a07d6c5dc20430493b9a4789368867f773c73e53c44fba1d36",
        "483e8680c5d16be32c9b300e899471acecc115330ebedb2613904bf09c460ee514fa3a7548f0c62d628312d3",
        "e170fe204767d56966e0f66c71ee81c88a560d36f4db9e155549cfb18d8e30373b7309b7b3776fc739156e74",
        "5a08fb981dce58fee3c5a4a6a3738ae406d1ff1c93544a6e8f1b2473e6ddeb32170c8662502dcc5b381c77d4",
        "517217550da09d6e17f5fac200b661a91869caf5fc93eebef1eaeece2e22c88665cce9462610ffcd17e1554f",
        "43e56eb4fe0c21a9a09655e7696643f4b6f48b9e0743a49167a5f02a6a09c0e000010001000860680004c661",
        "be35c0e0001c000100086068001020010500000100000000000000000053c01c00010001000861050004c005",
        "05f1c01c001c000100088d14001020010500002f0000000000000000000fc03b0001000100085dc00004c021",
        "040cc03b001c0001000888ee00102001050000020000000000000000000cc04a0001000100085f590004c03a",
        "801ec04a001c0001000861f40010200105030c2700000000000000020030c0590001000100085d980004ca0c",
        "1b21c059001c000100085dd0001020010dc3000000000000000000000035c0680001000100085d740004c100",
        "0e81c068001c0001000860d10010200107fd000000000000000000000001c07700010001000881750004c0cb",
        "e60ac077001c00010008675400102001050000a80000000000000000000ec086000100010008609f0004c707",
        "532ac086001c000100087009001020010500009f00000000000000000042c0950001000100085dbb0004c709",
        "0ec9c0a40001000100085d700004c6290004c0a4001c0001000861a3001020010503ba3e0000000000000002",
        "0030c0b300010001000861f00004c7075b0dc0b3001c0001000861f0001020010500002d0000000000000000",
        "000dc0c200010001000861ec0004c0249411c0c2001c000100085ff90010200107fe00000000000000000000",
        "0053c0d10001000100089b130004c0702404c0d1001c000100088d1400102001050000120000000000000000",
        "0d0d0000290200000080000000",
    ];

    /// A response for h.root-servers.net whose answer owner is a pointer
    /// back to the question name.
    const RESPONSE_A_WITH_JUMP: &str = "08758180000100010000000001680c726f6f742d73657276657273036e657400\
                                        00010001c00c00010001000882c00004c661be35";

    const RESPONSE_A_BERKELEY: &str = "62a6818000010001000000000561646e7333086265726b656c657903656475\
                                       0000010001c00c0001000100002a300004c06b668e";

    const QUERY_A_BERKELEY: &str = "026373086265726b656c6579036564750000010001";

    fn hex(s: &str) -> Vec<u8> {
        let s: String = s.split_whitespace().collect();
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn ns_root() -> Vec<u8> {
        hex(&RESPONSE_NS_ROOT.concat())
    }

    #[test]
    fn test_header_unpack() {
        let bytes = ns_root();
        let mut cursor = ByteCursor::new(&bytes);
        let header = Header::unpack(&mut cursor).unwrap();

        assert_eq!(header.id, 0x1b9d);
        assert!(header.response);
        assert_eq!(header.opcode, 0);
        assert!(!header.authoritative);
        assert!(!header.truncated);
        assert!(header.recursion_desired);
        assert!(header.recursion_available);
        assert_eq!(header.z, 0);
        assert_eq!(header.rcode, ResponseCode::NoError);
        assert_eq!(header.question_count, 1);
        assert_eq!(header.answer_count, 14);
        assert_eq!(header.authority_count, 0);
        assert_eq!(header.additional_count, 26);
        assert_eq!(cursor.position(), Header::LEN);

        let mut packed = Vec::new();
        header.pack(&mut packed);
        assert_eq!(packed, hex("1b9d81800001000e0000001a"));
    }

    #[test]
    fn test_header_flags_round_trip() {
        for flags in 0..=u16::MAX {
            let header = Header::from_flags(0xbeef, flags);
            assert_eq!(header.flags(), flags, "flags {:#06x}", flags);
            assert_eq!(Header::from_flags(header.id, header.flags()), header);
        }
    }

    #[test]
    fn test_header_bit_positions() {
        let header = Header {
            opcode: 2,
            authoritative: true,
            z: 0b010,
            rcode: ResponseCode::Refused,
            ..Header::default()
        };
        assert_eq!(header.flags(), 0b0_0010_1_0_0_0_010_0101);
    }

    #[test]
    fn test_question_round_trip() {
        let bytes = hex(QUERY_A_BERKELEY);
        let mut cursor = ByteCursor::new(&bytes);
        let question = Question::unpack(&mut cursor).unwrap();
        assert_eq!(question.name, "cs.berkeley.edu");
        assert_eq!(question.qtype, RecordType::A);
        assert_eq!(question.qclass, RecordClass::IN);

        let mut packed = Vec::new();
        question.pack(&mut packed).unwrap();
        assert_eq!(packed, bytes);
    }

    #[test]
    fn test_answer_name_behind_pointer() {
        let bytes = hex(RESPONSE_A_WITH_JUMP);
        let mut cursor = ByteCursor::new(&bytes);
        Header::unpack(&mut cursor).unwrap();
        let question = Question::unpack(&mut cursor).unwrap();
        let pointer_at = cursor.position();
        let record = ResourceRecord::unpack(&mut cursor).unwrap();

        assert_eq!(question.name, "h.root-servers.net");
        assert_eq!(record.name, question.name);
        assert_eq!(record.rtype, RecordType::A);
        assert_eq!(record.class, ClassField::Class(RecordClass::IN));
        assert_eq!(record.ttl, 557760);
        assert_eq!(record.raw_rdata(), &[198, 97, 190, 53]);
        assert_eq!(record.data, RData::A(Ipv4Addr::new(198, 97, 190, 53)));
        // 2-byte pointer + type, class, TTL, RDLENGTH + 4 bytes of RDATA.
        assert_eq!(cursor.position(), pointer_at + 2 + 10 + 4);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_message_from_bytes() {
        let message = Message::from_bytes(&hex(RESPONSE_A_BERKELEY)).unwrap();
        assert_eq!(message.id(), 0x62a6);
        assert_eq!(message.questions()[0].name, "adns3.berkeley.edu");
        assert_eq!(message.answers().len(), 1);
        assert_eq!(message.answers()[0].name, "adns3.berkeley.edu");
        assert_eq!(message.answers()[0].ttl, 10800);
        assert_eq!(
            message.addresses(),
            vec![Ipv4Addr::new(192, 107, 102, 142)]
        );
    }

    #[test]
    fn test_root_ns_response() {
        let message = Message::from_bytes(&ns_root()).unwrap();
        assert_eq!(message.questions()[0].name, "");
        assert_eq!(message.questions()[0].qtype, RecordType::NS);
        assert_eq!(message.answers().len(), 14);
        assert_eq!(message.additionals().len(), 26);
        assert_eq!(message.answer_records(RecordType::NS).count(), 13);

        let rrsig = &message.answers()[13];
        assert_eq!(rrsig.rtype, RecordType::RRSIG);
        assert!(matches!(&rrsig.data, RData::Other(bytes) if bytes.len() == 275));

        let opt = &message.additionals()[25];
        assert_eq!(opt.rtype, RecordType::OPT);
        assert_eq!(opt.class, ClassField::PayloadSize(512));
        assert_eq!(opt.ttl, 0x8000);

        let glue = message.glue(Section::Answer);
        // b.root-servers.net only has an A record, the others A and AAAA;
        // all thirteen have IPv4 glue.
        assert_eq!(glue.len(), 13);
        assert_eq!(
            glue["a.root-servers.net"],
            vec![Ipv4Addr::new(198, 41, 0, 4)]
        );
        assert_eq!(
            glue["h.root-servers.net"],
            vec![Ipv4Addr::new(198, 97, 190, 53)]
        );
        assert!(message.glue(Section::Authority).is_empty());
    }

    #[test]
    fn test_decode_is_idempotent() {
        let bytes = ns_root();
        assert_eq!(
            Message::from_bytes(&bytes).unwrap(),
            Message::from_bytes(&bytes).unwrap()
        );
    }

    #[test]
    fn test_truncated_message_is_format_error() {
        let bytes = hex(RESPONSE_A_WITH_JUMP);
        for len in 0..bytes.len() {
            assert!(
                Message::from_bytes(&bytes[..len]).is_err(),
                "prefix of {} bytes decoded",
                len
            );
        }
        assert_eq!(
            Message::from_bytes(&bytes[..bytes.len() - 1]),
            Err(FormatError::OutOfBounds {
                position: 48,
                needed: 4,
                remaining: 3
            })
        );
    }

    #[test]
    fn test_unknown_type_is_opaque() {
        let mut bytes = Vec::new();
        encode_name(&mut bytes, "example.com").unwrap();
        bytes.extend_from_slice(&[0xff, 0x00, 0x00, 0x01, 0, 0, 0, 60, 0, 3, 1, 2, 3]);
        let mut cursor = ByteCursor::new(&bytes);
        let record = ResourceRecord::unpack(&mut cursor).unwrap();
        assert_eq!(record.rtype, RecordType::Unknown(0xff00));
        assert_eq!(record.data, RData::Other(vec![1, 2, 3]));
        assert_eq!(record.data.to_string(), "\\# 3 010203");
    }

    #[test]
    fn test_bad_address_length() {
        let bytes = [0, 0, 1, 0, 1, 0, 0, 0, 0, 0, 3, 10, 0, 0];
        let mut cursor = ByteCursor::new(&bytes);
        assert_eq!(
            ResourceRecord::unpack(&mut cursor),
            Err(FormatError::RDataLength {
                rtype: "A".to_string(),
                declared: 3,
                consumed: 4
            })
        );
    }

    #[test]
    fn test_rdata_name_overruns_rdlength() {
        // CNAME whose RDLENGTH claims 2 bytes but whose name takes 5.
        let bytes = [0, 0, 5, 0, 1, 0, 0, 0, 0, 0, 2, 3, b'f', b'o', b'o', 0];
        let mut cursor = ByteCursor::new(&bytes);
        assert!(matches!(
            ResourceRecord::unpack(&mut cursor),
            Err(FormatError::RDataLength {
                declared: 2,
                consumed: 5,
                ..
            })
        ));
    }

    fn sample_message() -> Message {
        let header = Header {
            id: 42,
            response: true,
            authoritative: true,
            ..Header::default()
        };
        let mut message = Message::with_header(header);
        message
            .add_question(Question::new("example.com", RecordType::MX))
            .unwrap();
        let class = ClassField::Class(RecordClass::IN);
        let records = [
            (
                Section::Answer,
                ResourceRecord::new(
                    "example.com",
                    RecordType::MX,
                    class,
                    300,
                    RData::MX {
                        preference: 10,
                        exchange: "mail.example.com".to_string(),
                    },
                ),
            ),
            (
                Section::Answer,
                ResourceRecord::new(
                    "example.com",
                    RecordType::TXT,
                    class,
                    300,
                    RData::TXT(vec![b"v=spf1 -all".to_vec(), Vec::new()]),
                ),
            ),
            (
                Section::Authority,
                ResourceRecord::new(
                    "example.com",
                    RecordType::SOA,
                    class,
                    3600,
                    RData::SOA(Soa {
                        mname: "ns1.example.com".to_string(),
                        rname: "hostmaster.example.com".to_string(),
                        serial: 2024010101,
                        refresh: 7200,
                        retry: 900,
                        expire: 1209600,
                        minimum: 86400,
                    }),
                ),
            ),
            (
                Section::Authority,
                ResourceRecord::new(
                    "example.com",
                    RecordType::NS,
                    class,
                    3600,
                    RData::NS("ns1.example.com".to_string()),
                ),
            ),
            (
                Section::Additional,
                ResourceRecord::new(
                    "ns1.example.com",
                    RecordType::AAAA,
                    class,
                    3600,
                    RData::AAAA("2001:db8::53".parse().unwrap()),
                ),
            ),
            (
                Section::Additional,
                ResourceRecord::new(
                    "ns1.example.com",
                    RecordType::Unknown(65400),
                    ClassField::Class(RecordClass::CH),
                    0,
                    RData::Other(vec![0xde, 0xad]),
                ),
            ),
        ];
        for (section, record) in records {
            message.add_record(section, record.unwrap()).unwrap();
        }
        message.add_opt(1232).unwrap();
        message
    }

    #[test]
    fn test_builder_keeps_counts() {
        let message = sample_message();
        let header = message.header();
        assert_eq!(header.question_count, 1);
        assert_eq!(header.answer_count, 2);
        assert_eq!(header.authority_count, 2);
        assert_eq!(header.additional_count, 3);
    }

    #[test]
    fn test_pack_then_decode_all_variants() {
        let message = sample_message();
        let bytes = message.pack().unwrap();
        let decoded = Message::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_pack_writes_no_pointers() {
        let mut message = Message::with_header(Header::default());
        message
            .add_question(Question::new("example.com", RecordType::NS))
            .unwrap();
        let record = ResourceRecord::new(
            "example.com",
            RecordType::NS,
            ClassField::Class(RecordClass::IN),
            60,
            RData::NS("a.example.com".to_string()),
        )
        .unwrap();
        message.add_record(Section::Answer, record).unwrap();
        let bytes = message.pack().unwrap();
        // 12 header + 17 question + (13 owner + 10 fixed + 15 target).
        assert_eq!(bytes.len(), 12 + 17 + 13 + 10 + 15);
        assert!(!bytes.windows(2).any(|w| w == [0xc0, 0x0c]));
    }

    #[test]
    fn test_repack_decoded_compressed_message() {
        let message = Message::from_bytes(&ns_root()).unwrap();
        let repacked = message.pack().unwrap();
        assert!(repacked.len() > ns_root().len());

        let decoded = Message::from_bytes(&repacked).unwrap();
        assert_eq!(decoded.header(), message.header());
        for (after, before) in decoded.answers().iter().zip(message.answers()) {
            assert_eq!(after.name, before.name);
            assert_eq!(after.ttl, before.ttl);
            assert_eq!(after.data, before.data);
        }
        // Raw RDATA of the NS answers held pointers; re-encoded it does not.
        assert_eq!(message.answers()[1].target_name(), Some("c.root-servers.net"));
        assert_eq!(message.answers()[1].raw_rdata().len(), 4);
        assert_eq!(decoded.answers()[1].raw_rdata().len(), 20);
    }

    #[test]
    fn test_opt_record_wire_form() {
        let mut buffer = Vec::new();
        ResourceRecord::opt(4096).pack(&mut buffer).unwrap();
        assert_eq!(buffer, vec![0, 0, 41, 0x10, 0x00, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_oversized_rdata_is_rejected() {
        let class = ClassField::Class(RecordClass::IN);
        let err = ResourceRecord::new(
            "big.example.com",
            RecordType::Unknown(65400),
            class,
            0,
            RData::Other(vec![7; 70000]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EncodeError::RDataTooLong {
                rtype: "TYPE65400".to_string(),
                length: 70000,
            }
        );

        // A record whose data was swapped after construction still cannot
        // be packed with a wrapped RDLENGTH.
        let mut record = ResourceRecord::new(
            "big.example.com",
            RecordType::Unknown(65400),
            class,
            0,
            RData::Other(vec![7; 4]),
        )
        .unwrap();
        record.data = RData::Other(vec![7; 70000]);
        let mut buffer = Vec::new();
        assert!(matches!(
            record.pack(&mut buffer),
            Err(EncodeError::RDataTooLong { length: 70000, .. })
        ));

        let mut message = Message::with_header(Header::default());
        message.add_record(Section::Answer, record).unwrap();
        assert!(matches!(
            message.pack(),
            Err(EncodeError::RDataTooLong { .. })
        ));
    }

    #[test]
    fn test_txt_string_over_255_bytes() {
        let err = ResourceRecord::new(
            "example.com",
            RecordType::TXT,
            ClassField::Class(RecordClass::IN),
            300,
            RData::TXT(vec![vec![b'x'; 300]]),
        )
        .unwrap_err();
        assert_eq!(err, EncodeError::CharacterStringTooLong { length: 300 });
    }

    #[test]
    fn test_txt_keeps_raw_bytes() {
        // 255 bytes with a split UTF-8 sequence at the end.
        let mut text = "é".repeat(127).into_bytes();
        text.push(0xc3);
        assert_eq!(text.len(), 255);

        let record = ResourceRecord::new(
            "example.com",
            RecordType::TXT,
            ClassField::Class(RecordClass::IN),
            300,
            RData::TXT(vec![text.clone(), b"say \"hi\"".to_vec()]),
        )
        .unwrap();
        let mut message = Message::with_header(Header::default());
        message.add_record(Section::Answer, record).unwrap();

        let decoded = Message::from_bytes(&message.pack().unwrap()).unwrap();
        assert_eq!(decoded, message);
        let data = &decoded.answers()[0].data;
        assert_eq!(data, &RData::TXT(vec![text, b"say \"hi\"".to_vec()]));
        assert!(data.to_string().ends_with("\\195\" \"say \\\"hi\\\"\""));
    }

    #[test]
    fn test_section_count_overflow() {
        let mut message = Message::with_header(Header::default());
        for _ in 0..u16::MAX {
            message.add_question(Question::new("a", RecordType::A)).unwrap();
        }
        assert_eq!(
            message.add_question(Question::new("a", RecordType::A)),
            Err(EncodeError::SectionFull("question"))
        );
        assert_eq!(message.header().question_count, u16::MAX);
        assert_eq!(message.questions().len(), usize::from(u16::MAX));
    }

    #[test]
    fn test_glue_from_referral() {
        let mut message = Message::with_header(Header::default());
        let class = ClassField::Class(RecordClass::IN);
        let ns = ResourceRecord::new(
            "example.com",
            RecordType::NS,
            class,
            172800,
            RData::NS("ns1.example.com".to_string()),
        )
        .unwrap();
        let unglued = ResourceRecord::new(
            "example.com",
            RecordType::NS,
            class,
            172800,
            RData::NS("ns.elsewhere.net".to_string()),
        )
        .unwrap();
        let a = ResourceRecord::new(
            "NS1.example.com.",
            RecordType::A,
            class,
            172800,
            RData::A(Ipv4Addr::new(192, 0, 2, 53)),
        )
        .unwrap();
        let stray = ResourceRecord::new(
            "www.example.com",
            RecordType::A,
            class,
            300,
            RData::A(Ipv4Addr::new(192, 0, 2, 80)),
        )
        .unwrap();
        message
            .add_record(Section::Authority, ns)
            .and_then(|m| m.add_record(Section::Authority, unglued))
            .and_then(|m| m.add_record(Section::Additional, a))
            .and_then(|m| m.add_record(Section::Additional, stray))
            .unwrap();

        let glue = message.glue(Section::Authority);
        assert_eq!(glue.len(), 1);
        assert_eq!(glue["ns1.example.com"], vec![Ipv4Addr::new(192, 0, 2, 53)]);
        assert_eq!(
            message.authority_ns(),
            vec!["ns1.example.com", "ns.elsewhere.net"]
        );
    }

    #[test]
    fn test_cname_target() {
        let mut message = Message::with_header(Header::default());
        let record = ResourceRecord::new(
            "www.example.com",
            RecordType::CNAME,
            ClassField::Class(RecordClass::IN),
            60,
            RData::CNAME("web.example.net".to_string()),
        )
        .unwrap();
        message.add_record(Section::Answer, record).unwrap();
        assert_eq!(message.cname_target("WWW.example.com."), Some("web.example.net"));
        assert_eq!(message.cname_target("example.com"), None);
    }

    #[test]
    fn test_record_type_mnemonics() {
        assert_eq!("aaaa".parse::<RecordType>(), Ok(RecordType::AAAA));
        assert_eq!("Soa".parse::<RecordType>(), Ok(RecordType::SOA));
        assert_eq!("TYPE15".parse::<RecordType>(), Ok(RecordType::MX));
        assert_eq!("type999".parse::<RecordType>(), Ok(RecordType::Unknown(999)));
        assert!("BOGUS".parse::<RecordType>().is_err());

        assert_eq!(RecordType::from(41), RecordType::OPT);
        assert_eq!(u16::from(RecordType::CAA), 257);
        assert_eq!(RecordType::Unknown(999).to_string(), "TYPE999");
    }

    #[test]
    fn test_display_forms() {
        let soa = RData::SOA(Soa {
            mname: "a.gtld-servers.net".to_string(),
            rname: "nstld.verisign-grs.com".to_string(),
            serial: 1,
            refresh: 1800,
            retry: 900,
            expire: 604800,
            minimum: 86400,
        });
        assert_eq!(
            soa.to_string(),
            "a.gtld-servers.net. nstld.verisign-grs.com. 1 1800 900 604800 86400"
        );
        assert_eq!(ResponseCode::NameError.to_string(), "NXDOMAIN");
        assert_eq!(ResponseCode::from(12).to_string(), "RCODE12");
        assert_eq!(fqdn(""), ".");
        assert_eq!(fqdn("example.com"), "example.com.");
        assert_eq!(fqdn("example.com."), "example.com.");
    }
}
