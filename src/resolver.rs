//! Single queries and iterative resolution.
//!
//! [`Resolver`] drives the codec in [`crate::dns`] over an injected
//! [`Transport`]. It offers two entry points:
//!
//! - [`Resolver::lookup`] sends one question to one server and returns the
//!   decoded reply, the way `dig @server name type` does.
//! - [`Resolver::trace`] walks the delegation chain itself, starting from
//!   the root, the way `dig +trace` does.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dns_trace::dns::RecordType;
//! use dns_trace::resolver::{Resolver, ResolverConfig};
//! use dns_trace::transport::UdpTransport;
//!
//! let mut resolver = Resolver::new(UdpTransport::new(), ResolverConfig::default());
//! let response = resolver.trace("www.example.com", RecordType::A)?;
//! for addr in response.addresses() {
//!     println!("{}", addr);
//! }
//! # Ok::<(), dns_trace::error::DnsError>(())
//! ```
//!
//! # Failure Handling
//!
//! A timeout or socket error on any round aborts the whole resolution; no
//! other server is tried. Every recursive step is bounded by a counter in
//! [`ResolverConfig`]:
//!
//! - following a CNAME restarts resolution for the target, at most
//!   `max_cname_depth` times in a chain
//! - resolving a nameserver that came without glue nests a full resolution,
//!   at most `max_ns_depth` levels deep
//! - each resolution pass follows at most `max_referrals` delegations

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use fastrand::Rng;
use tracing::{debug, info, trace, warn};

use crate::dns::{Header, Message, Question, RecordType, ResponseCode, Section, fqdn};
use crate::error::{DnsError, ResolutionError, Result};
use crate::transport::Transport;

/// Port every nameserver in a delegation is assumed to listen on.
const DNS_PORT: u16 = 53;

/// Resolver tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Server asked for the root NS set at the start of every trace.
    pub seed_server: SocketAddr,
    /// Per-round-trip receive timeout.
    pub timeout: Duration,
    /// Payload size advertised in an OPT record; `None` sends plain
    /// RFC 1035 queries.
    pub udp_payload_size: Option<u16>,
    pub max_cname_depth: u8,
    pub max_ns_depth: u8,
    pub max_referrals: u8,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            // a.root-servers.net
            seed_server: SocketAddr::from(([198, 41, 0, 4], DNS_PORT)),
            timeout: Duration::from_secs(5),
            udp_payload_size: Some(4096),
            max_cname_depth: 8,
            max_ns_depth: 4,
            max_referrals: 16,
        }
    }
}

/// What one iterative round learned.
enum Step {
    Done(Message),
    Cname(String),
    Referral(Ipv4Addr),
}

/// A DNS client over some [`Transport`].
///
/// The resolver owns its random number generator; transaction IDs and
/// every choice between equivalent servers come from it. Two resolvers
/// built with [`Resolver::with_rng`] from the same seed and fed the same
/// responses send identical queries to identical servers.
pub struct Resolver<T> {
    transport: T,
    config: ResolverConfig,
    rng: Rng,
}

impl<T: Transport> Resolver<T> {
    /// Creates a resolver whose generator is seeded from system entropy.
    pub fn new(transport: T, config: ResolverConfig) -> Self {
        Self::with_rng(transport, config, Rng::new())
    }

    /// Creates a resolver drawing IDs and server choices from `rng`.
    ///
    /// A seeded generator makes both reproducible.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dns_trace::dns::RecordType;
    /// use dns_trace::resolver::{Resolver, ResolverConfig};
    /// use dns_trace::transport::UdpTransport;
    ///
    /// let config = ResolverConfig::default();
    /// let mut a = Resolver::with_rng(UdpTransport::new(), config.clone(), fastrand::Rng::with_seed(1));
    /// let mut b = Resolver::with_rng(UdpTransport::new(), config, fastrand::Rng::with_seed(1));
    /// let id = |r: &mut Resolver<UdpTransport>| r.build_query("example.com", RecordType::A, true).unwrap().id();
    /// assert_eq!(id(&mut a), id(&mut b));
    /// ```
    pub fn with_rng(transport: T, config: ResolverConfig, rng: Rng) -> Self {
        Resolver {
            transport,
            config,
            rng,
        }
    }

    /// Settings this resolver was built with.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Builds a standard query for `name`/`rtype` with a fresh random ID.
    ///
    /// The message carries one question and, unless the configured payload
    /// size is `None`, one OPT pseudo-record. The name is checked when the
    /// message is packed, not here.
    ///
    /// # Errors
    ///
    /// Only fails if a section count would overflow, which a fresh message
    /// cannot hit.
    pub fn build_query(
        &mut self,
        name: &str,
        rtype: RecordType,
        recursion_desired: bool,
    ) -> Result<Message> {
        let header = Header {
            id: self.rng.u16(..),
            recursion_desired,
            ..Header::default()
        };
        let mut query = Message::with_header(header);
        query.add_question(Question::new(name, rtype))?;
        if let Some(payload_size) = self.config.udp_payload_size {
            query.add_opt(payload_size)?;
        }
        Ok(query)
    }

    /// Sends one query to `server` and decodes the reply.
    ///
    /// NXDOMAIN is a valid answer and comes back as `Ok`; any other
    /// non-zero response code is returned as [`DnsError::Protocol`].
    pub fn lookup(
        &mut self,
        server: SocketAddr,
        name: &str,
        rtype: RecordType,
        recursion_desired: bool,
    ) -> Result<Message> {
        let query = self.build_query(name, rtype, recursion_desired)?;
        let bytes = query.pack()?;

        debug!(server = %server, qname = name, rtype = %rtype, id = query.id(), "sending query");
        let reply = self.transport.send(server, &bytes, self.config.timeout)?;
        let response = Message::from_bytes(&reply)?;

        if response.id() != query.id() {
            return Err(DnsError::UnexpectedId {
                expected: query.id(),
                received: response.id(),
            });
        }
        if response.header().truncated {
            warn!(server = %server, qname = name, "response truncated, using partial answer");
        }

        match response.response_code() {
            ResponseCode::NoError | ResponseCode::NameError => {
                debug!(
                    server = %server,
                    rcode = %response.response_code(),
                    answers = response.answers().len(),
                    authorities = response.authorities().len(),
                    additionals = response.additionals().len(),
                    "received response"
                );
                Ok(response)
            }
            rcode => Err(DnsError::Protocol { server, rcode }),
        }
    }

    /// Resolves `name`/`rtype` iteratively, starting at the root.
    ///
    /// Returns the first response that ends the walk: an answer, an
    /// NXDOMAIN, or a reply that neither answers nor delegates further.
    pub fn trace(&mut self, name: &str, rtype: RecordType) -> Result<Message> {
        self.resolve_iteratively(name, rtype, 0, 0)
    }

    fn resolve_iteratively(
        &mut self,
        name: &str,
        rtype: RecordType,
        cname_depth: u8,
        ns_depth: u8,
    ) -> Result<Message> {
        let mut server = self.root_server()?;

        for round in 0..self.config.max_referrals {
            debug!(server = %server, qname = name, rtype = %rtype, round, ns_depth, "iterative query");
            let target = SocketAddr::from((server, DNS_PORT));
            let response = self.lookup(target, name, rtype, false)?;

            match self.next_step(name, rtype, response, ns_depth)? {
                Step::Done(response) => return Ok(response),
                Step::Cname(alias) => {
                    if cname_depth >= self.config.max_cname_depth {
                        return Err(ResolutionError::CnameDepthExceeded {
                            name: name.to_string(),
                            limit: self.config.max_cname_depth,
                        }
                        .into());
                    }
                    info!(qname = %fqdn(name), target = %fqdn(&alias), "following CNAME");
                    return self.resolve_iteratively(&alias, rtype, cname_depth + 1, ns_depth);
                }
                Step::Referral(next) => {
                    info!(qname = %fqdn(name), from = %server, to = %next, "following referral");
                    server = next;
                }
            }
        }

        Err(ResolutionError::TooManyReferrals {
            name: name.to_string(),
            limit: self.config.max_referrals,
        }
        .into())
    }

    /// Decides what to do with a non-recursive reply.
    fn next_step(
        &mut self,
        name: &str,
        rtype: RecordType,
        response: Message,
        ns_depth: u8,
    ) -> Result<Step> {
        if response.response_code() == ResponseCode::NameError {
            return Ok(Step::Done(response));
        }

        if !response.answers().is_empty() {
            let alias = match rtype {
                RecordType::CNAME | RecordType::ANY => None,
                _ => response.cname_target(name).map(str::to_string),
            };
            return Ok(match alias {
                Some(alias) => Step::Cname(alias),
                None => Step::Done(response),
            });
        }

        let glued: Vec<Ipv4Addr> = response
            .glue(Section::Authority)
            .into_values()
            .flatten()
            .collect();
        if let Some(addr) = self.pick(&glued) {
            return Ok(Step::Referral(addr));
        }

        let unglued: Vec<String> = response
            .authority_ns()
            .into_iter()
            .map(str::to_string)
            .collect();
        match self.pick(&unglued) {
            Some(ns) => {
                trace!(ns = %fqdn(&ns), "delegation without glue");
                let addr = self.resolve_nameserver(&ns, ns_depth)?;
                Ok(Step::Referral(addr))
            }
            None => Ok(Step::Done(response)),
        }
    }

    /// Finds an IPv4 address for a nameserver by resolving it from the root.
    fn resolve_nameserver(&mut self, ns: &str, ns_depth: u8) -> Result<Ipv4Addr> {
        if ns_depth >= self.config.max_ns_depth {
            return Err(ResolutionError::NsDepthExceeded {
                name: ns.to_string(),
                limit: self.config.max_ns_depth,
            }
            .into());
        }

        let response = self.resolve_iteratively(ns, RecordType::A, 0, ns_depth + 1)?;
        let addresses = response.addresses();
        self.pick(&addresses)
            .ok_or_else(|| ResolutionError::NoAddress(ns.to_string()).into())
    }

    /// Asks the seed server for the root NS set and picks one glued root.
    fn root_server(&mut self) -> Result<Ipv4Addr> {
        let seed = self.config.seed_server;
        let response = self.lookup(seed, "", RecordType::NS, false)?;
        let roots: Vec<Ipv4Addr> = response
            .glue(Section::Answer)
            .into_values()
            .flatten()
            .collect();
        trace!(seed = %seed, roots = roots.len(), "primed root servers");
        self.pick(&roots)
            .ok_or_else(|| ResolutionError::NoRootServers.into())
    }

    fn pick<U: Clone>(&mut self, candidates: &[U]) -> Option<U> {
        if candidates.is_empty() {
            None
        } else {
            Some(candidates[self.rng.usize(..candidates.len())].clone())
        }
    }
}
