//! Command-line DNS lookup tool.
//!
//! Sends a single query to a chosen server, or with `--trace` resolves the
//! name iteratively from the root, and prints the reply in a dig-like
//! layout.
//!
//! # Usage
//!
//! ```bash
//! # A records for yahoo.com from 1.1.1.1
//! dns-trace yahoo.com
//!
//! # MX records, same server
//! dns-trace yahoo.com mx
//!
//! # AAAA records from 8.8.8.8 (type and server may come in either order)
//! dns-trace yahoo.com aaaa @8.8.8.8
//! dns-trace yahoo.com @8.8.8.8 aaaa
//!
//! # Root nameservers
//! dns-trace . ns
//!
//! # Non-recursive query
//! dns-trace yahoo.com a --norecurse
//!
//! # Iterative resolution from the root, logging every referral
//! dns-trace yahoo.com mx --trace --log-level info
//! ```

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use dns_trace::{RecordType, Resolver, ResolverConfig, UdpTransport};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_SERVER: &str = "1.1.1.1";

#[derive(Parser, Debug)]
#[command(name = "dns-trace")]
#[command(version)]
#[command(about = "DNS lookup tool with iterative tracing from the root")]
struct Cli {
    /// Domain name to query, e.g. example.com (use "." for the root)
    name: String,

    /// Record type (A, AAAA, MX, ...) and/or @server, in either order
    #[arg(value_name = "TYPE|@SERVER")]
    first: Option<String>,

    #[arg(value_name = "@SERVER|TYPE", hide = true)]
    second: Option<String>,

    /// Query with recursion desired cleared
    #[arg(long)]
    norecurse: bool,

    /// Resolve iteratively starting at the root servers
    #[arg(short = 't', long)]
    trace: bool,

    /// Per-query timeout in seconds
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Send plain queries without an EDNS(0) OPT record
    #[arg(long)]
    no_edns: bool,

    /// UDP payload size advertised in the OPT record
    #[arg(long, default_value_t = 4096)]
    payload_size: u16,

    /// Seed for transaction IDs and server selection
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// Record type and server picked out of the optional positionals.
#[derive(Debug, PartialEq, Eq)]
struct Target {
    rtype: RecordType,
    server: SocketAddr,
}

fn parse_target(first: Option<&str>, second: Option<&str>) -> anyhow::Result<Target> {
    let mut rtype = None;
    let mut server = None;
    for arg in [first, second].into_iter().flatten() {
        if let Some(addr) = arg.strip_prefix('@') {
            if server.replace(addr).is_some() {
                bail!("more than one server given");
            }
        } else if rtype.replace(arg).is_some() {
            bail!("more than one record type given");
        }
    }

    let rtype = match rtype {
        Some(s) => s
            .parse::<RecordType>()
            .map_err(anyhow::Error::msg)?,
        None => RecordType::A,
    };
    Ok(Target {
        rtype,
        server: parse_server(server.unwrap_or(DEFAULT_SERVER))?,
    })
}

/// Accepts `1.1.1.1`, `1.1.1.1:5353`, `2606:4700::1111` or `[::1]:53`.
fn parse_server(s: &str) -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let ip = s
        .parse::<IpAddr>()
        .with_context(|| format!("invalid server address: {}", s))?;
    Ok(SocketAddr::new(ip, 53))
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level: {}", level))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let target = parse_target(cli.first.as_deref(), cli.second.as_deref())?;
    debug!(?cli, ?target, "parsed arguments");

    let config = ResolverConfig {
        timeout: Duration::from_secs(cli.timeout),
        udp_payload_size: (!cli.no_edns).then_some(cli.payload_size),
        ..ResolverConfig::default()
    };
    let mut resolver = match cli.seed {
        Some(seed) => Resolver::with_rng(UdpTransport::new(), config, fastrand::Rng::with_seed(seed)),
        None => Resolver::new(UdpTransport::new(), config),
    };

    let response = if cli.trace {
        println!(
            "Tracing {} {} from {}...",
            cli.name,
            target.rtype,
            resolver.config().seed_server
        );
        resolver.trace(&cli.name, target.rtype)
    } else {
        println!(
            "Querying {} for {} records of {}...",
            target.server, target.rtype, cli.name
        );
        resolver.lookup(target.server, &cli.name, target.rtype, !cli.norecurse)
    }
    .with_context(|| format!("resolving {} {}", cli.name, target.rtype))?;

    println!("------------------------------------");
    print!("{}", response);
    Ok(())
}
