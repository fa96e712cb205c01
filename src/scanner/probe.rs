//! Per-address probing: a ping first, then a single plaintext HTTP request.
use futures::future::{BoxFuture, FutureExt};
use log::debug;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use surge_ping::{Client, Config as PingConfig, PingIdentifier, PingSequence};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    time,
};

const PING_PAYLOAD: [u8; 8] = [0; 8];
const MAX_STATUS_LINE: u64 = 1024;
const DEFAULT_HTTP_PORT: u16 = 80;

/// What a live host answered to the HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The server answered with a non error status.
    Status(u16),
    /// The server answered with a 4xx or 5xx status.
    HttpError {
        /// Status code.
        code: u16,
        /// Reason phrase from the status line.
        reason: String,
    },
    /// The host answered the ping but the request failed.
    Failed(String),
}

impl Outcome {
    fn from_status(code: u16, reason: String) -> Self {
        if code >= 400 {
            Self::HttpError { code, reason }
        } else {
            Self::Status(code)
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "{code}"),
            Self::HttpError { code, reason } => write!(f, "HTTP Error {code}: {reason}"),
            Self::Failed(detail) => write!(f, "PING-Reply {detail}"),
        }
    }
}

/// One recorded host: the address and what it answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Probed address.
    pub address: Ipv4Addr,
    /// Answer to the HTTP request.
    pub outcome: Outcome,
}

impl ScanResult {
    /// Pairs an address with its outcome.
    #[must_use]
    pub const fn new(address: Ipv4Addr, outcome: Outcome) -> Self {
        Self { address, outcome }
    }
}

/// Single line form written to the results file.
impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.address, self.outcome)
    }
}

/// Something that checks one address.
///
/// `None` means the address did not respond and is dropped from the results.
/// Failures past that point are reported inside the returned [`ScanResult`],
/// never as a panic or error, so one bad host cannot abort a scan.
pub trait Probe: Send + Sync {
    /// Probes a single address.
    fn probe(&self, address: Ipv4Addr) -> BoxFuture<'_, Option<ScanResult>>;
}

/// Cheap reachability check run before the HTTP request.
pub trait Liveness: Send + Sync {
    /// Whether the address answered.
    fn is_alive(&self, address: Ipv4Addr) -> BoxFuture<'_, bool>;
}

/// ICMP echo with an 8 byte payload.
pub struct IcmpLiveness {
    client: Client,
    timeout: Duration,
    identifier: AtomicU16,
}

impl IcmpLiveness {
    /// Opens the ICMP socket. Must be called from within a tokio runtime.
    pub fn new(timeout: Duration) -> io::Result<Self> {
        Ok(Self {
            client: Client::new(&PingConfig::default())?,
            timeout,
            identifier: AtomicU16::new(0),
        })
    }
}

impl Liveness for IcmpLiveness {
    fn is_alive(&self, address: Ipv4Addr) -> BoxFuture<'_, bool> {
        async move {
            let identifier = PingIdentifier(self.identifier.fetch_add(1, Ordering::Relaxed));
            let mut pinger = self.client.pinger(IpAddr::V4(address), identifier).await;
            pinger.timeout(self.timeout);

            match pinger.ping(PingSequence(0), &PING_PAYLOAD).await {
                Ok((_, rtt)) => {
                    debug!("Ping reply from {address} after {rtt:?}");
                    true
                }
                Err(e) => {
                    debug!("No ping reply from {address}: {e}");
                    false
                }
            }
        }
        .boxed()
    }
}

/// Timeouts and target of the two probe stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// How long to wait for a ping reply.
    pub ping_timeout: Duration,
    /// Budget for the whole HTTP request, connect included.
    pub http_timeout: Duration,
    /// Port the HTTP request goes to.
    pub port: u16,
    /// Optional HTTP proxy every request is sent through.
    pub proxy: Option<SocketAddr>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ping_timeout: Duration::from_secs(4),
            http_timeout: Duration::from_secs(30),
            port: DEFAULT_HTTP_PORT,
            proxy: None,
        }
    }
}

/// The production probe: skip the address unless it answers a ping, then
/// send one `GET /` and record the status.
pub struct HttpProbe<L = IcmpLiveness> {
    liveness: L,
    config: ProbeConfig,
}

impl HttpProbe {
    /// Builds a probe that pings over ICMP.
    pub fn new(config: ProbeConfig) -> io::Result<Self> {
        let liveness = IcmpLiveness::new(config.ping_timeout)?;
        Ok(Self::with_liveness(liveness, config))
    }
}

impl<L: Liveness> HttpProbe<L> {
    /// Builds a probe around any liveness check.
    pub const fn with_liveness(liveness: L, config: ProbeConfig) -> Self {
        Self { liveness, config }
    }

    async fn request(&self, address: Ipv4Addr) -> Outcome {
        match time::timeout(self.config.http_timeout, self.fetch_status(address)).await {
            Ok(Ok((code, reason))) => Outcome::from_status(code, reason),
            Ok(Err(e)) => Outcome::Failed(e.to_string()),
            Err(_) => Outcome::Failed(format!(
                "timed out after {}s",
                self.config.http_timeout.as_secs_f32()
            )),
        }
    }

    async fn fetch_status(&self, address: Ipv4Addr) -> io::Result<(u16, String)> {
        let host = if self.config.port == DEFAULT_HTTP_PORT {
            address.to_string()
        } else {
            format!("{address}:{}", self.config.port)
        };

        let (target, request_target) = match self.config.proxy {
            Some(proxy) => (proxy, format!("http://{host}/")),
            None => (SocketAddr::from((address, self.config.port)), "/".to_owned()),
        };

        let mut stream = TcpStream::connect(target).await?;
        let request = format!(
            "GET {request_target} HTTP/1.1\r\nHost: {host}\r\nUser-Agent: ipsweep/{}\r\nAccept: */*\r\nConnection: close\r\n\r\n",
            env!("CARGO_PKG_VERSION")
        );
        stream.write_all(request.as_bytes()).await?;

        let mut reader = BufReader::new(stream.take(MAX_STATUS_LINE));
        let mut status_line = String::new();
        reader.read_line(&mut status_line).await?;
        parse_status_line(&status_line)
    }
}

impl<L: Liveness> Probe for HttpProbe<L> {
    fn probe(&self, address: Ipv4Addr) -> BoxFuture<'_, Option<ScanResult>> {
        async move {
            if !self.liveness.is_alive(address).await {
                return None;
            }
            let outcome = self.request(address).await;
            debug!("{address} answered {outcome}");
            Some(ScanResult::new(address, outcome))
        }
        .boxed()
    }
}

/// Splits `HTTP/1.1 404 Not Found` into its code and reason phrase.
fn parse_status_line(line: &str) -> io::Result<(u16, String)> {
    let line = line.trim_end();
    if line.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "empty response",
        ));
    }

    let malformed = || {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("malformed status line {line:?}"),
        )
    };

    let mut parts = line.splitn(3, ' ');
    let version = parts.next().ok_or_else(malformed)?;
    if !version.starts_with("HTTP/") {
        return Err(malformed());
    }
    let code = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| (100..1000).contains(code))
        .ok_or_else(malformed)?;
    let reason = parts.next().unwrap_or_default().trim().to_owned();

    Ok((code, reason))
}
