//! Provides functions to turn operator input and CIDR table entries into
//! address ranges.
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use cidr_utils::cidr::Ipv4Cidr;
use thiserror::Error;

use crate::range::{parse_octets, parse_prefix, AddressRange, RangeError};

/// Published Cloudflare IPv4 blocks.
pub const CLOUDFLARE_CIDRS: [&str; 13] = [
    "104.16.0.0/12",
    "172.64.0.0/13",
    "162.158.0.0/15",
    "198.41.128.0/17",
    "108.162.192.0/18",
    "141.101.64.0/18",
    "173.245.48.0/20",
    "188.114.96.0/20",
    "190.93.240.0/20",
    "197.234.240.0/22",
    "103.21.244.0/22",
    "103.22.200.0/22",
    "103.31.4.0/22",
];

/// Why a target could not be built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// The address or prefix is malformed.
    #[error(transparent)]
    Range(#[from] RangeError),

    /// The CIDR table entry could not be parsed.
    #[error("Invalid CIDR '{cidr}': {reason}")]
    InvalidCidr {
        /// Offending entry.
        cidr: String,
        /// Parser message.
        reason: String,
    },

    /// The table choice is not a number of the table.
    #[error("Invalid choice '{0}'. Pick a number between 1 and {max}", max = CLOUDFLARE_CIDRS.len())]
    InvalidChoice(String),
}

/// A range to scan, with the text it was requested as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// How the operator named the range.
    pub label: String,
    /// Range to enumerate.
    pub range: AddressRange,
    /// Prefix length when the range came from CIDR notation.
    pub prefix: Option<u8>,
}

impl Target {
    /// Whether the prefix was applied to a start that is not a network
    /// address, which makes the range differ from the conventional block.
    #[must_use]
    pub fn is_unaligned(&self) -> bool {
        self.prefix
            .is_some_and(|prefix| !self.range.is_network_aligned(prefix))
    }

    /// The block the prefix conventionally denotes, e.g. `192.168.1.0/24`
    /// for `192.168.1.1/24`.
    #[must_use]
    pub fn conventional_network(&self) -> Option<String> {
        let prefix = self.prefix?;
        let mask = u32::MAX
            .checked_shl(32 - u32::from(prefix))
            .unwrap_or(0);
        let network = Ipv4Addr::from_bits(self.range.start_ip().to_bits() & mask);
        Some(format!("{network}/{prefix}"))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Builds a manual target.
///
/// `start` is a dotted quad, optionally followed by `/prefix`. Without a
/// prefix the range runs up to `end`, or up to `255.255.255.255` when no end
/// is given. With a prefix, `end` is ignored.
///
/// ```rust
/// # use ipsweep::address::parse_target;
/// let target = parse_target("192.168.1.1", Some("192.168.1.20")).unwrap();
/// assert_eq!(target.range.iter().count(), 18);
/// ```
pub fn parse_target(start: &str, end: Option<&str>) -> Result<Target, TargetError> {
    let start = start.trim();

    if let Some((address, prefix)) = start.split_once('/') {
        let prefix = parse_prefix(prefix)?;
        let range = AddressRange::from_cidr(parse_octets(address)?, prefix)?;
        return Ok(Target {
            label: start.to_owned(),
            range,
            prefix: Some(prefix),
        });
    }

    let [a, b, c, d] = parse_octets(start)?.octets();
    let mut range = AddressRange::new(a, b, c, d);
    if let Some(end) = end {
        range = range.with_end(parse_octets(end)?)?;
    }

    Ok(Target {
        label: range.to_string(),
        range,
        prefix: None,
    })
}

/// Builds the target of a `base/prefix` table entry.
pub fn cidr_target(cidr: &str) -> Result<Target, TargetError> {
    let block = Ipv4Cidr::from_str(cidr).map_err(|e| TargetError::InvalidCidr {
        cidr: cidr.to_owned(),
        reason: e.to_string(),
    })?;
    let prefix = block.network_length();

    Ok(Target {
        label: cidr.to_owned(),
        range: AddressRange::from_cidr(block.first_address(), prefix)?,
        prefix: Some(prefix),
    })
}

/// Builds the target of the `choice`-th Cloudflare block, counting from 1.
pub fn cloudflare_target(choice: usize) -> Result<Target, TargetError> {
    let cidr = choice
        .checked_sub(1)
        .and_then(|index| CLOUDFLARE_CIDRS.get(index))
        .ok_or_else(|| TargetError::InvalidChoice(choice.to_string()))?;
    cidr_target(cidr)
}

/// Same as [`cloudflare_target`] for a choice typed by the operator.
pub fn parse_cloudflare_choice(choice: &str) -> Result<Target, TargetError> {
    let choice = choice.trim();
    choice
        .parse::<usize>()
        .map_err(|_| TargetError::InvalidChoice(choice.to_owned()))
        .and_then(cloudflare_target)
        .map_err(|e| match e {
            TargetError::InvalidChoice(_) => TargetError::InvalidChoice(choice.to_owned()),
            other => other,
        })
}

/// Every Cloudflare block, in table order.
pub fn cloudflare_targets() -> Result<Vec<Target>, TargetError> {
    CLOUDFLARE_CIDRS.iter().copied().map(cidr_target).collect()
}
