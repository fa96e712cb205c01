//! Provides the IPv4 address range a sweep walks through.
//!
//! An [`AddressRange`] is a closed-form `(start, end)` pair of 32-bit
//! addresses. Enumeration never yields `start` itself and stops right before
//! `end`, so the range `10.0.0.1` to `10.0.0.50` produces `10.0.0.2` up to and
//! including `10.0.0.49`.
mod cursor;
pub use cursor::AddressIter;

use cidr_utils::cidr::Ipv4Cidr;
use itertools::Itertools;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

const MAX_PREFIX: u8 = 32;

/// Reasons an address range cannot be built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// An octet is not a whole number between 0 and 255.
    #[error("Invalid octet '{0}'. Octets must be whole numbers between 0 and 255")]
    InvalidOctet(String),

    /// The address does not have exactly four octets.
    #[error("Invalid address '{0}'. Expected four octets, for example 192.168.1.1")]
    OctetCount(String),

    /// The prefix length is not between 0 and 32.
    #[error("Invalid prefix length '{0}'. Expected a number between 0 and 32")]
    InvalidPrefix(String),

    /// The end address sorts before the start address.
    #[error("End address {end} is lower than start address {start}")]
    EndBeforeStart {
        /// First address of the range.
        start: Ipv4Addr,
        /// Rejected end address.
        end: Ipv4Addr,
    },
}

/// A span of IPv4 addresses, exclusive on both sides.
///
/// The end defaults to `255.255.255.255` and can be moved with
/// [`AddressRange::set_end`] or derived from a prefix length with
/// [`AddressRange::set_subnet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    start: u32,
    end: u32,
}

impl AddressRange {
    /// Creates a range starting at `a.b.c.d` that runs up to `255.255.255.255`.
    #[must_use]
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self {
            start: u32::from_be_bytes([a, b, c, d]),
            end: u32::MAX,
        }
    }

    /// Creates a range from a start address and a prefix length, see
    /// [`AddressRange::set_subnet`].
    pub fn from_cidr(start: Ipv4Addr, prefix: u8) -> Result<Self, RangeError> {
        let [a, b, c, d] = start.octets();
        Self::new(a, b, c, d).with_subnet(prefix)
    }

    /// Moves the end of the range to `a.b.c.d`.
    pub fn set_end(&mut self, a: u8, b: u8, c: u8, d: u8) -> Result<(), RangeError> {
        let end = u32::from_be_bytes([a, b, c, d]);
        if end < self.start {
            return Err(RangeError::EndBeforeStart {
                start: self.start_ip(),
                end: Ipv4Addr::from(end),
            });
        }
        self.end = end;
        Ok(())
    }

    /// Derives the end of the range from a prefix length.
    ///
    /// Every bit at a position greater or equal to `prefix` is set in a host
    /// mask, and each end octet is the matching mask octet OR the start octet.
    /// The result is the broadcast address of the block only when the start is
    /// already its network address: `10.0.0.7/24` ends at `10.0.0.255`, not at
    /// the broadcast of `10.0.0.0/24` computed from a masked start.
    pub fn set_subnet(&mut self, prefix: u8) -> Result<(), RangeError> {
        if prefix > MAX_PREFIX {
            return Err(RangeError::InvalidPrefix(prefix.to_string()));
        }
        let host_mask = u32::MAX.checked_shr(u32::from(prefix)).unwrap_or(0);
        self.end = self.start | host_mask;
        Ok(())
    }

    /// Consuming form of [`AddressRange::set_end`].
    pub fn with_end(mut self, end: Ipv4Addr) -> Result<Self, RangeError> {
        let [a, b, c, d] = end.octets();
        self.set_end(a, b, c, d)?;
        Ok(self)
    }

    /// Consuming form of [`AddressRange::set_subnet`].
    pub fn with_subnet(mut self, prefix: u8) -> Result<Self, RangeError> {
        self.set_subnet(prefix)?;
        Ok(self)
    }

    /// Returns a fresh cursor over the range.
    ///
    /// The first address produced is the one right after the start, and the
    /// end address itself is never produced.
    #[must_use]
    pub const fn iter(&self) -> AddressIter {
        AddressIter::new(self.start, self.end)
    }

    /// Estimated size of the range, used as the progress total.
    ///
    /// Multiplies the per-octet differences between end and start, counting a
    /// difference of zero as one. The figure only matches the real number of
    /// addresses when a single octet differs, so `10.0.0.1` to `10.0.0.50`
    /// gives 49 while the range yields 48 addresses. When the product is not
    /// positive the real count from [`AddressRange::address_count`] is used.
    #[must_use]
    pub fn len(&self) -> u64 {
        let product: i64 = self
            .start_ip()
            .octets()
            .iter()
            .zip(self.end_ip().octets())
            .map(|(&start, end)| match i64::from(end) - i64::from(start) {
                0 => 1,
                delta => delta,
            })
            .product();

        u64::try_from(product)
            .ok()
            .filter(|&len| len > 0)
            .unwrap_or_else(|| self.address_count())
    }

    /// Number of addresses the range actually yields.
    #[must_use]
    pub fn address_count(&self) -> u64 {
        u64::from(self.end.saturating_sub(self.start)).saturating_sub(1)
    }

    /// Whether iterating the range yields nothing. [`AddressRange::len`] still
    /// reports at least one in that case.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.address_count() == 0
    }

    /// First address of the range. Not produced by the iteration.
    #[must_use]
    pub const fn start_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from_bits(self.start)
    }

    /// Last address of the range. Not produced by the iteration.
    #[must_use]
    pub const fn end_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from_bits(self.end)
    }

    /// Whether the start address is the network address of `start/prefix`.
    ///
    /// When it is not, [`AddressRange::set_subnet`] keeps the host bits of the
    /// start and the range differs from the conventional CIDR block.
    #[must_use]
    pub fn is_network_aligned(&self, prefix: u8) -> bool {
        Ipv4Cidr::new(self.start_ip(), prefix).is_ok()
    }
}

impl<'a> IntoIterator for &'a AddressRange {
    type Item = Ipv4Addr;
    type IntoIter = AddressIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start_ip(), self.end_ip())
    }
}

/// Parses `a.b.c.d`, or `a.b.c.d/prefix` which also sets the subnet.
impl FromStr for AddressRange {
    type Err = RangeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        match input.split_once('/') {
            Some((address, prefix)) => {
                let prefix = parse_prefix(prefix)?;
                Self::from_cidr(parse_octets(address)?, prefix)
            }
            None => {
                let [a, b, c, d] = parse_octets(input)?.octets();
                Ok(Self::new(a, b, c, d))
            }
        }
    }
}

/// Parses a dotted quad, reporting which octet is wrong.
pub fn parse_octets(input: &str) -> Result<Ipv4Addr, RangeError> {
    let input = input.trim();
    let Some((a, b, c, d)) = input.split('.').collect_tuple() else {
        return Err(RangeError::OctetCount(input.to_owned()));
    };

    let octet = |part: &str| {
        part.trim()
            .parse::<u8>()
            .map_err(|_| RangeError::InvalidOctet(part.trim().to_owned()))
    };

    Ok(Ipv4Addr::new(octet(a)?, octet(b)?, octet(c)?, octet(d)?))
}

/// Parses a prefix length between 0 and 32.
pub fn parse_prefix(input: &str) -> Result<u8, RangeError> {
    input
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|&prefix| prefix <= MAX_PREFIX)
        .ok_or_else(|| RangeError::InvalidPrefix(input.trim().to_owned()))
}
