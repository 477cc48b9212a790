//! CIDR network ranges: parsing, broadcast derivation, and ownership tests.
//!
//! A [`NetworkAddress`] is parsed from `"<ip>/<prefix>"` notation.  Parsing
//! normalises the address so that every host bit (every bit after the first
//! `significant_bits`) is zero, and derives the subnet broadcast address by
//! setting every host bit to one.
//!
//! # How CIDR masks work (for beginners)
//!
//! An IPv4 address is 32 bits.  The prefix length says how many of the
//! leading bits identify the *network*; the remaining bits identify a *host*
//! inside that network.  For `192.168.191.128/19`:
//!
//! ```text
//! 192      .168      .191      .128
//! 11000000  10101000  101|11111  10000000
//!                        ^ bit 19: host bits start here
//!
//! network   = 11000000 10101000 10100000 00000000 = 192.168.160.0
//! broadcast = 11000000 10101000 10111111 11111111 = 192.168.191.255
//! ```
//!
//! Every bit test in this module goes through [`bit_mask`], so sanitising,
//! broadcast derivation, and [`NetworkAddress::owns_address`] agree on which
//! bit a given position refers to.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

/// Error type for address parsing and local-address resolution.
#[derive(Debug, Error)]
pub enum AddressError {
    /// The CIDR string is malformed.
    #[error("invalid network address {input:?}: {reason}")]
    InvalidFormat { input: String, reason: String },

    /// No local interface address belongs to the configured network.
    #[error("no local interface address belongs to network {network}")]
    NoMatchingInterface { network: String },

    /// The host's interface list could not be read.
    #[error("failed to enumerate local interfaces: {0}")]
    InterfaceEnumeration(#[source] io::Error),
}

impl AddressError {
    fn invalid(input: &str, reason: impl Into<String>) -> Self {
        AddressError::InvalidFormat {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Capability that lists the unicast addresses assigned to this host.
///
/// The production implementation walks the OS interface table; tests supply
/// a fixed list.
#[cfg_attr(test, mockall::automock)]
pub trait LocalAddressSource {
    /// Returns every unicast address currently assigned to a local interface.
    fn unicast_addresses(&self) -> io::Result<Vec<IpAddr>>;
}

/// A parsed CIDR network range.
///
/// Immutable once constructed.  `address` has all host bits cleared and
/// `broadcast_address` has all host bits set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkAddress {
    address: IpAddr,
    significant_bits: u8,
    broadcast_address: IpAddr,
}

impl NetworkAddress {
    /// Parses `"<ip>/<prefix>"` notation.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::InvalidFormat`] when the text is empty, has no
    /// (or more than one) `/` separator, the IP part does not parse, or the
    /// prefix is not an integer within the address width.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use collab_core::NetworkAddress;
    ///
    /// let net = NetworkAddress::parse("192.168.191.128/19").unwrap();
    /// assert_eq!(net.address().to_string(), "192.168.160.0");
    /// assert_eq!(net.broadcast_address().to_string(), "192.168.191.255");
    /// ```
    pub fn parse(text: &str) -> Result<Self, AddressError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AddressError::invalid(text, "empty network address"));
        }

        let (ip_part, prefix_part) = trimmed
            .split_once('/')
            .ok_or_else(|| AddressError::invalid(text, "missing '/' prefix separator"))?;
        if prefix_part.contains('/') {
            return Err(AddressError::invalid(text, "more than one '/' separator"));
        }

        let original: IpAddr = ip_part
            .trim()
            .parse()
            .map_err(|e| AddressError::invalid(text, format!("bad IP address: {e}")))?;

        let significant_bits: u8 = prefix_part
            .trim()
            .parse()
            .map_err(|e| AddressError::invalid(text, format!("bad prefix length: {e}")))?;

        let width = address_width(&original);
        if u32::from(significant_bits) > width {
            return Err(AddressError::invalid(
                text,
                format!("prefix length {significant_bits} exceeds {width} bits"),
            ));
        }

        let mut network = octets(&original);
        let mut broadcast = network.clone();
        for bit in usize::from(significant_bits)..network.len() * 8 {
            let (index, mask) = bit_mask(bit);
            network[index] &= !mask;
            broadcast[index] |= mask;
        }

        Ok(Self {
            address: from_octets(&original, &network),
            significant_bits,
            broadcast_address: from_octets(&original, &broadcast),
        })
    }

    /// The sanitised network address (host bits zero).
    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// The prefix length.
    pub fn significant_bits(&self) -> u8 {
        self.significant_bits
    }

    /// The subnet broadcast address (host bits one).
    pub fn broadcast_address(&self) -> IpAddr {
        self.broadcast_address
    }

    /// Pairs the broadcast address with `port`.
    pub fn broadcast_endpoint(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.broadcast_address, port)
    }

    /// Returns `true` when the first `significant_bits` bits of `candidate`
    /// equal those of this network.
    ///
    /// Addresses of a different family (IPv6 candidate against an IPv4
    /// network, or vice versa) are never owned.
    pub fn owns_address(&self, candidate: IpAddr) -> bool {
        if candidate.is_ipv4() != self.address.is_ipv4() {
            return false;
        }
        let network = octets(&self.address);
        let other = octets(&candidate);
        (0..usize::from(self.significant_bits)).all(|bit| {
            let (index, mask) = bit_mask(bit);
            network[index] & mask == other[index] & mask
        })
    }

    /// Returns the first local unicast address that belongs to this network.
    ///
    /// This is a blocking host lookup; call it once at startup.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::NoMatchingInterface`] when no local address is
    /// owned by this network, or [`AddressError::InterfaceEnumeration`] when
    /// the interface list cannot be read.
    pub fn resolve_local_address(
        &self,
        source: &dyn LocalAddressSource,
    ) -> Result<IpAddr, AddressError> {
        let candidates = source
            .unicast_addresses()
            .map_err(AddressError::InterfaceEnumeration)?;
        debug!("resolving local address for {self} among {} candidates", candidates.len());

        candidates
            .into_iter()
            .find(|candidate| self.owns_address(*candidate))
            .ok_or_else(|| AddressError::NoMatchingInterface {
                network: self.to_string(),
            })
    }
}

impl FromStr for NetworkAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.significant_bits)
    }
}

// ── Bit helpers ───────────────────────────────────────────────────────────────

/// Maps a bit position (0 = most significant bit of the first octet) to the
/// octet index and the single-bit mask inside that octet.
fn bit_mask(bit: usize) -> (usize, u8) {
    (bit / 8, 0x80 >> (bit % 8))
}

fn address_width(addr: &IpAddr) -> u32 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn octets(addr: &IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

/// Rebuilds an address of the same family as `family` from `bytes`.
fn from_octets(family: &IpAddr, bytes: &[u8]) -> IpAddr {
    match family {
        IpAddr::V4(_) => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[..4]);
            IpAddr::V4(Ipv4Addr::from(buf))
        }
        IpAddr::V6(_) => {
            let mut buf = [0u8; 16];
            buf.copy_from_slice(&bytes[..16]);
            IpAddr::V6(Ipv6Addr::from(buf))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
