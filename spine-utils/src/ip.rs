//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::borrow::Cow;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::IpNetwork;
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

// Address Family identifier.
//
// IANA registry:
// http://www.iana.org/assignments/address-family-numbers
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
pub enum AddressFamily {
    Ipv4 = 1,
    Ipv6 = 2,
}

// Extension methods for IpAddr.
pub trait IpAddrExt {
    // Returns the address family of the IP address.
    fn address_family(&self) -> AddressFamily;

    // Returns the address as a fixed-width 16-octet buffer. IPv4 addresses
    // occupy the first four octets, with the remainder zeroed.
    fn to_fixed_width(&self) -> [u8; 16];

    // Rebuilds an address of the given family from a fixed-width buffer.
    fn from_fixed_width(af: AddressFamily, bytes: &[u8; 16]) -> IpAddr;
}

// Extension methods for IpNetwork.
pub trait IpNetworkExt {
    // Returns the address family of the network.
    fn address_family(&self) -> AddressFamily;

    // Apply mask to prefix.
    #[must_use]
    fn apply_mask(&self) -> IpNetwork;

    // Returns true if this network is a strictly more specific subnet of
    // `other` (same address family, longer prefix, contained address range).
    fn is_strict_subnet_of(&self, other: &IpNetwork) -> bool;
}

// ===== impl AddressFamily =====

impl AddressFamily {
    pub fn addr_len(&self) -> usize {
        match self {
            AddressFamily::Ipv4 => Ipv4Addr::BITS as usize / 8,
            AddressFamily::Ipv6 => Ipv6Addr::BITS as usize / 8,
        }
    }

    pub fn max_prefixlen(&self) -> u8 {
        match self {
            AddressFamily::Ipv4 => 32,
            AddressFamily::Ipv6 => 128,
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "ipv4"),
            AddressFamily::Ipv6 => write!(f, "ipv6"),
        }
    }
}

// ===== impl IpAddr =====

impl IpAddrExt for IpAddr {
    fn address_family(&self) -> AddressFamily {
        match self {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    fn to_fixed_width(&self) -> [u8; 16] {
        let mut buf = [0u8; 16];
        match self {
            IpAddr::V4(addr) => buf[..4].copy_from_slice(&addr.octets()),
            IpAddr::V6(addr) => buf.copy_from_slice(&addr.octets()),
        }
        buf
    }

    fn from_fixed_width(af: AddressFamily, bytes: &[u8; 16]) -> IpAddr {
        match af {
            AddressFamily::Ipv4 => {
                let mut octets = [0u8; 4];
                octets.copy_from_slice(&bytes[..4]);
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            AddressFamily::Ipv6 => IpAddr::V6(Ipv6Addr::from(*bytes)),
        }
    }
}

// ===== impl IpNetwork =====

impl IpNetworkExt for IpNetwork {
    fn address_family(&self) -> AddressFamily {
        match self {
            IpNetwork::V4(_) => AddressFamily::Ipv4,
            IpNetwork::V6(_) => AddressFamily::Ipv6,
        }
    }

    fn apply_mask(&self) -> IpNetwork {
        match self {
            IpNetwork::V4(network) => {
                let network = ipnetwork::Ipv4Network::new(
                    network.network(),
                    network.prefix(),
                )
                .unwrap();
                IpNetwork::V4(network)
            }
            IpNetwork::V6(network) => {
                let network = ipnetwork::Ipv6Network::new(
                    network.network(),
                    network.prefix(),
                )
                .unwrap();
                IpNetwork::V6(network)
            }
        }
    }

    fn is_strict_subnet_of(&self, other: &IpNetwork) -> bool {
        if self.address_family() != other.address_family()
            || self.prefix() <= other.prefix()
        {
            return false;
        }
        other.contains(self.network())
    }
}

// ===== global functions =====

// Formats a network in canonical "addr/plen" notation.
pub fn format_network(network: &IpNetwork) -> Cow<'static, str> {
    format!("{}/{}", network.network(), network.prefix()).into()
}
