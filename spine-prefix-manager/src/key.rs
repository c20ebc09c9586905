//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::fmt::Write;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use spine_utils::ip::{AddressFamily, IpAddrExt, format_network};

use crate::error::KeyParseError;

// Key encodings understood by every node. The legacy format embeds the
// printable prefix; the compact v2 format embeds a fixed-width binary
// network. Both coexist on the wire during rolling upgrades and both parse
// without prior knowledge of which format produced them.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum KeyFormat {
    Legacy,
    #[default]
    V2,
}

// Composite key identifying one node's advertisement of one prefix in one
// area.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct PrefixKey {
    pub node: String,
    pub area: String,
    pub prefix: IpNetwork,
}

const MARKER_LEGACY: &str = "prefix";
const MARKER_V2: &str = "prefixV2";

// v2 binary layout: format version, address family, prefix length, then the
// fixed-width 16-octet network address. 19 octets, hex encoded.
const V2_FORMAT_VERSION: u8 = 2;
const V2_ENCODED_LEN: usize = 19 * 2;

// ===== impl PrefixKey =====

impl PrefixKey {
    pub fn new(node: &str, area: &str, prefix: IpNetwork) -> PrefixKey {
        PrefixKey {
            node: node.to_owned(),
            area: area.to_owned(),
            prefix,
        }
    }

    // Renders the key in the requested format.
    pub fn encode(&self, format: KeyFormat) -> String {
        match format {
            KeyFormat::Legacy => format!(
                "{}:{}:{}:[{}]",
                MARKER_LEGACY,
                self.node,
                self.area,
                format_network(&self.prefix),
            ),
            KeyFormat::V2 => {
                let mut key = format!(
                    "{}:{}:{}:",
                    MARKER_V2, self.node, self.area,
                );
                key.reserve(V2_ENCODED_LEN);

                let addr = IpAddr::from(self.prefix.network());
                let af = match addr {
                    IpAddr::V4(_) => 4u8,
                    IpAddr::V6(_) => 6u8,
                };
                let mut bytes = [0u8; 19];
                bytes[0] = V2_FORMAT_VERSION;
                bytes[1] = af;
                bytes[2] = self.prefix.prefix();
                bytes[3..].copy_from_slice(&addr.to_fixed_width());
                for byte in bytes {
                    write!(key, "{:02x}", byte).unwrap();
                }
                key
            }
        }
    }

    // Parses a key of either format, returning the key and the format it
    // was found in.
    pub fn parse(key: &str) -> Result<(PrefixKey, KeyFormat), KeyParseError> {
        let mut fields = key.splitn(4, ':');
        let marker = fields.next().ok_or(KeyParseError::MissingField)?;
        let node = fields.next().ok_or(KeyParseError::MissingField)?;
        let area = fields.next().ok_or(KeyParseError::MissingField)?;
        let rem = fields.next().ok_or(KeyParseError::MissingField)?;
        if node.is_empty() || area.is_empty() {
            return Err(KeyParseError::MissingField);
        }

        let (prefix, format) = match marker {
            MARKER_LEGACY => (Self::parse_legacy(rem)?, KeyFormat::Legacy),
            MARKER_V2 => (Self::parse_v2(rem)?, KeyFormat::V2),
            _ => return Err(KeyParseError::UnknownMarker),
        };

        Ok((PrefixKey::new(node, area, prefix), format))
    }

    fn parse_legacy(rem: &str) -> Result<IpNetwork, KeyParseError> {
        let rem = rem
            .strip_prefix('[')
            .and_then(|rem| rem.strip_suffix(']'))
            .ok_or(KeyParseError::BadEncoding)?;
        rem.parse().map_err(|_| KeyParseError::BadEncoding)
    }

    fn parse_v2(rem: &str) -> Result<IpNetwork, KeyParseError> {
        if rem.len() != V2_ENCODED_LEN || !rem.is_ascii() {
            return Err(KeyParseError::BadEncoding);
        }
        let mut bytes = [0u8; 19];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&rem[i * 2..i * 2 + 2], 16)
                .map_err(|_| KeyParseError::BadEncoding)?;
        }

        if bytes[0] != V2_FORMAT_VERSION {
            return Err(KeyParseError::BadFormatVersion(bytes[0]));
        }
        let af = match bytes[1] {
            4 => AddressFamily::Ipv4,
            6 => AddressFamily::Ipv6,
            af => return Err(KeyParseError::BadAddressFamily(af)),
        };
        let plen = bytes[2];
        if plen > af.max_prefixlen() {
            return Err(KeyParseError::BadPrefixLength(plen));
        }

        let mut addr = [0u8; 16];
        addr.copy_from_slice(&bytes[3..]);
        let addr = IpAddr::from_fixed_width(af, &addr);
        IpNetwork::new(addr, plen).map_err(|_| KeyParseError::BadEncoding)
    }
}

impl std::fmt::Display for PrefixKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.node, self.area, self.prefix)
    }
}
