//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::IpAddr;

use bytes::Bytes;
use ipnetwork::IpNetwork;
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::mpls::Label;

// Client subsystem that originated a prefix entry.
//
// The discriminant doubles as the default tie-break rank: when everything
// else compares equal, the lowest client id wins.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
pub enum PrefixType {
    Loopback = 1,
    Default = 2,
    PrefixAllocator = 3,
    Config = 4,
    Bgp = 5,
    Rib = 6,
    Vip = 7,
}

// Tie-break metrics carried by every prefix entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PrefixMetrics {
    // Path preference. Higher is better.
    pub preference: u32,
    // Accumulated redistribution distance. Lower is better.
    pub distance: u32,
    // Preference among entries of the same path preference. Higher is
    // better.
    pub source_preference: u32,
}

// Forwarding algorithm requested for the prefix.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ForwardingAlgorithm {
    #[default]
    SpEcmp,
    Ksp2EdEcmp,
}

// How traffic towards the prefix should be carried.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ForwardingType {
    #[default]
    Ip,
    SrMpls,
}

// Non-transitive forwarding attributes. These are reset to defaults when an
// entry is redistributed into another area.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ForwardingInfo {
    pub algorithm: ForwardingAlgorithm,
    pub fwd_type: ForwardingType,
    pub min_nexthops: Option<u32>,
    pub prepend_label: Option<Label>,
}

// One client's view of a prefix.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PrefixEntry {
    pub prefix: IpNetwork,
    pub prefix_type: PrefixType,
    pub metrics: PrefixMetrics,
    pub forwarding: ForwardingInfo,
    // Redistribution provenance, most recent area last.
    pub area_stack: Vec<String>,
    // Explicit nexthop set for entries that track programmed routes (VIP
    // style clients).
    pub nexthops: Option<BTreeSet<IpAddr>>,
}

// Wire-level value published under a prefix key.
//
// A withdrawn prefix is published with `delete_prefix` set and the
// last-known entries retained, so receivers can still disambiguate. The
// flag, not an empty entries list, is the authoritative delete signal.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PrefixDatabase {
    pub node: String,
    pub entries: Vec<PrefixEntry>,
    pub delete_prefix: bool,
}

// ===== impl PrefixType =====

impl std::fmt::Display for PrefixType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefixType::Loopback => write!(f, "loopback"),
            PrefixType::Default => write!(f, "default"),
            PrefixType::PrefixAllocator => write!(f, "prefix-allocator"),
            PrefixType::Config => write!(f, "config"),
            PrefixType::Bgp => write!(f, "bgp"),
            PrefixType::Rib => write!(f, "rib"),
            PrefixType::Vip => write!(f, "vip"),
        }
    }
}

// ===== impl PrefixMetrics =====

impl PrefixMetrics {
    pub const DFLT_PREFERENCE: u32 = 100;
    pub const DFLT_SOURCE_PREFERENCE: u32 = 100;
}

impl Default for PrefixMetrics {
    fn default() -> PrefixMetrics {
        PrefixMetrics {
            preference: Self::DFLT_PREFERENCE,
            distance: 0,
            source_preference: Self::DFLT_SOURCE_PREFERENCE,
        }
    }
}

// ===== impl PrefixEntry =====

impl PrefixEntry {
    pub fn new(prefix: IpNetwork, prefix_type: PrefixType) -> PrefixEntry {
        PrefixEntry {
            prefix,
            prefix_type,
            metrics: Default::default(),
            forwarding: Default::default(),
            area_stack: Vec::new(),
            nexthops: None,
        }
    }
}

// ===== impl PrefixDatabase =====

impl PrefixDatabase {
    // Encodes the database into its opaque wire representation.
    pub fn encode(&self) -> Bytes {
        serde_json::to_vec(self)
            .expect("prefix database serialization cannot fail")
            .into()
    }

    // Decodes a database from its opaque wire representation.
    pub fn decode(data: &[u8]) -> Result<PrefixDatabase, serde_json::Error> {
        serde_json::from_slice(data)
    }
}
