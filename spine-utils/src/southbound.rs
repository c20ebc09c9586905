//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::mpls::Label;
use crate::prefix::PrefixEntry;

// Locally-significant nexthops used for routes synthesized by this node.
pub const LOCAL_NEXTHOP_V4: Ipv4Addr = Ipv4Addr::new(169, 254, 0, 1);
pub const LOCAL_NEXTHOP_V6: Ipv6Addr =
    Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1);

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum Nexthop {
    Address { addr: IpAddr },
    Special(NexthopSpecial),
}

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum NexthopSpecial {
    Blackhole,
    Unreachable,
}

// Framing of route and label update streams. A full sync replaces all
// previously learned state; an incremental update applies deltas on top.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum UpdateType {
    FullSync,
    Incremental,
}

// ===== decision engine messages =====

// Best route computed by the decision engine, tagged with the area it was
// learned from and the set of areas its ECMP nexthops span.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct RibRoute {
    pub prefix: IpNetwork,
    pub source_area: String,
    pub entry: PrefixEntry,
    pub nexthop_areas: BTreeSet<String>,
}

// Unicast route update batch from the decision engine.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct RouteUpdateMsg {
    pub update_type: UpdateType,
    pub added: Vec<RibRoute>,
    pub deleted: Vec<IpNetwork>,
}

// ===== forwarding plane messages =====

// Label route programming confirmations from the forwarding plane.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct LabelUpdateMsg {
    pub update_type: UpdateType,
    pub added: BTreeSet<Label>,
    pub removed: BTreeSet<Label>,
}

// ===== static route messages =====

// Static route pushed to the decision engine for an originated prefix.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RouteMsg {
    pub prefix: IpNetwork,
    pub distance: u32,
    pub metric: u32,
    pub nexthops: BTreeSet<Nexthop>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RouteKeyMsg {
    pub prefix: IpNetwork,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum StaticRouteMsg {
    Add(RouteMsg),
    Delete(RouteKeyMsg),
}
