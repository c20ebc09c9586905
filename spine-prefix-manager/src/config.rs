//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::Ipv6Addr;
use std::time::Duration;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::key::KeyFormat;

// Instance configuration.
//
// Loaded once at startup; an instance is never reconfigured in place.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    // Node identifier embedded in every published key.
    pub node_id: String,
    // Configured areas, in no particular order.
    pub areas: BTreeSet<String>,
    // Key encoding used for publications. Keys of either format are always
    // accepted on the subscription side, so rolling format upgrades and
    // downgrades are safe.
    pub key_format: KeyFormat,
    // Swaps the Config and Bgp tie-break ranks, preferring locally
    // originated aggregates over BGP-redistributed entries.
    pub prefer_originated: bool,
    // Prefixes originated by this node.
    pub originated_prefixes: Vec<OriginatedPrefixCfg>,
    // Coalescing window for key-value store publications.
    pub sync_throttle: Duration,
    // Lifetime of published keys.
    pub key_ttl: Duration,
    // When set, static routes for v4 aggregates use this v6 nexthop instead
    // of the native v4 local nexthop ("v4 over v6" forwarding).
    pub v4_over_v6_nexthop: Option<Ipv6Addr>,
}

// One originated (aggregate) prefix.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct OriginatedPrefixCfg {
    pub prefix: IpNetwork,
    // Number of distinct more-specific routes required before the aggregate
    // is advertised. Zero means the aggregate is always installed.
    pub minimum_supporting_routes: usize,
    // Whether to also install the aggregate into the local FIB through the
    // decision engine.
    pub install_to_fib: bool,
    // Restricts advertisement of the aggregate to a subset of the
    // configured areas.
    pub areas: Option<BTreeSet<String>>,
}

// ===== impl Config =====

impl Config {
    // Checks startup invariants. Configuration errors are fatal.
    pub fn validate(&self) -> Result<(), Error> {
        // Node and area names are embedded in colon-delimited keys.
        if self.node_id.is_empty() || self.node_id.contains(':') {
            return Err(Error::InvalidNodeId(self.node_id.clone()));
        }
        if self.areas.is_empty() {
            return Err(Error::NoAreas);
        }
        for area in &self.areas {
            if area.is_empty() || area.contains(':') {
                return Err(Error::InvalidArea(area.clone()));
            }
        }
        for originated in &self.originated_prefixes {
            if let Some(areas) = &originated.areas {
                for area in areas {
                    if !self.areas.contains(area) {
                        return Err(Error::UnknownArea(area.clone()));
                    }
                }
            }
        }

        Ok(())
    }

    // TTL refreshes run at a quarter of the key lifetime so a key survives
    // a few missed refresh cycles.
    pub fn ttl_refresh_interval(&self) -> Duration {
        self.key_ttl / 4
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            node_id: String::new(),
            areas: Default::default(),
            key_format: KeyFormat::V2,
            prefer_originated: false,
            originated_prefixes: Vec::new(),
            sync_throttle: Duration::from_millis(100),
            key_ttl: Duration::from_secs(300),
            v4_over_v6_nexthop: None,
        }
    }
}
