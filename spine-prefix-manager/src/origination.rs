//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv6Addr};

use ipnetwork::IpNetwork;
use spine_utils::ip::IpNetworkExt;
use spine_utils::prefix::{PrefixEntry, PrefixType};
use spine_utils::southbound::{
    LOCAL_NEXTHOP_V4, LOCAL_NEXTHOP_V6, Nexthop, RouteKeyMsg, RouteMsg,
};

use crate::config::{Config, OriginatedPrefixCfg};

// Distance and metric of static routes installed for originated prefixes.
const ORIGINATED_ROUTE_DISTANCE: u32 = 1;
const ORIGINATED_ROUTE_METRIC: u32 = 0;

// Runtime state of one configured aggregate. Created at startup, never
// destroyed, only toggled between installed and uninstalled.
#[derive(Debug)]
pub struct OriginatedPrefix {
    pub cfg: OriginatedPrefixCfg,
    // More-specific networks currently present in the decision engine's
    // route table.
    pub supporting: BTreeSet<IpNetwork>,
    pub installed: bool,
}

// Aggregate advertisement toggles produced by one evaluation pass.
#[derive(Debug, Eq, PartialEq)]
pub enum OriginationChange {
    Install {
        entry: PrefixEntry,
        areas: Option<BTreeSet<String>>,
        static_route: Option<RouteMsg>,
    },
    Uninstall {
        prefix: IpNetwork,
        static_route: Option<RouteKeyMsg>,
    },
}

#[derive(Debug)]
pub struct OriginationEngine {
    prefixes: BTreeMap<IpNetwork, OriginatedPrefix>,
    v4_over_v6_nexthop: Option<Ipv6Addr>,
}

// ===== impl OriginatedPrefix =====

impl OriginatedPrefix {
    fn new(cfg: OriginatedPrefixCfg) -> OriginatedPrefix {
        OriginatedPrefix {
            cfg,
            supporting: Default::default(),
            installed: false,
        }
    }

    // A zero threshold means the aggregate is always installed,
    // independent of support count.
    fn has_support(&self) -> bool {
        self.supporting.len() >= self.cfg.minimum_supporting_routes
    }
}

// ===== impl OriginationEngine =====

impl OriginationEngine {
    pub fn new(config: &Config) -> OriginationEngine {
        OriginationEngine {
            prefixes: config
                .originated_prefixes
                .iter()
                .map(|cfg| (cfg.prefix, OriginatedPrefix::new(cfg.clone())))
                .collect(),
            v4_over_v6_nexthop: config.v4_over_v6_nexthop,
        }
    }

    // Records a route learned by the decision engine. Re-adding the same
    // network is idempotent; route attributes are not tracked per support.
    pub fn route_added(&mut self, network: &IpNetwork) {
        for originated in self.prefixes.values_mut() {
            if network.is_strict_subnet_of(&originated.cfg.prefix) {
                originated.supporting.insert(*network);
            }
        }
    }

    pub fn route_removed(&mut self, network: &IpNetwork) {
        for originated in self.prefixes.values_mut() {
            originated.supporting.remove(network);
        }
    }

    // Rebuilds all support sets from a full route-table snapshot.
    pub fn full_sync(&mut self, networks: &BTreeSet<IpNetwork>) {
        for originated in self.prefixes.values_mut() {
            originated.supporting = networks
                .iter()
                .filter(|network| {
                    network.is_strict_subnet_of(&originated.cfg.prefix)
                })
                .copied()
                .collect();
        }
    }

    // Reconciles the installed flag of every aggregate against its support
    // count, returning the advertisement changes the caller must apply.
    pub fn evaluate(&mut self) -> Vec<OriginationChange> {
        let mut changes = Vec::new();

        for originated in self.prefixes.values_mut() {
            let has_support = originated.has_support();
            if has_support && !originated.installed {
                originated.installed = true;
                changes.push(OriginationChange::Install {
                    entry: PrefixEntry::new(
                        originated.cfg.prefix,
                        PrefixType::Config,
                    ),
                    areas: originated.cfg.areas.clone(),
                    static_route: originated.cfg.install_to_fib.then(|| {
                        static_route(
                            &originated.cfg.prefix,
                            self.v4_over_v6_nexthop,
                        )
                    }),
                });
            } else if !has_support && originated.installed {
                originated.installed = false;
                changes.push(OriginationChange::Uninstall {
                    prefix: originated.cfg.prefix,
                    static_route: originated.cfg.install_to_fib.then(|| {
                        RouteKeyMsg {
                            prefix: originated.cfg.prefix,
                        }
                    }),
                });
            }
        }

        changes
    }

    pub fn get(&self, prefix: &IpNetwork) -> Option<&OriginatedPrefix> {
        self.prefixes.get(prefix)
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&IpNetwork, &OriginatedPrefix)> + '_ {
        self.prefixes.iter()
    }
}

// ===== helper functions =====

// Builds the static route installed for an aggregate. The nexthop is
// locally significant; v4 aggregates use the configured v6 local nexthop
// when v4-over-v6 forwarding is enabled.
fn static_route(
    prefix: &IpNetwork,
    v4_over_v6_nexthop: Option<Ipv6Addr>,
) -> RouteMsg {
    let nexthop = match prefix {
        IpNetwork::V4(_) => match v4_over_v6_nexthop {
            Some(addr) => IpAddr::V6(addr),
            None => IpAddr::V4(LOCAL_NEXTHOP_V4),
        },
        IpNetwork::V6(_) => IpAddr::V6(LOCAL_NEXTHOP_V6),
    };

    RouteMsg {
        prefix: *prefix,
        distance: ORIGINATED_ROUTE_DISTANCE,
        metric: ORIGINATED_ROUTE_METRIC,
        nexthops: [Nexthop::Address { addr: nexthop }].into(),
    }
}
