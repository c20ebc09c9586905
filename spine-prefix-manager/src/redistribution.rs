//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};

use ipnetwork::IpNetwork;
use spine_utils::prefix::{PrefixEntry, PrefixType};
use spine_utils::southbound::RibRoute;

// Redistribution outcome for one best-route event.
#[derive(Debug, Eq, PartialEq)]
pub enum RedistributionChange {
    Advertise {
        entry: PrefixEntry,
        dst_areas: BTreeSet<String>,
    },
    Withdraw {
        prefix: IpNetwork,
        source_area: String,
    },
}

// Leaks each area's best routes into the node's other areas. The decision
// engine emits at most one best route per prefix, so tracking is keyed by
// prefix alone.
#[derive(Debug)]
pub struct AreaRedistributionEngine {
    areas: BTreeSet<String>,
    // Last destination-area set per redistributed prefix, so a route
    // deletion (or a shrinking ECMP area set) withdraws everywhere the
    // route was previously leaked into.
    redistributed: BTreeMap<IpNetwork, (String, BTreeSet<String>)>,
}

// ===== impl AreaRedistributionEngine =====

impl AreaRedistributionEngine {
    pub fn new(areas: BTreeSet<String>) -> AreaRedistributionEngine {
        AreaRedistributionEngine {
            areas,
            redistributed: Default::default(),
        }
    }

    // Processes a best-route update from the decision engine. An area
    // already present among the route's ECMP nexthop areas must not receive
    // a copy of its own route.
    pub fn route_update(
        &mut self,
        route: &RibRoute,
    ) -> Option<RedistributionChange> {
        let dst_areas = self
            .areas
            .iter()
            .filter(|area| {
                **area != route.source_area
                    && !route.nexthop_areas.contains(*area)
            })
            .cloned()
            .collect::<BTreeSet<_>>();

        if dst_areas.is_empty() {
            // The route has nowhere to go. Withdraw it if it was
            // previously redistributed.
            return self.route_delete(&route.prefix);
        }

        self.redistributed.insert(
            route.prefix,
            (route.source_area.clone(), dst_areas.clone()),
        );
        Some(RedistributionChange::Advertise {
            entry: redistributed_entry(route),
            dst_areas,
        })
    }

    // Withdraws a deleted route from everywhere it was redistributed into.
    pub fn route_delete(
        &mut self,
        prefix: &IpNetwork,
    ) -> Option<RedistributionChange> {
        self.redistributed.remove(prefix).map(|(source_area, _)| {
            RedistributionChange::Withdraw {
                prefix: *prefix,
                source_area,
            }
        })
    }

    // Reconciles against a full route-table snapshot: routes absent from
    // the snapshot are withdrawn, present ones re-advertised.
    pub fn full_sync(
        &mut self,
        routes: &[RibRoute],
    ) -> Vec<RedistributionChange> {
        let keep = routes
            .iter()
            .map(|route| route.prefix)
            .collect::<BTreeSet<_>>();
        let stale = self
            .redistributed
            .keys()
            .filter(|prefix| !keep.contains(prefix))
            .copied()
            .collect::<Vec<_>>();

        let mut changes = Vec::new();
        for prefix in stale {
            changes.extend(self.route_delete(&prefix));
        }
        for route in routes {
            changes.extend(self.route_update(route));
        }
        changes
    }

    pub fn dst_areas(
        &self,
        prefix: &IpNetwork,
    ) -> Option<&BTreeSet<String>> {
        self.redistributed.get(prefix).map(|(_, dst)| dst)
    }
}

// ===== helper functions =====

// Synthesizes the entry advertised into the destination areas. The distance
// grows by one per redistribution hop, the source area is recorded on the
// area stack, and non-transitive forwarding attributes are reset.
fn redistributed_entry(route: &RibRoute) -> PrefixEntry {
    let mut entry = route.entry.clone();
    entry.prefix_type = PrefixType::Rib;
    entry.metrics.distance = entry.metrics.distance.saturating_add(1);
    entry.area_stack.push(route.source_area.clone());
    entry.forwarding = Default::default();
    entry
}
