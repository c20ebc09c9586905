//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use ipnetwork::IpNetwork;
use spine_utils::Responder;
use spine_utils::ip::IpNetworkExt;
use spine_utils::kvstore::KeyChangeMsg;
use spine_utils::prefix::{PrefixEntry, PrefixType};
use spine_utils::southbound::{
    LabelUpdateMsg, RouteUpdateMsg, StaticRouteMsg, UpdateType,
};

use crate::api::{
    AdvertisedRouteDetail, AreaAdvertisedRoute, OriginatedPrefixStatus,
    Request, RequestError, RouteFilter, RouteFilterType,
    StatisticsSnapshot,
};
use crate::debug::Debug;
use crate::error::Error;
use crate::instance::Instance;
use crate::origination::OriginationChange;
use crate::redistribution::RedistributionChange;
use crate::tasks;
use crate::tasks::messages::ProtocolInputMsg;

// ===== control API requests =====

pub(crate) fn process_api_request(instance: &mut Instance, request: Request) {
    match request {
        Request::Advertise(request) => {
            let changed = advertise(instance, request.entries);
            respond(request.responder, Ok(changed));
        }
        Request::Withdraw(request) => {
            let changed = withdraw(instance, request.prefixes);
            respond(request.responder, Ok(changed));
        }
        Request::WithdrawByType(request) => {
            Debug::PrefixTypeWithdraw(request.prefix_type).log();
            let changed = instance.state.entries.withdraw_by_type(
                request.prefix_type,
                &mut instance.state.pending,
            );
            respond(request.responder, Ok(changed));
        }
        Request::SyncByType(request) => {
            Debug::PrefixTypeSync(request.prefix_type, request.entries.len())
                .log();
            let entries = request
                .entries
                .into_iter()
                .map(|entry| {
                    let dst_areas = client_dst_areas(instance, &entry);
                    (entry, dst_areas)
                })
                .collect();
            let changed = instance.state.entries.sync_by_type(
                request.prefix_type,
                entries,
                &mut instance.state.pending,
            );
            respond(request.responder, Ok(changed));
        }
        Request::GetPrefixes(request) => {
            let entries = get_prefixes(instance, request.prefix_type);
            respond(request.responder, Ok(entries));
        }
        Request::GetAdvertisedRoutes(request) => {
            let routes = get_advertised_routes(instance, &request.filter);
            respond(request.responder, Ok(routes));
        }
        Request::GetAreaAdvertisedRoutes(request) => {
            let routes = get_area_advertised_routes(
                instance,
                &request.area,
                request.filter_type,
                &request.filter,
            );
            respond(request.responder, Ok(routes));
        }
        Request::GetOriginatedPrefixes(request) => {
            let prefixes = get_originated_prefixes(instance);
            respond(request.responder, Ok(prefixes));
        }
        Request::GetStatistics(request) => {
            let snapshot = get_statistics(instance);
            respond(request.responder, Ok(snapshot));
        }
    }

    schedule_sync(instance);
}

// Answers a request that can no longer be served.
pub(crate) fn fail_api_request(request: Request, error: RequestError) {
    match request {
        Request::Advertise(request) => respond(request.responder, Err(error)),
        Request::Withdraw(request) => respond(request.responder, Err(error)),
        Request::WithdrawByType(request) => {
            respond(request.responder, Err(error))
        }
        Request::SyncByType(request) => respond(request.responder, Err(error)),
        Request::GetPrefixes(request) => {
            respond(request.responder, Err(error))
        }
        Request::GetAdvertisedRoutes(request) => {
            respond(request.responder, Err(error))
        }
        Request::GetAreaAdvertisedRoutes(request) => {
            respond(request.responder, Err(error))
        }
        Request::GetOriginatedPrefixes(request) => {
            respond(request.responder, Err(error))
        }
        Request::GetStatistics(request) => {
            respond(request.responder, Err(error))
        }
    }
}

fn respond<T>(
    responder: Option<Responder<Result<T, RequestError>>>,
    result: Result<T, RequestError>,
) {
    if let Some(responder) = responder {
        let _ = responder.send(result);
    }
}

fn advertise(instance: &mut Instance, entries: Vec<PrefixEntry>) -> bool {
    let mut changed = false;

    for mut entry in entries {
        // Canonicalize client-supplied prefixes before they key the store.
        entry.prefix = entry.prefix.apply_mask();
        Debug::PrefixAdvertise(&entry).log();
        let dst_areas = client_dst_areas(instance, &entry);
        changed |= instance.state.entries.advertise(
            entry,
            dst_areas,
            &mut instance.state.pending,
        );
    }

    changed
}

fn withdraw(
    instance: &mut Instance,
    prefixes: Vec<(IpNetwork, PrefixType)>,
) -> bool {
    let mut changed = false;

    for (prefix, prefix_type) in prefixes {
        let prefix = prefix.apply_mask();
        if let Some(stored) = instance.state.entries.get(&prefix, prefix_type)
        {
            Debug::PrefixWithdraw(&stored.entry).log();
        }
        changed |= instance.state.entries.withdraw(
            &prefix,
            prefix_type,
            &mut instance.state.pending,
        );
    }

    changed
}

// Destination areas of a client advertisement: every configured area the
// entry has not already traversed.
fn client_dst_areas(
    instance: &Instance,
    entry: &PrefixEntry,
) -> BTreeSet<String> {
    instance
        .config
        .areas
        .iter()
        .filter(|area| !entry.area_stack.contains(area))
        .cloned()
        .collect()
}

fn get_prefixes(
    instance: &Instance,
    prefix_type: Option<PrefixType>,
) -> Vec<PrefixEntry> {
    instance
        .state
        .entries
        .iter()
        .filter(|(_, stored)| {
            prefix_type.is_none_or(|t| stored.entry.prefix_type == t)
        })
        .map(|(_, stored)| stored.entry.clone())
        .collect()
}

fn get_advertised_routes(
    instance: &Instance,
    filter: &RouteFilter,
) -> Vec<AdvertisedRouteDetail> {
    let store = &instance.state.entries;

    store
        .prefixes()
        .filter_map(|prefix| {
            let mut routes = store
                .entries(prefix)
                .filter(|stored| {
                    filter.matches(
                        prefix,
                        stored.entry.prefix_type,
                        &stored.dst_areas,
                    )
                })
                .map(|stored| stored.entry.clone())
                .collect::<Vec<_>>();
            if routes.is_empty() {
                return None;
            }
            routes.sort_by(|a, b| store.compare(b, a));
            let best = store.best_entry(prefix)?.entry.prefix_type;
            Some(AdvertisedRouteDetail {
                prefix: *prefix,
                best,
                routes,
            })
        })
        .collect()
}

fn get_area_advertised_routes(
    instance: &Instance,
    area: &str,
    filter_type: RouteFilterType,
    filter: &RouteFilter,
) -> Vec<AreaAdvertisedRoute> {
    let store = &instance.state.entries;
    let labels = &instance.state.labels;

    store
        .prefixes()
        .filter_map(|prefix| {
            let stored = store.best_entry_for_area(prefix, area)?;
            if !filter.matches(
                prefix,
                stored.entry.prefix_type,
                &stored.dst_areas,
            ) {
                return None;
            }
            let eligible = labels.is_eligible(&stored.entry);
            let wanted = match filter_type {
                RouteFilterType::Advertised => eligible,
                RouteFilterType::Withheld => !eligible,
            };
            wanted.then(|| AreaAdvertisedRoute {
                prefix: *prefix,
                entry: stored.entry.clone(),
            })
        })
        .collect()
}

fn get_originated_prefixes(
    instance: &Instance,
) -> Vec<OriginatedPrefixStatus> {
    instance
        .state
        .origination
        .iter()
        .map(|(prefix, originated)| OriginatedPrefixStatus {
            prefix: *prefix,
            installed: originated.installed,
            supporting: originated
                .supporting
                .iter()
                .map(|network| network.to_string())
                .collect(),
            minimum_supporting_routes: originated
                .cfg
                .minimum_supporting_routes,
            install_to_fib: originated.cfg.install_to_fib,
        })
        .collect()
}

fn get_statistics(instance: &Instance) -> StatisticsSnapshot {
    let statistics = &instance.state.statistics;
    StatisticsSnapshot {
        discontinuity_time: statistics.discontinuity_time,
        route_updates_rcvd: statistics.route_updates_rcvd,
        label_updates_rcvd: statistics.label_updates_rcvd,
        key_changes_rcvd: statistics.key_changes_rcvd,
        publications_sent: statistics.publications_sent,
    }
}

// ===== protocol input messages =====

pub(crate) fn process_protocol_msg(
    instance: &mut Instance,
    msg: ProtocolInputMsg,
) -> Result<(), Error> {
    match msg {
        ProtocolInputMsg::RouteUpdate(msg) => {
            process_route_update(instance, msg);
        }
        ProtocolInputMsg::LabelUpdate(msg) => {
            process_label_update(instance, msg);
        }
        ProtocolInputMsg::KeyChange(msg) => {
            process_key_change(instance, msg)?;
        }
        ProtocolInputMsg::SyncTimeout(_) => {
            process_sync_timeout(instance);
        }
        ProtocolInputMsg::TtlRefresh(_) => {
            process_ttl_refresh(instance);
        }
    }

    schedule_sync(instance);
    Ok(())
}

fn process_route_update(instance: &mut Instance, msg: RouteUpdateMsg) {
    instance.state.statistics.route_updates_rcvd += 1;
    Debug::RouteUpdateRx(msg.update_type, msg.added.len(), msg.deleted.len())
        .log();

    let mut changes = Vec::new();
    match msg.update_type {
        UpdateType::FullSync => {
            let networks = msg
                .added
                .iter()
                .map(|route| route.prefix)
                .collect::<BTreeSet<_>>();
            instance.state.origination.full_sync(&networks);
            changes = instance.state.redistribution.full_sync(&msg.added);
        }
        UpdateType::Incremental => {
            for prefix in &msg.deleted {
                instance.state.origination.route_removed(prefix);
                changes
                    .extend(instance.state.redistribution.route_delete(prefix));
            }
            for route in &msg.added {
                instance.state.origination.route_added(&route.prefix);
                changes
                    .extend(instance.state.redistribution.route_update(route));
            }
        }
    }

    for change in changes {
        match change {
            RedistributionChange::Advertise { entry, dst_areas } => {
                let source_area =
                    entry.area_stack.last().cloned().unwrap_or_default();
                Debug::Redistribute(&entry.prefix, &source_area, &dst_areas)
                    .log();
                instance.state.entries.advertise(
                    entry,
                    dst_areas,
                    &mut instance.state.pending,
                );
            }
            RedistributionChange::Withdraw {
                prefix,
                source_area,
            } => {
                Debug::RedistributeWithdraw(&prefix, &source_area).log();
                instance.state.entries.withdraw(
                    &prefix,
                    PrefixType::Rib,
                    &mut instance.state.pending,
                );
            }
        }
    }

    process_origination_changes(instance);
}

// Applies pending threshold crossings of the originated aggregates.
pub(crate) fn process_origination_changes(instance: &mut Instance) {
    for change in instance.state.origination.evaluate() {
        match change {
            OriginationChange::Install {
                entry,
                areas,
                static_route,
            } => {
                let supporting = supporting_count(instance, &entry.prefix);
                Debug::OriginatedInstall(&entry.prefix, supporting).log();
                let dst_areas =
                    areas.unwrap_or_else(|| instance.config.areas.clone());
                instance.state.entries.advertise(
                    entry,
                    dst_areas,
                    &mut instance.state.pending,
                );
                if let Some(route) = static_route {
                    Debug::StaticRouteAdd(&route.prefix).log();
                    let _ = instance
                        .tx
                        .static_routes
                        .send(StaticRouteMsg::Add(route));
                }
            }
            OriginationChange::Uninstall {
                prefix,
                static_route,
            } => {
                let supporting = supporting_count(instance, &prefix);
                Debug::OriginatedUninstall(&prefix, supporting).log();
                instance.state.entries.withdraw(
                    &prefix,
                    PrefixType::Config,
                    &mut instance.state.pending,
                );
                if let Some(route) = static_route {
                    Debug::StaticRouteDelete(&route.prefix).log();
                    let _ = instance
                        .tx
                        .static_routes
                        .send(StaticRouteMsg::Delete(route));
                }
            }
        }
    }
}

fn supporting_count(instance: &Instance, prefix: &IpNetwork) -> usize {
    instance
        .state
        .origination
        .get(prefix)
        .map_or(0, |originated| originated.supporting.len())
}

fn process_label_update(instance: &mut Instance, msg: LabelUpdateMsg) {
    instance.state.statistics.label_updates_rcvd += 1;
    Debug::LabelUpdateRx(msg.update_type, msg.added.len(), msg.removed.len())
        .log();

    let changes = match msg.update_type {
        UpdateType::FullSync => instance.state.labels.full_sync(msg.added),
        UpdateType::Incremental => instance
            .state
            .labels
            .incremental_update(msg.added, msg.removed),
    };
    if changes.is_empty() {
        return;
    }
    if !changes.confirmed.is_empty() {
        Debug::LabelsConfirmed(&changes.confirmed).log();
    }
    if !changes.unconfirmed.is_empty() {
        Debug::LabelsUnconfirmed(&changes.unconfirmed).log();
    }

    // Dirty every prefix gated on a label whose readiness flipped.
    let dirty = instance
        .state
        .entries
        .iter()
        .filter(|(_, stored)| {
            stored
                .entry
                .forwarding
                .prepend_label
                .is_some_and(|label| changes.all().any(|l| *l == label))
        })
        .map(|(prefix, _)| *prefix)
        .collect::<Vec<_>>();
    for prefix in dirty {
        instance.state.pending.mark(prefix);
    }
}

fn process_key_change(
    instance: &mut Instance,
    msg: KeyChangeMsg,
) -> Result<(), Error> {
    instance.state.statistics.key_changes_rcvd += 1;

    if let Some(prefix) = instance.state.sync.observe(&msg)? {
        instance.state.pending.mark(prefix);
    }
    Ok(())
}

fn process_sync_timeout(instance: &mut Instance) {
    instance.state.sync_timeout_task = None;

    let state = &mut instance.state;
    let dirty = state.pending.drain();
    Debug::SyncFlush(dirty.len()).log();
    let published = state.sync.flush(
        dirty,
        &state.entries,
        &state.labels,
        &instance.tx.kvstore,
    );
    state.statistics.publications_sent += published as u32;
}

fn process_ttl_refresh(instance: &mut Instance) {
    let refreshed = instance.state.sync.refresh_ttl(&instance.tx.kvstore);
    Debug::KvTtlRefresh(refreshed).log();
}

// Arms the publication throttle on the first dirty mark after an idle
// period. Later marks within the window do not re-arm it, bounding the
// maximum publication latency.
pub(crate) fn schedule_sync(instance: &mut Instance) {
    if !instance.state.pending.is_empty()
        && instance.state.sync_timeout_task.is_none()
    {
        instance.state.sync_timeout_task = Some(tasks::sync_timeout(
            instance.config.sync_throttle,
            &instance.tx.protocol_input.sync_timeout,
        ));
    }
}
