//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use ipnetwork::IpNetwork;
use spine_utils::mpls::Label;
use spine_utils::prefix::{PrefixEntry, PrefixType};
use spine_utils::southbound::UpdateType;
use tracing::{debug, debug_span};

// Prefix manager debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    InstanceCreate,
    InstanceShutdown,
    PrefixAdvertise(&'a PrefixEntry),
    PrefixWithdraw(&'a PrefixEntry),
    PrefixTypeWithdraw(PrefixType),
    PrefixTypeSync(PrefixType, usize),
    RouteUpdateRx(UpdateType, usize, usize),
    LabelUpdateRx(UpdateType, usize, usize),
    LabelsConfirmed(&'a BTreeSet<Label>),
    LabelsUnconfirmed(&'a BTreeSet<Label>),
    SyncFlush(usize),
    KvPublish(&'a str, &'a str, u64),
    KvTombstone(&'a str, &'a str, u64),
    KvTtlRefresh(usize),
    KvForeignOverride(&'a str, u64),
    OriginatedInstall(&'a IpNetwork, usize),
    OriginatedUninstall(&'a IpNetwork, usize),
    StaticRouteAdd(&'a IpNetwork),
    StaticRouteDelete(&'a IpNetwork),
    Redistribute(&'a IpNetwork, &'a str, &'a BTreeSet<String>),
    RedistributeWithdraw(&'a IpNetwork, &'a str),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::InstanceCreate | Debug::InstanceShutdown => {
                // Parent span(s): prefix-manager
                debug!("{}", self);
            }
            Debug::PrefixAdvertise(entry) | Debug::PrefixWithdraw(entry) => {
                // Parent span(s): prefix-manager
                debug!(
                    prefix = %entry.prefix,
                    prefix_type = %entry.prefix_type, "{}", self,
                );
            }
            Debug::PrefixTypeWithdraw(prefix_type) => {
                // Parent span(s): prefix-manager
                debug!(%prefix_type, "{}", self);
            }
            Debug::PrefixTypeSync(prefix_type, entries) => {
                // Parent span(s): prefix-manager
                debug!(%prefix_type, %entries, "{}", self);
            }
            Debug::RouteUpdateRx(update_type, added, deleted)
            | Debug::LabelUpdateRx(update_type, added, deleted) => {
                // Parent span(s): prefix-manager
                debug!(?update_type, %added, %deleted, "{}", self);
            }
            Debug::LabelsConfirmed(labels)
            | Debug::LabelsUnconfirmed(labels) => {
                // Parent span(s): prefix-manager
                debug!(?labels, "{}", self);
            }
            Debug::SyncFlush(dirty) => {
                // Parent span(s): prefix-manager
                debug!(%dirty, "{}", self);
            }
            Debug::KvPublish(area, key, version)
            | Debug::KvTombstone(area, key, version) => {
                // Parent span(s): prefix-manager
                debug_span!("kvstore", %area).in_scope(|| {
                    debug!(%key, %version, "{}", self);
                });
            }
            Debug::KvTtlRefresh(keys) => {
                // Parent span(s): prefix-manager
                debug_span!("kvstore").in_scope(|| {
                    debug!(%keys, "{}", self);
                });
            }
            Debug::KvForeignOverride(key, version) => {
                // Parent span(s): prefix-manager
                debug_span!("kvstore").in_scope(|| {
                    debug!(%key, %version, "{}", self);
                });
            }
            Debug::OriginatedInstall(prefix, supporting)
            | Debug::OriginatedUninstall(prefix, supporting) => {
                // Parent span(s): prefix-manager
                debug!(%prefix, %supporting, "{}", self);
            }
            Debug::StaticRouteAdd(prefix)
            | Debug::StaticRouteDelete(prefix) => {
                // Parent span(s): prefix-manager
                debug!(%prefix, "{}", self);
            }
            Debug::Redistribute(prefix, source_area, dst_areas) => {
                // Parent span(s): prefix-manager
                debug!(%prefix, %source_area, ?dst_areas, "{}", self);
            }
            Debug::RedistributeWithdraw(prefix, source_area) => {
                // Parent span(s): prefix-manager
                debug!(%prefix, %source_area, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InstanceCreate => {
                write!(f, "instance created")
            }
            Debug::InstanceShutdown => {
                write!(f, "instance shutting down")
            }
            Debug::PrefixAdvertise(..) => {
                write!(f, "prefix advertised")
            }
            Debug::PrefixWithdraw(..) => {
                write!(f, "prefix withdrawn")
            }
            Debug::PrefixTypeWithdraw(..) => {
                write!(f, "prefixes withdrawn by type")
            }
            Debug::PrefixTypeSync(..) => {
                write!(f, "prefixes synced by type")
            }
            Debug::RouteUpdateRx(..) => {
                write!(f, "route update received")
            }
            Debug::LabelUpdateRx(..) => {
                write!(f, "label programming update received")
            }
            Debug::LabelsConfirmed(..) => {
                write!(f, "labels confirmed")
            }
            Debug::LabelsUnconfirmed(..) => {
                write!(f, "labels unconfirmed")
            }
            Debug::SyncFlush(..) => {
                write!(f, "synchronizing dirty prefixes")
            }
            Debug::KvPublish(..) => {
                write!(f, "key published")
            }
            Debug::KvTombstone(..) => {
                write!(f, "key tombstoned")
            }
            Debug::KvTtlRefresh(..) => {
                write!(f, "ttl refreshed")
            }
            Debug::KvForeignOverride(..) => {
                write!(f, "foreign value observed under own key")
            }
            Debug::OriginatedInstall(..) => {
                write!(f, "originated prefix installed")
            }
            Debug::OriginatedUninstall(..) => {
                write!(f, "originated prefix uninstalled")
            }
            Debug::StaticRouteAdd(..) => {
                write!(f, "static route added")
            }
            Debug::StaticRouteDelete(..) => {
                write!(f, "static route deleted")
            }
            Debug::Redistribute(..) => {
                write!(f, "route redistributed")
            }
            Debug::RedistributeWithdraw(..) => {
                write!(f, "redistributed route withdrawn")
            }
        }
    }
}
