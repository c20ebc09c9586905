//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use chrono::{DateTime, Utc};
use spine_utils::kvstore::{KeyChangeMsg, KvStoreMsg};
use spine_utils::southbound::{
    LabelUpdateMsg, RouteUpdateMsg, StaticRouteMsg,
};
use spine_utils::task::{IntervalTask, TimeoutTask};
use spine_utils::{Receiver, Sender, UnboundedSender};
use tokio::sync::mpsc;

use crate::api::{Request, RequestError};
use crate::config::Config;
use crate::debug::Debug;
use crate::entries::{PendingChangeTracker, PrefixEntryStore, TypeRanks};
use crate::error::Error;
use crate::events;
use crate::labels::LabelReadinessTracker;
use crate::origination::OriginationEngine;
use crate::redistribution::AreaRedistributionEngine;
use crate::sync::KvStoreSync;
use crate::tasks;
use crate::tasks::messages::ProtocolInputMsg;
use crate::tasks::messages::input::{SyncTimeoutMsg, TtlRefreshMsg};

#[derive(Debug)]
pub struct Instance {
    // Instance name.
    pub name: String,
    // Instance configuration, fixed for the instance lifetime.
    pub config: Config,
    // Instance state.
    pub state: InstanceState,
    // Instance Tx channels.
    pub tx: InstanceChannelsTx,
}

#[derive(Debug)]
pub struct InstanceState {
    // Client prefix entries and the dirty-prefix set.
    pub entries: PrefixEntryStore,
    pub pending: PendingChangeTracker,
    // Forwarding-plane label confirmations.
    pub labels: LabelReadinessTracker,
    // Originated aggregates.
    pub origination: OriginationEngine,
    // Multi-area redistribution.
    pub redistribution: AreaRedistributionEngine,
    // Key-value store publication state.
    pub sync: KvStoreSync,
    // Publication throttle timer (armed while dirty prefixes are queued).
    pub sync_timeout_task: Option<TimeoutTask>,
    // Periodic TTL refresh.
    pub ttl_refresh_task: IntervalTask,
    // Message statistics.
    pub statistics: MessageStatistics,
}

// Inbound message statistics.
#[derive(Debug, Default)]
pub struct MessageStatistics {
    pub discontinuity_time: Option<DateTime<Utc>>,
    pub route_updates_rcvd: u32,
    pub label_updates_rcvd: u32,
    pub key_changes_rcvd: u32,
    pub publications_sent: u32,
}

#[derive(Clone, Debug)]
pub struct InstanceChannelsTx {
    // Key-value store operations.
    pub kvstore: UnboundedSender<KvStoreMsg>,
    // Static routes pushed to the decision engine.
    pub static_routes: UnboundedSender<StaticRouteMsg>,
    // Protocol input channels.
    pub protocol_input: ProtocolInputChannelsTx,
}

#[derive(Clone, Debug)]
pub struct ProtocolInputChannelsTx {
    // Decision engine route updates.
    pub route_update: Sender<RouteUpdateMsg>,
    // Forwarding plane label confirmations.
    pub label_update: Sender<LabelUpdateMsg>,
    // Key-value store subscription notifications.
    pub key_change: Sender<KeyChangeMsg>,
    // Publication throttle timeout.
    pub sync_timeout: Sender<SyncTimeoutMsg>,
    // TTL refresh tick.
    pub ttl_refresh: Sender<TtlRefreshMsg>,
}

#[derive(Debug)]
pub struct ProtocolInputChannelsRx {
    // Decision engine route updates.
    pub route_update: Receiver<RouteUpdateMsg>,
    // Forwarding plane label confirmations.
    pub label_update: Receiver<LabelUpdateMsg>,
    // Key-value store subscription notifications.
    pub key_change: Receiver<KeyChangeMsg>,
    // Publication throttle timeout.
    pub sync_timeout: Receiver<SyncTimeoutMsg>,
    // TTL refresh tick.
    pub ttl_refresh: Receiver<TtlRefreshMsg>,
}

// ===== impl Instance =====

impl Instance {
    // Creates the instance, validating its configuration. Zero-threshold
    // aggregates are installed immediately.
    pub fn new(
        name: String,
        config: Config,
        tx: InstanceChannelsTx,
    ) -> Result<Instance, Error> {
        config.validate().inspect_err(|error| error.log())?;

        let state = InstanceState::new(&config, &tx);
        let mut instance = Instance {
            name,
            config,
            state,
            tx,
        };
        Debug::InstanceCreate.log();
        events::process_origination_changes(&mut instance);
        events::schedule_sync(&mut instance);

        Ok(instance)
    }

    // Main event loop. Runs until all input channels close, then drains
    // still-queued control requests with an explicit shutdown error.
    pub async fn run(
        mut self,
        mut api_rx: Receiver<Request>,
        mut protocol_rx: ProtocolInputChannelsRx,
    ) {
        loop {
            tokio::select! {
                // Protocol input is drained before control requests so
                // request answers reflect all previously queued events.
                biased;
                msg = protocol_rx.recv() => {
                    let Some(msg) = msg else {
                        break;
                    };
                    if let Err(error) =
                        events::process_protocol_msg(&mut self, msg)
                    {
                        error.log();
                    }
                }
                request = api_rx.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    events::process_api_request(&mut self, request);
                }
            }
        }

        Debug::InstanceShutdown.log();
        api_rx.close();
        while let Ok(request) = api_rx.try_recv() {
            events::fail_api_request(request, RequestError::InstanceShutdown);
        }
    }

    pub fn protocol_input_channels()
    -> (ProtocolInputChannelsTx, ProtocolInputChannelsRx) {
        let (route_updatep, route_updatec) = mpsc::channel(4);
        let (label_updatep, label_updatec) = mpsc::channel(4);
        let (key_changep, key_changec) = mpsc::channel(4);
        let (sync_timeoutp, sync_timeoutc) = mpsc::channel(4);
        let (ttl_refreshp, ttl_refreshc) = mpsc::channel(4);

        let tx = ProtocolInputChannelsTx {
            route_update: route_updatep,
            label_update: label_updatep,
            key_change: key_changep,
            sync_timeout: sync_timeoutp,
            ttl_refresh: ttl_refreshp,
        };
        let rx = ProtocolInputChannelsRx {
            route_update: route_updatec,
            label_update: label_updatec,
            key_change: key_changec,
            sync_timeout: sync_timeoutc,
            ttl_refresh: ttl_refreshc,
        };

        (tx, rx)
    }
}

// ===== impl InstanceState =====

impl InstanceState {
    fn new(config: &Config, tx: &InstanceChannelsTx) -> InstanceState {
        InstanceState {
            entries: PrefixEntryStore::new(TypeRanks::new(
                config.prefer_originated,
            )),
            pending: Default::default(),
            labels: Default::default(),
            origination: OriginationEngine::new(config),
            redistribution: AreaRedistributionEngine::new(
                config.areas.clone(),
            ),
            sync: KvStoreSync::new(
                config.node_id.clone(),
                config.areas.clone(),
                config.key_format,
                config.key_ttl,
            ),
            sync_timeout_task: None,
            ttl_refresh_task: tasks::ttl_refresh(
                config.ttl_refresh_interval(),
                &tx.protocol_input.ttl_refresh,
            ),
            statistics: MessageStatistics {
                discontinuity_time: Some(Utc::now()),
                ..Default::default()
            },
        }
    }
}

// ===== impl ProtocolInputChannelsRx =====

impl ProtocolInputChannelsRx {
    pub async fn recv(&mut self) -> Option<ProtocolInputMsg> {
        tokio::select! {
            // Route and label events are consumed before the timers so a
            // throttle expiry never outruns the updates that armed it.
            biased;
            msg = self.route_update.recv() => {
                msg.map(ProtocolInputMsg::RouteUpdate)
            }
            msg = self.label_update.recv() => {
                msg.map(ProtocolInputMsg::LabelUpdate)
            }
            msg = self.key_change.recv() => {
                msg.map(ProtocolInputMsg::KeyChange)
            }
            msg = self.sync_timeout.recv() => {
                msg.map(ProtocolInputMsg::SyncTimeout)
            }
            msg = self.ttl_refresh.recv() => {
                msg.map(ProtocolInputMsg::TtlRefresh)
            }
        }
    }
}
