//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use spine_utils::task::{IntervalTask, TimeoutTask};
use tokio::sync::mpsc::Sender;

//
// Prefix manager tasks diagram:
//                                 +--------------+
//                                 |  control API |
//                                 +--------------+
//                                       | ^
//                                       | |
//                        api_rx (1x)    V | (Nx) responders
//                                 +--------------+
//          route_update (1x) ->   |              |
//          label_update (1x) ->   |              |
//            key_change (1x) ->   |   instance   | -> (1x) kvstore_tx
//    sync_timeout (0/1x)     ->   |              | -> (1x) static_route_tx
//    ttl_refresh (1x)        ->   |              |
//                                 +--------------+
//

// Prefix manager inter-task message types.
pub mod messages {
    use serde::{Deserialize, Serialize};
    use spine_utils::kvstore::KeyChangeMsg;
    use spine_utils::southbound::{LabelUpdateMsg, RouteUpdateMsg};

    // Type aliases.
    pub type ProtocolInputMsg = input::ProtocolMsg;

    // Input messages (child task -> main task).
    pub mod input {
        use super::*;

        #[derive(Debug, Deserialize, Serialize)]
        pub enum ProtocolMsg {
            RouteUpdate(RouteUpdateMsg),
            LabelUpdate(LabelUpdateMsg),
            KeyChange(KeyChangeMsg),
            SyncTimeout(SyncTimeoutMsg),
            TtlRefresh(TtlRefreshMsg),
        }

        #[derive(Debug, Deserialize, Serialize)]
        pub struct SyncTimeoutMsg {}

        #[derive(Debug, Deserialize, Serialize)]
        pub struct TtlRefreshMsg {}
    }
}

// ===== Prefix manager tasks =====

// Publication throttle timer. Armed on the first dirty mark after an idle
// period; later marks within the window do not re-arm it.
pub(crate) fn sync_timeout(
    throttle: Duration,
    sync_timeoutp: &Sender<messages::input::SyncTimeoutMsg>,
) -> TimeoutTask {
    #[cfg(not(feature = "testing"))]
    {
        let sync_timeoutp = sync_timeoutp.clone();
        TimeoutTask::new(throttle, move || async move {
            let msg = messages::input::SyncTimeoutMsg {};
            let _ = sync_timeoutp.send(msg).await;
        })
    }
    #[cfg(feature = "testing")]
    {
        TimeoutTask {}
    }
}

// Periodic TTL refresh for published keys.
pub(crate) fn ttl_refresh(
    interval: Duration,
    ttl_refreshp: &Sender<messages::input::TtlRefreshMsg>,
) -> IntervalTask {
    #[cfg(not(feature = "testing"))]
    {
        let ttl_refreshp = ttl_refreshp.clone();
        IntervalTask::new(interval, false, move || {
            let ttl_refreshp = ttl_refreshp.clone();
            async move {
                let msg = messages::input::TtlRefreshMsg {};
                let _ = ttl_refreshp.send(msg).await;
            }
        })
    }
    #[cfg(feature = "testing")]
    {
        IntervalTask {}
    }
}
