//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use bytes::Bytes;
use derive_new::new;
use serde::{Deserialize, Serialize};

// Versioned, TTL-bearing record as stored by the distributed key-value
// store.
//
// Versions are monotonic per key and strictly increase on every semantic
// change; a TTL refresh republishes the same version with a fresh TTL.
#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct KvEntry {
    pub version: u64,
    pub originator: String,
    pub ttl: Duration,
    pub value: Bytes,
}

// ===== store-bound messages =====

// Operations submitted to the key-value store.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub enum KvStoreMsg {
    Put {
        area: String,
        key: String,
        entry: KvEntry,
    },
}

// Key change notification delivered by the store subscription. Fired for
// local and remote-originated changes alike, in publish order per key. A
// `None` entry signals the key expired or was purged.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct KeyChangeMsg {
    pub area: String,
    pub key: String,
    pub entry: Option<KvEntry>,
}
