//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use bytes::Bytes;
use const_addrs::net;
use maplit::btreeset;
use spine_prefix_manager::entries::{
    PendingChangeTracker, PrefixEntryStore, TypeRanks,
};
use spine_prefix_manager::key::KeyFormat;
use spine_prefix_manager::labels::LabelReadinessTracker;
use spine_prefix_manager::sync::KvStoreSync;
use spine_utils::kvstore::{KeyChangeMsg, KvEntry, KvStoreMsg};
use spine_utils::mpls::Label;
use spine_utils::prefix::{PrefixDatabase, PrefixEntry, PrefixType};
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;

const NODE: &str = "node-1";
const KEY: &str = "prefix:node-1:a:[10.0.0.0/24]";

struct Fixture {
    store: PrefixEntryStore,
    pending: PendingChangeTracker,
    labels: LabelReadinessTracker,
    sync: KvStoreSync,
    kv_tx: mpsc::UnboundedSender<KvStoreMsg>,
    kv_rx: UnboundedReceiver<KvStoreMsg>,
}

impl Fixture {
    fn new() -> Fixture {
        let (kv_tx, kv_rx) = mpsc::unbounded_channel();
        Fixture {
            store: PrefixEntryStore::new(TypeRanks::new(false)),
            pending: PendingChangeTracker::default(),
            labels: LabelReadinessTracker::default(),
            sync: KvStoreSync::new(
                NODE.to_owned(),
                btreeset!["a".to_owned()],
                KeyFormat::Legacy,
                Duration::from_secs(300),
            ),
            kv_tx,
            kv_rx,
        }
    }

    fn advertise(&mut self, entry: PrefixEntry) {
        self.store.advertise(
            entry,
            btreeset!["a".to_owned()],
            &mut self.pending,
        );
    }

    fn flush(&mut self) -> Vec<(String, KvEntry)> {
        let dirty = self.pending.drain();
        self.sync
            .flush(dirty, &self.store, &self.labels, &self.kv_tx);
        let mut puts = Vec::new();
        while let Ok(KvStoreMsg::Put { key, entry, .. }) = self.kv_rx.try_recv()
        {
            puts.push((key, entry));
        }
        puts
    }
}

fn entry(prefix: ipnetwork::IpNetwork) -> PrefixEntry {
    PrefixEntry::new(prefix, PrefixType::Default)
}

#[test]
fn publish_idempotence() {
    let mut fix = Fixture::new();
    let e = entry(net!("10.0.0.0/24"));

    fix.advertise(e.clone());
    let puts = fix.flush();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].0, KEY);
    assert_eq!(puts[0].1.version, 1);
    assert_eq!(puts[0].1.originator, NODE);
    let db = PrefixDatabase::decode(&puts[0].1.value).unwrap();
    assert_eq!(db.entries, vec![e.clone()]);
    assert!(!db.delete_prefix);

    // Identical re-advertisement: one version bump total, not two.
    fix.advertise(e);
    assert!(fix.flush().is_empty());
}

#[test]
fn version_bump_on_change() {
    let mut fix = Fixture::new();
    let mut e = entry(net!("10.0.0.0/24"));

    fix.advertise(e.clone());
    assert_eq!(fix.flush()[0].1.version, 1);

    e.metrics.preference = 200;
    fix.advertise(e);
    assert_eq!(fix.flush()[0].1.version, 2);
}

#[test]
fn tombstone_on_winner_disappearance() {
    let mut fix = Fixture::new();
    let prefix = net!("10.0.0.0/24");
    let e = entry(prefix);

    fix.advertise(e.clone());
    fix.flush();

    fix.store
        .withdraw(&prefix, PrefixType::Default, &mut fix.pending);
    let puts = fix.flush();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].1.version, 2);
    let db = PrefixDatabase::decode(&puts[0].1.value).unwrap();
    assert!(db.delete_prefix);
    // The tombstone carries the last-known entries.
    assert_eq!(db.entries, vec![e]);

    // Withdrawn keys are not republished.
    fix.pending.mark(prefix);
    assert!(fix.flush().is_empty());
}

#[test]
fn tombstone_without_publication() {
    let mut fix = Fixture::new();

    // Winner disappeared before anything was ever published.
    fix.pending.mark(net!("10.0.0.0/24"));
    assert!(fix.flush().is_empty());
}

#[test]
fn version_monotonic_over_observed() {
    let mut fix = Fixture::new();
    let e = entry(net!("10.0.0.0/24"));

    fix.advertise(e.clone());
    fix.flush();

    // A foreign node published version 41 under our key. The next local
    // publication must exceed it even though the value did not change.
    let foreign = PrefixDatabase {
        node: "node-2".to_owned(),
        entries: Vec::new(),
        delete_prefix: false,
    };
    let dirty = fix
        .sync
        .observe(&KeyChangeMsg {
            area: "a".to_owned(),
            key: KEY.to_owned(),
            entry: Some(KvEntry::new(
                41,
                "node-2".to_owned(),
                Duration::from_secs(300),
                foreign.encode(),
            )),
        })
        .unwrap();
    let prefix = dirty.unwrap();
    fix.pending.mark(prefix);

    let puts = fix.flush();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].1.version, 42);
    let db = PrefixDatabase::decode(&puts[0].1.value).unwrap();
    assert_eq!(db.entries, vec![e]);
}

#[test]
fn own_echo_ignored() {
    let mut fix = Fixture::new();

    fix.advertise(entry(net!("10.0.0.0/24")));
    let puts = fix.flush();

    // The store echoes our own publication back. Nothing to do.
    let dirty = fix
        .sync
        .observe(&KeyChangeMsg {
            area: "a".to_owned(),
            key: KEY.to_owned(),
            entry: Some(puts[0].1.clone()),
        })
        .unwrap();
    assert!(dirty.is_none());
}

#[test]
fn undecodable_value_overridden() {
    let mut fix = Fixture::new();

    fix.advertise(entry(net!("10.0.0.0/24")));
    fix.flush();

    // Corrupted value under our key: override it, never fail.
    let dirty = fix
        .sync
        .observe(&KeyChangeMsg {
            area: "a".to_owned(),
            key: KEY.to_owned(),
            entry: Some(KvEntry::new(
                7,
                "node-2".to_owned(),
                Duration::from_secs(300),
                Bytes::from_static(b"\xff\xfe"),
            )),
        })
        .unwrap();
    let prefix = dirty.unwrap();
    fix.pending.mark(prefix);

    let puts = fix.flush();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].1.version, 8);
}

#[test]
fn expiry_reasserted() {
    let mut fix = Fixture::new();

    fix.advertise(entry(net!("10.0.0.0/24")));
    fix.flush();

    // The key expired from the store while still published locally.
    let dirty = fix
        .sync
        .observe(&KeyChangeMsg {
            area: "a".to_owned(),
            key: KEY.to_owned(),
            entry: None,
        })
        .unwrap();
    let prefix = dirty.unwrap();
    fix.pending.mark(prefix);

    let puts = fix.flush();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].1.version, 2);
}

#[test]
fn foreign_node_key_ignored() {
    let mut fix = Fixture::new();

    let dirty = fix
        .sync
        .observe(&KeyChangeMsg {
            area: "a".to_owned(),
            key: "prefix:node-2:a:[10.0.0.0/24]".to_owned(),
            entry: None,
        })
        .unwrap();
    assert!(dirty.is_none());
}

#[test]
fn label_gating() {
    let mut fix = Fixture::new();
    let prefix = net!("10.0.0.0/24");
    let mut e = entry(prefix);
    e.forwarding.prepend_label = Some(Label::new(100));

    // Withheld until the label is confirmed programmed.
    fix.advertise(e.clone());
    assert!(fix.flush().is_empty());

    fix.labels.incremental_update(
        btreeset![Label::new(100)],
        Default::default(),
    );
    fix.pending.mark(prefix);
    let puts = fix.flush();
    assert_eq!(puts.len(), 1);
    let db = PrefixDatabase::decode(&puts[0].1.value).unwrap();
    assert_eq!(db.entries, vec![e]);

    // Removing the confirmation tombstones the key without further input.
    fix.labels.incremental_update(
        Default::default(),
        btreeset![Label::new(100)],
    );
    fix.pending.mark(prefix);
    let puts = fix.flush();
    assert_eq!(puts.len(), 1);
    let db = PrefixDatabase::decode(&puts[0].1.value).unwrap();
    assert!(db.delete_prefix);
}

#[test]
fn label_change_requires_reconfirmation() {
    let mut fix = Fixture::new();
    let prefix = net!("10.0.0.0/24");
    let mut e = entry(prefix);
    e.forwarding.prepend_label = Some(Label::new(100));

    fix.labels.incremental_update(
        btreeset![Label::new(100)],
        Default::default(),
    );
    fix.advertise(e.clone());
    assert_eq!(fix.flush().len(), 1);

    // A new label on the same prefix must confirm on its own; the old
    // confirmation does not carry over.
    e.forwarding.prepend_label = Some(Label::new(200));
    fix.advertise(e);
    let puts = fix.flush();
    assert_eq!(puts.len(), 1);
    let db = PrefixDatabase::decode(&puts[0].1.value).unwrap();
    assert!(db.delete_prefix);
}

#[test]
fn ttl_refresh_republishes_same_version() {
    let mut fix = Fixture::new();

    fix.advertise(entry(net!("10.0.0.0/24")));
    fix.flush();

    let refreshed = fix.sync.refresh_ttl(&fix.kv_tx);
    assert_eq!(refreshed, 1);
    let Ok(KvStoreMsg::Put { key, entry, .. }) = fix.kv_rx.try_recv() else {
        panic!("expected put");
    };
    assert_eq!(key, KEY);
    assert_eq!(entry.version, 1);
}

#[test]
fn ttl_refresh_skips_withdrawn() {
    let mut fix = Fixture::new();
    let prefix = net!("10.0.0.0/24");

    fix.advertise(entry(prefix));
    fix.flush();
    fix.store
        .withdraw(&prefix, PrefixType::Default, &mut fix.pending);
    fix.flush();

    assert_eq!(fix.sync.refresh_ttl(&fix.kv_tx), 0);
}
