//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use const_addrs::net;
use maplit::btreeset;
use spine_prefix_manager::entries::{
    PendingChangeTracker, PrefixEntryStore, TypeRanks,
};
use spine_utils::prefix::{PrefixEntry, PrefixType};

fn store() -> (PrefixEntryStore, PendingChangeTracker) {
    (
        PrefixEntryStore::new(TypeRanks::new(false)),
        PendingChangeTracker::default(),
    )
}

fn entry(
    prefix: ipnetwork::IpNetwork,
    prefix_type: PrefixType,
    preference: u32,
) -> PrefixEntry {
    let mut entry = PrefixEntry::new(prefix, prefix_type);
    entry.metrics.preference = preference;
    entry
}

fn areas() -> BTreeSet<String> {
    btreeset!["a".to_owned(), "b".to_owned()]
}

#[test]
fn winner_determinism() {
    let (mut store, mut pending) = store();
    let prefix = net!("10.0.0.0/24");

    store.advertise(
        entry(prefix, PrefixType::Loopback, 200),
        areas(),
        &mut pending,
    );
    store.advertise(
        entry(prefix, PrefixType::Bgp, 200),
        areas(),
        &mut pending,
    );
    store.advertise(
        entry(prefix, PrefixType::Default, 100),
        areas(),
        &mut pending,
    );

    // Equal metrics, lowest client-type rank wins.
    let best = store.best_entry(&prefix).unwrap();
    assert_eq!(best.entry.prefix_type, PrefixType::Loopback);

    // Metrics dominate the rank table.
    store.withdraw(&prefix, PrefixType::Loopback, &mut pending);
    let best = store.best_entry(&prefix).unwrap();
    assert_eq!(best.entry.prefix_type, PrefixType::Bgp);

    store.withdraw(&prefix, PrefixType::Bgp, &mut pending);
    let best = store.best_entry(&prefix).unwrap();
    assert_eq!(best.entry.prefix_type, PrefixType::Default);
}

#[test]
fn type_rank_knob() {
    let prefix = net!("10.0.0.0/24");

    // By default BGP beats originated entries on equal metrics.
    let (mut store, mut pending) = store();
    store.advertise(
        entry(prefix, PrefixType::Config, 100),
        areas(),
        &mut pending,
    );
    store.advertise(
        entry(prefix, PrefixType::Bgp, 100),
        areas(),
        &mut pending,
    );
    let best = store.best_entry(&prefix).unwrap();
    assert_eq!(best.entry.prefix_type, PrefixType::Bgp);

    // The prefer-originated knob swaps the two ranks.
    let mut store = PrefixEntryStore::new(TypeRanks::new(true));
    store.advertise(
        entry(prefix, PrefixType::Config, 100),
        areas(),
        &mut pending,
    );
    store.advertise(
        entry(prefix, PrefixType::Bgp, 100),
        areas(),
        &mut pending,
    );
    let best = store.best_entry(&prefix).unwrap();
    assert_eq!(best.entry.prefix_type, PrefixType::Config);
}

#[test]
fn advertise_idempotence() {
    let (mut store, mut pending) = store();
    let prefix = net!("10.1.1.1/32");

    let e = entry(prefix, PrefixType::Default, 100);
    assert!(store.advertise(e.clone(), areas(), &mut pending));
    assert_eq!(pending.drain(), btreeset![prefix]);

    // Re-advertising identical content is a no-op and marks nothing.
    assert!(!store.advertise(e.clone(), areas(), &mut pending));
    assert!(pending.is_empty());

    // Changing any attribute counts as a change again.
    let mut e = e;
    e.metrics.preference = 200;
    assert!(store.advertise(e, areas(), &mut pending));
    assert_eq!(pending.drain(), btreeset![prefix]);
}

#[test]
fn multiple_client_types_coexist() {
    let (mut store, mut pending) = store();
    let prefix = net!("10.1.1.1/32");

    store.advertise(
        entry(prefix, PrefixType::Default, 100),
        areas(),
        &mut pending,
    );
    store.advertise(
        entry(prefix, PrefixType::PrefixAllocator, 100),
        areas(),
        &mut pending,
    );
    assert_eq!(store.entries(&prefix).count(), 2);

    // Default (rank 2) wins over PrefixAllocator (rank 3).
    let best = store.best_entry(&prefix).unwrap();
    assert_eq!(best.entry.prefix_type, PrefixType::Default);

    assert!(store.withdraw(&prefix, PrefixType::Default, &mut pending));
    let best = store.best_entry(&prefix).unwrap();
    assert_eq!(best.entry.prefix_type, PrefixType::PrefixAllocator);

    assert!(store.withdraw(
        &prefix,
        PrefixType::PrefixAllocator,
        &mut pending
    ));
    assert!(store.best_entry(&prefix).is_none());
    assert!(!store.contains(&prefix));
}

#[test]
fn withdraw_nonexistent() {
    let (mut store, mut pending) = store();
    let prefix = net!("10.1.1.1/32");

    // Withdrawing something never advertised is a no-op, not an error.
    assert!(!store.withdraw(&prefix, PrefixType::Default, &mut pending));
    assert!(pending.is_empty());

    store.advertise(
        entry(prefix, PrefixType::Default, 100),
        areas(),
        &mut pending,
    );
    assert!(!store.withdraw(&prefix, PrefixType::Bgp, &mut pending));
}

#[test]
fn withdraw_by_type() {
    let (mut store, mut pending) = store();

    store.advertise(
        entry(net!("10.1.0.0/24"), PrefixType::Bgp, 100),
        areas(),
        &mut pending,
    );
    store.advertise(
        entry(net!("10.2.0.0/24"), PrefixType::Bgp, 100),
        areas(),
        &mut pending,
    );
    store.advertise(
        entry(net!("10.2.0.0/24"), PrefixType::Default, 100),
        areas(),
        &mut pending,
    );
    pending.drain();

    assert!(store.withdraw_by_type(PrefixType::Bgp, &mut pending));
    assert_eq!(
        pending.drain(),
        btreeset![net!("10.1.0.0/24"), net!("10.2.0.0/24")]
    );
    assert!(!store.contains(&net!("10.1.0.0/24")));
    assert!(store.contains(&net!("10.2.0.0/24")));

    assert!(!store.withdraw_by_type(PrefixType::Bgp, &mut pending));
}

#[test]
fn sync_by_type_replacement() {
    let (mut store, mut pending) = store();

    store.advertise(
        entry(net!("10.1.0.0/24"), PrefixType::Bgp, 100),
        areas(),
        &mut pending,
    );
    store.advertise(
        entry(net!("10.2.0.0/24"), PrefixType::Bgp, 100),
        areas(),
        &mut pending,
    );
    pending.drain();

    // 10.1.0.0/24 is dropped, 10.3.0.0/24 added, 10.2.0.0/24 kept as is.
    let set = vec![
        (entry(net!("10.2.0.0/24"), PrefixType::Bgp, 100), areas()),
        (entry(net!("10.3.0.0/24"), PrefixType::Bgp, 100), areas()),
    ];
    assert!(store.sync_by_type(PrefixType::Bgp, set.clone(), &mut pending));
    assert_eq!(
        pending.drain(),
        btreeset![net!("10.1.0.0/24"), net!("10.3.0.0/24")]
    );
    assert!(!store.contains(&net!("10.1.0.0/24")));

    // A second identical sync is a no-op.
    assert!(!store.sync_by_type(PrefixType::Bgp, set, &mut pending));
    assert!(pending.is_empty());
}

#[test]
fn per_area_winner() {
    let (mut store, mut pending) = store();
    let prefix = net!("10.0.0.0/24");

    // The BGP entry is advertisable everywhere, the RIB copy only into "b".
    store.advertise(
        entry(prefix, PrefixType::Bgp, 100),
        btreeset!["a".to_owned(), "b".to_owned()],
        &mut pending,
    );
    store.advertise(
        entry(prefix, PrefixType::Rib, 200),
        btreeset!["b".to_owned()],
        &mut pending,
    );

    let best = store.best_entry_for_area(&prefix, "a").unwrap();
    assert_eq!(best.entry.prefix_type, PrefixType::Bgp);
    let best = store.best_entry_for_area(&prefix, "b").unwrap();
    assert_eq!(best.entry.prefix_type, PrefixType::Rib);
    assert!(store.best_entry_for_area(&prefix, "c").is_none());
}
