//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use ipnetwork::IpNetwork;
use spine_utils::prefix::{PrefixEntry, PrefixType};

// Client-type tie-break rank table. Lower rank wins. The default ranks are
// the client-type discriminants; the prefer-originated knob swaps the
// Config and Bgp ranks.
#[derive(Clone, Debug)]
pub struct TypeRanks {
    ranks: BTreeMap<PrefixType, u8>,
}

// One client's entry as held by the store, together with the set of areas
// the entry may be advertised into.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredEntry {
    pub entry: PrefixEntry,
    pub dst_areas: BTreeSet<String>,
}

// All client entries for all prefixes. At most one entry exists per
// (prefix, client-type) pair; the winner is recomputed from the full entry
// set on every read rather than cached.
#[derive(Debug)]
pub struct PrefixEntryStore {
    entries: BTreeMap<IpNetwork, BTreeMap<PrefixType, StoredEntry>>,
    ranks: TypeRanks,
}

// Prefixes mutated since the last key-value store flush. Deduplicated;
// drained atomically by the sync cycle.
#[derive(Debug, Default)]
pub struct PendingChangeTracker {
    dirty: BTreeSet<IpNetwork>,
}

// ===== impl TypeRanks =====

impl TypeRanks {
    const TYPES: [PrefixType; 7] = [
        PrefixType::Loopback,
        PrefixType::Default,
        PrefixType::PrefixAllocator,
        PrefixType::Config,
        PrefixType::Bgp,
        PrefixType::Rib,
        PrefixType::Vip,
    ];

    pub fn new(prefer_originated: bool) -> TypeRanks {
        let mut ranks: BTreeMap<_, _> = Self::TYPES
            .into_iter()
            .map(|prefix_type| (prefix_type, prefix_type as u8))
            .collect();
        // By default BGP outranks originated (Config) entries; the
        // prefer-originated knob swaps their ranks.
        let config = ranks[&PrefixType::Config];
        let bgp = ranks[&PrefixType::Bgp];
        if prefer_originated {
            ranks.insert(PrefixType::Config, config.min(bgp));
            ranks.insert(PrefixType::Bgp, config.max(bgp));
        } else {
            ranks.insert(PrefixType::Bgp, config.min(bgp));
            ranks.insert(PrefixType::Config, config.max(bgp));
        }
        TypeRanks { ranks }
    }

    pub fn get(&self, prefix_type: PrefixType) -> u8 {
        self.ranks[&prefix_type]
    }
}

// ===== impl PrefixEntryStore =====

impl PrefixEntryStore {
    pub fn new(ranks: TypeRanks) -> PrefixEntryStore {
        PrefixEntryStore {
            entries: Default::default(),
            ranks,
        }
    }

    // Inserts or replaces the (prefix, client-type) entry. Returns true iff
    // the stored value actually changed; re-advertising an identical entry
    // is a no-op.
    pub fn advertise(
        &mut self,
        entry: PrefixEntry,
        dst_areas: BTreeSet<String>,
        pending: &mut PendingChangeTracker,
    ) -> bool {
        let prefix = entry.prefix;
        let stored = StoredEntry { entry, dst_areas };
        let types = self.entries.entry(prefix).or_default();
        match types.get(&stored.entry.prefix_type) {
            Some(old) if *old == stored => false,
            _ => {
                types.insert(stored.entry.prefix_type, stored);
                pending.mark(prefix);
                true
            }
        }
    }

    // Removes the (prefix, client-type) entry if present. Removing an
    // entry that was never advertised is a no-op, not an error.
    pub fn withdraw(
        &mut self,
        prefix: &IpNetwork,
        prefix_type: PrefixType,
        pending: &mut PendingChangeTracker,
    ) -> bool {
        let Some(types) = self.entries.get_mut(prefix) else {
            return false;
        };
        if types.remove(&prefix_type).is_none() {
            return false;
        }
        if types.is_empty() {
            self.entries.remove(prefix);
        }
        pending.mark(*prefix);
        true
    }

    // Removes all entries of the given client type.
    pub fn withdraw_by_type(
        &mut self,
        prefix_type: PrefixType,
        pending: &mut PendingChangeTracker,
    ) -> bool {
        let prefixes = self
            .entries
            .iter()
            .filter(|(_, types)| types.contains_key(&prefix_type))
            .map(|(prefix, _)| *prefix)
            .collect::<Vec<_>>();

        let mut changed = false;
        for prefix in prefixes {
            changed |= self.withdraw(&prefix, prefix_type, pending);
        }
        changed
    }

    // Replacement semantics for one client type: entries absent from the
    // given set are withdrawn, the rest are advertised. A second identical
    // call is a no-op.
    pub fn sync_by_type(
        &mut self,
        prefix_type: PrefixType,
        entries: Vec<(PrefixEntry, BTreeSet<String>)>,
        pending: &mut PendingChangeTracker,
    ) -> bool {
        let keep = entries
            .iter()
            .map(|(entry, _)| entry.prefix)
            .collect::<BTreeSet<_>>();
        let stale = self
            .entries
            .iter()
            .filter(|(prefix, types)| {
                types.contains_key(&prefix_type) && !keep.contains(prefix)
            })
            .map(|(prefix, _)| *prefix)
            .collect::<Vec<_>>();

        let mut changed = false;
        for prefix in stale {
            changed |= self.withdraw(&prefix, prefix_type, pending);
        }
        for (entry, dst_areas) in entries {
            changed |= self.advertise(entry, dst_areas, pending);
        }
        changed
    }

    pub fn get(
        &self,
        prefix: &IpNetwork,
        prefix_type: PrefixType,
    ) -> Option<&StoredEntry> {
        self.entries.get(prefix)?.get(&prefix_type)
    }

    pub fn contains(&self, prefix: &IpNetwork) -> bool {
        self.entries.contains_key(prefix)
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &IpNetwork> + '_ {
        self.entries.keys()
    }

    // Iterates over all entries of all prefixes.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&IpNetwork, &StoredEntry)> + '_ {
        self.entries.iter().flat_map(|(prefix, types)| {
            types.values().map(move |stored| (prefix, stored))
        })
    }

    // Returns all client entries for the given prefix.
    pub fn entries(
        &self,
        prefix: &IpNetwork,
    ) -> impl Iterator<Item = &StoredEntry> + '_ {
        self.entries.get(prefix).into_iter().flat_map(|types| {
            types.values()
        })
    }

    // Computes the winner among all client entries for the prefix. Returns
    // none once the last entry is withdrawn.
    pub fn best_entry(&self, prefix: &IpNetwork) -> Option<&StoredEntry> {
        self.best_entry_by(prefix, |_| true)
    }

    // Computes the winner among the entries advertisable into the given
    // area.
    pub fn best_entry_for_area(
        &self,
        prefix: &IpNetwork,
        area: &str,
    ) -> Option<&StoredEntry> {
        self.best_entry_by(prefix, |stored| {
            stored.dst_areas.contains(area)
        })
    }

    fn best_entry_by<F>(
        &self,
        prefix: &IpNetwork,
        filter: F,
    ) -> Option<&StoredEntry>
    where
        F: Fn(&StoredEntry) -> bool,
    {
        self.entries
            .get(prefix)?
            .values()
            .filter(|stored| filter(stored))
            .max_by(|a, b| self.compare(&a.entry, &b.entry))
    }

    // Total order over prefix entries. `Ordering::Greater` means preferred.
    pub fn compare(&self, a: &PrefixEntry, b: &PrefixEntry) -> Ordering {
        // Compare path preferences.
        match a.metrics.preference.cmp(&b.metrics.preference) {
            Ordering::Equal => {}
            ordering => return ordering,
        }

        // Compare redistribution distances. Lower is better, so entries
        // redistributed through fewer areas win over their copies.
        match b.metrics.distance.cmp(&a.metrics.distance) {
            Ordering::Equal => {}
            ordering => return ordering,
        }

        // Compare source preferences.
        match a
            .metrics
            .source_preference
            .cmp(&b.metrics.source_preference)
        {
            Ordering::Equal => {}
            ordering => return ordering,
        }

        // Final tie-break: the lowest-ranked client type wins.
        self.ranks
            .get(b.prefix_type)
            .cmp(&self.ranks.get(a.prefix_type))
    }
}

// ===== impl PendingChangeTracker =====

impl PendingChangeTracker {
    pub fn mark(&mut self, prefix: IpNetwork) {
        self.dirty.insert(prefix);
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dirty.len()
    }

    // Hands the entire dirty set to the caller, leaving the tracker empty.
    pub fn drain(&mut self) -> BTreeSet<IpNetwork> {
        std::mem::take(&mut self.dirty)
    }
}
