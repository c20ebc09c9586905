//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use spine_utils::mpls::Label;
use spine_utils::prefix::PrefixEntry;

// Set of MPLS labels confirmed as programmed by the forwarding layer.
// Entries carrying a prepend label are withheld from advertisement until
// their label shows up here.
#[derive(Debug, Default)]
pub struct LabelReadinessTracker {
    confirmed: BTreeSet<Label>,
}

// Labels whose readiness flipped during one forwarding-layer update.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct LabelChanges {
    pub confirmed: BTreeSet<Label>,
    pub unconfirmed: BTreeSet<Label>,
}

// ===== impl LabelReadinessTracker =====

impl LabelReadinessTracker {
    // Replaces the confirmed set wholesale. Labels absent from the new set
    // become unconfirmed, even without an explicit removal.
    pub fn full_sync(&mut self, labels: BTreeSet<Label>) -> LabelChanges {
        let confirmed = labels
            .difference(&self.confirmed)
            .copied()
            .collect::<BTreeSet<_>>();
        let unconfirmed = self
            .confirmed
            .difference(&labels)
            .copied()
            .collect::<BTreeSet<_>>();
        self.confirmed = labels;
        LabelChanges {
            confirmed,
            unconfirmed,
        }
    }

    pub fn incremental_update(
        &mut self,
        added: BTreeSet<Label>,
        removed: BTreeSet<Label>,
    ) -> LabelChanges {
        let mut changes = LabelChanges::default();
        for label in added {
            if self.confirmed.insert(label) {
                changes.confirmed.insert(label);
            }
        }
        for label in removed {
            if self.confirmed.remove(&label) {
                changes.unconfirmed.insert(label);
            }
        }
        changes
    }

    pub fn is_confirmed(&self, label: Label) -> bool {
        self.confirmed.contains(&label)
    }

    pub fn confirmed(&self) -> &BTreeSet<Label> {
        &self.confirmed
    }

    // An entry without a prepend label is always eligible; one with a
    // prepend label only once the label is confirmed programmed.
    pub fn is_eligible(&self, entry: &PrefixEntry) -> bool {
        match entry.forwarding.prepend_label {
            Some(label) => self.is_confirmed(label),
            None => true,
        }
    }
}

// ===== impl LabelChanges =====

impl LabelChanges {
    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty() && self.unconfirmed.is_empty()
    }

    // All labels whose readiness changed, in either direction.
    pub fn all(&self) -> impl Iterator<Item = &Label> + '_ {
        self.confirmed.iter().chain(self.unconfirmed.iter())
    }
}
