//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use enum_as_inner::EnumAsInner;
use ipnetwork::IpNetwork;
use spine_utils::UnboundedSender;
use spine_utils::kvstore::{KeyChangeMsg, KvEntry, KvStoreMsg};
use spine_utils::prefix::PrefixDatabase;

use crate::debug::Debug;
use crate::entries::PrefixEntryStore;
use crate::error::Error;
use crate::key::{KeyFormat, PrefixKey};
use crate::labels::LabelReadinessTracker;

// Publication status of one key. Unpublished keys have no state at all.
#[derive(Debug, EnumAsInner)]
pub enum KeyStatus {
    // The key carries a live prefix database.
    Published(PrefixDatabase),
    // A tombstone was published and the key is aging out. The version is
    // retained so a later re-publication stays monotonic.
    Withdrawn,
}

#[derive(Debug)]
pub struct KeyState {
    // Version of the last local publication.
    pub version: u64,
    // Highest version observed from the subscription stream, local echoes
    // included. The next publication must exceed both.
    pub observed: u64,
    // The store holds a value diverging from canonical local state (foreign
    // override, premature expiry, undecodable entry). The next flush must
    // republish even when the local value did not change.
    needs_reassert: bool,
    pub status: KeyStatus,
}

// Reconciles the winner table against the distributed key-value store, one
// key per (area, prefix) pair.
#[derive(Debug)]
pub struct KvStoreSync {
    node_id: String,
    areas: BTreeSet<String>,
    key_format: KeyFormat,
    key_ttl: Duration,
    states: BTreeMap<(String, String), KeyState>,
}

// ===== impl KeyState =====

impl KeyState {
    fn next_version(&self) -> u64 {
        self.version.max(self.observed) + 1
    }
}

// ===== impl KvStoreSync =====

impl KvStoreSync {
    pub fn new(
        node_id: String,
        areas: BTreeSet<String>,
        key_format: KeyFormat,
        key_ttl: Duration,
    ) -> KvStoreSync {
        KvStoreSync {
            node_id,
            areas,
            key_format,
            key_ttl,
            states: Default::default(),
        }
    }

    // Publishes the current winner state of every dirty prefix into every
    // configured area. Returns the number of publications issued.
    pub fn flush(
        &mut self,
        dirty: BTreeSet<IpNetwork>,
        store: &PrefixEntryStore,
        labels: &LabelReadinessTracker,
        kv_tx: &UnboundedSender<KvStoreMsg>,
    ) -> usize {
        let mut published = 0;

        for prefix in dirty {
            for area in self.areas.clone() {
                let key = PrefixKey::new(&self.node_id, &area, prefix)
                    .encode(self.key_format);
                let winner = store
                    .best_entry_for_area(&prefix, &area)
                    .filter(|stored| labels.is_eligible(&stored.entry));

                match winner {
                    Some(stored) => {
                        let db = PrefixDatabase {
                            node: self.node_id.clone(),
                            entries: vec![stored.entry.clone()],
                            delete_prefix: false,
                        };
                        published +=
                            self.publish(&area, &key, db, kv_tx) as usize;
                    }
                    None => {
                        published +=
                            self.tombstone(&area, &key, kv_tx) as usize;
                    }
                }
            }
        }

        published
    }

    // Publishes the database under the key unless the currently published
    // value is identical. Idempotent re-publications do not bump versions.
    fn publish(
        &mut self,
        area: &str,
        key: &str,
        db: PrefixDatabase,
        kv_tx: &UnboundedSender<KvStoreMsg>,
    ) -> bool {
        let state = self
            .states
            .entry((area.to_owned(), key.to_owned()))
            .or_insert(KeyState {
                version: 0,
                observed: 0,
                needs_reassert: false,
                status: KeyStatus::Withdrawn,
            });

        if !state.needs_reassert
            && state.status.as_published() == Some(&db)
        {
            return false;
        }

        let version = state.next_version();
        state.version = version;
        state.needs_reassert = false;
        state.status = KeyStatus::Published(db.clone());
        Debug::KvPublish(area, key, version).log();
        let _ = kv_tx.send(KvStoreMsg::Put {
            area: area.to_owned(),
            key: key.to_owned(),
            entry: KvEntry::new(
                version,
                self.node_id.clone(),
                self.key_ttl,
                db.encode(),
            ),
        });
        true
    }

    // Publishes a tombstone carrying the last-known entries, then lets the
    // key age out (TTL refreshes stop).
    fn tombstone(
        &mut self,
        area: &str,
        key: &str,
        kv_tx: &UnboundedSender<KvStoreMsg>,
    ) -> bool {
        let Some(state) =
            self.states.get_mut(&(area.to_owned(), key.to_owned()))
        else {
            // Never published, nothing to withdraw.
            return false;
        };
        let db = match &state.status {
            KeyStatus::Published(db) => PrefixDatabase {
                delete_prefix: true,
                ..db.clone()
            },
            // Already withdrawn. Reassert the tombstone only if the store
            // holds something else on top of it.
            KeyStatus::Withdrawn if state.needs_reassert => {
                PrefixDatabase {
                    node: self.node_id.clone(),
                    entries: Vec::new(),
                    delete_prefix: true,
                }
            }
            KeyStatus::Withdrawn => return false,
        };

        let version = state.next_version();
        state.version = version;
        state.needs_reassert = false;
        state.status = KeyStatus::Withdrawn;
        Debug::KvTombstone(area, key, version).log();
        let _ = kv_tx.send(KvStoreMsg::Put {
            area: area.to_owned(),
            key: key.to_owned(),
            entry: KvEntry::new(
                version,
                self.node_id.clone(),
                self.key_ttl,
                db.encode(),
            ),
        });
        true
    }

    // Re-puts every Published key with its current version and a fresh
    // TTL. Withdrawn keys are left to expire.
    pub fn refresh_ttl(
        &self,
        kv_tx: &UnboundedSender<KvStoreMsg>,
    ) -> usize {
        let mut refreshed = 0;

        for ((area, key), state) in &self.states {
            let Some(db) = state.status.as_published() else {
                continue;
            };
            let _ = kv_tx.send(KvStoreMsg::Put {
                area: area.clone(),
                key: key.clone(),
                entry: KvEntry::new(
                    state.version,
                    self.node_id.clone(),
                    self.key_ttl,
                    db.encode(),
                ),
            });
            refreshed += 1;
        }

        refreshed
    }

    // Processes one subscription notification. Returns the prefix to
    // dirty-mark when the observed value diverges from canonical local
    // state, so the next flush overrides it.
    pub fn observe(
        &mut self,
        msg: &KeyChangeMsg,
    ) -> Result<Option<IpNetwork>, Error> {
        // Keys named after other nodes are none of our business.
        let (prefix_key, _) = PrefixKey::parse(&msg.key)
            .map_err(|error| Error::KeyParse(msg.key.clone(), error))?;
        if prefix_key.node != self.node_id {
            return Ok(None);
        }

        let Some(state) = self
            .states
            .get_mut(&(msg.area.clone(), msg.key.clone()))
        else {
            // Someone else is publishing under our name before we ever
            // did. Claim the key on the next flush.
            return Ok(Some(prefix_key.prefix));
        };

        let Some(entry) = &msg.entry else {
            // Expiry. Expected for Withdrawn keys; for Published keys the
            // canonical state must be reasserted.
            return match &state.status {
                KeyStatus::Published(_) => {
                    state.needs_reassert = true;
                    Ok(Some(prefix_key.prefix))
                }
                KeyStatus::Withdrawn => Ok(None),
            };
        };

        state.observed = state.observed.max(entry.version);

        // Our own publication echoed back.
        if entry.originator == self.node_id
            && entry.version == state.version
        {
            return Ok(None);
        }

        // Foreign override, or a stale local value surviving in the store.
        // Either way the canonical state must win on the next flush.
        state.needs_reassert = true;
        Debug::KvForeignOverride(&msg.key, entry.version).log();
        if let Err(error) = PrefixDatabase::decode(&entry.value) {
            // Undecodable values are overridden like any other foreign
            // write, never treated as fatal.
            Error::KvEntryDecode(msg.key.clone(), error).log();
        }
        Ok(Some(prefix_key.prefix))
    }

    pub fn state(&self, area: &str, key: &str) -> Option<&KeyState> {
        self.states.get(&(area.to_owned(), key.to_owned()))
    }
}
