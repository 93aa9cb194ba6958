// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, RwLock},
};

use snafu::prelude::*;

use crate::{
    identity::Commitment,
    membership::MembershipSnapshot,
    signal::{NullifierHash, SignalRecord},
    topic::Tag,
};

/// Errors that can arise relating to a [`MembershipLedger`].
#[derive(Debug, Snafu)]
pub enum LedgerError {
    /// The commitment was already published.
    #[snafu(display("The commitment was already published"))]
    DuplicateCommitment,
    /// The nullifier hash was already recorded for the tag.
    #[snafu(display("The nullifier was already recorded for this tag"))]
    DuplicateNullifier,
    /// The tag no longer accepts signals.
    #[snafu(display("Tag {tag} is sealed"))]
    Sealed {
        /// The sealed tag.
        tag: Tag,
    },
    /// The tag was never opened on the ledger.
    #[snafu(display("Tag {tag} is unknown"))]
    UnknownTag {
        /// The unknown tag.
        tag: Tag,
    },
    /// The tag was already opened on the ledger.
    #[snafu(display("Tag {tag} was already opened"))]
    DuplicateTag {
        /// The duplicate tag.
        tag: Tag,
    },
    /// The ledger could not be reached or is in an unusable state.
    #[snafu(display("The ledger is unavailable: {reason}"))]
    Unavailable {
        /// The reason the ledger is unavailable.
        reason: String,
    },
}

impl LedgerError {
    fn poisoned() -> Self {
        Self::Unavailable {
            reason: "a ledger lock was poisoned".to_owned(),
        }
    }
}

/// The external, append-only store of published commitments and accepted signals.
///
/// Every method is a blocking call with a definite outcome. Implementations must make [`MembershipLedger::publish`]
/// and [`MembershipLedger::record_signal`] atomic check-and-insert operations, and must order
/// [`MembershipLedger::seal`] against [`MembershipLedger::record_signal`] for the same tag: once a tag is sealed, no
/// further signal may be recorded for it.
pub trait MembershipLedger: Send + Sync {
    /// Append `commitment` to the membership set, returning its index.
    ///
    /// Fails with [`LedgerError::DuplicateCommitment`] if it is already present.
    fn publish(&self, commitment: &Commitment) -> Result<u64, LedgerError>;

    /// Get a snapshot of the membership set.
    fn snapshot(&self) -> Result<MembershipSnapshot, LedgerError>;

    /// Get the number of published commitments.
    fn member_count(&self) -> Result<usize, LedgerError>;

    /// Start accepting signals for `tag`.
    fn open_tag(&self, tag: Tag) -> Result<(), LedgerError>;

    /// Record `record` if its nullifier hash is new for its tag.
    ///
    /// Fails with [`LedgerError::DuplicateNullifier`] if the nullifier hash was already recorded, and with
    /// [`LedgerError::Sealed`] if the tag was sealed.
    fn record_signal(&self, record: &SignalRecord) -> Result<(), LedgerError>;

    /// Stop accepting signals for `tag`.
    fn seal(&self, tag: Tag) -> Result<(), LedgerError>;

    /// Get every signal recorded for `tag`, in the order they were recorded.
    fn signals(&self, tag: Tag) -> Result<Vec<SignalRecord>, LedgerError>;
}

// The membership set and its duplicate index
#[derive(Debug, Default)]
struct MemberTable {
    commitments: Vec<Commitment>,
    index: HashSet<Commitment>,
}

// Signals for a single tag
#[derive(Debug, Default)]
struct TagSignals {
    sealed: bool,
    nullifiers: HashSet<NullifierHash>,
    records: Vec<SignalRecord>,
}

/// An in-memory [`MembershipLedger`].
///
/// Each tag has its own lock around its nullifier set, so submissions on unrelated topics never contend. The
/// membership set has a single read-write lock; snapshots are taken under the read lock.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    members: RwLock<MemberTable>,
    tags: RwLock<HashMap<Tag, Arc<Mutex<TagSignals>>>>,
}

impl MemoryLedger {
    /// Generate a new empty [`MemoryLedger`].
    pub fn new() -> Self {
        Self::default()
    }

    // Get the signal set for a tag without holding the map lock
    fn tag_signals(&self, tag: Tag) -> Result<Arc<Mutex<TagSignals>>, LedgerError> {
        self.tags
            .read()
            .map_err(|_| LedgerError::poisoned())?
            .get(&tag)
            .cloned()
            .ok_or(LedgerError::UnknownTag { tag })
    }
}

impl MembershipLedger for MemoryLedger {
    fn publish(&self, commitment: &Commitment) -> Result<u64, LedgerError> {
        let mut members = self.members.write().map_err(|_| LedgerError::poisoned())?;

        if !members.index.insert(*commitment) {
            return Err(LedgerError::DuplicateCommitment);
        }
        members.commitments.push(*commitment);

        Ok((members.commitments.len() - 1) as u64)
    }

    fn snapshot(&self) -> Result<MembershipSnapshot, LedgerError> {
        let members = self.members.read().map_err(|_| LedgerError::poisoned())?;

        Ok(MembershipSnapshot::new(&members.commitments))
    }

    fn member_count(&self) -> Result<usize, LedgerError> {
        Ok(self.members.read().map_err(|_| LedgerError::poisoned())?.commitments.len())
    }

    fn open_tag(&self, tag: Tag) -> Result<(), LedgerError> {
        let mut tags = self.tags.write().map_err(|_| LedgerError::poisoned())?;

        if tags.contains_key(&tag) {
            return Err(LedgerError::DuplicateTag { tag });
        }
        tags.insert(tag, Arc::new(Mutex::new(TagSignals::default())));

        Ok(())
    }

    fn record_signal(&self, record: &SignalRecord) -> Result<(), LedgerError> {
        let tag = record.get_tag();
        let signals = self.tag_signals(tag)?;
        let mut signals = signals.lock().map_err(|_| LedgerError::poisoned())?;

        if signals.sealed {
            return Err(LedgerError::Sealed { tag });
        }
        if !signals.nullifiers.insert(*record.get_nullifier_hash()) {
            return Err(LedgerError::DuplicateNullifier);
        }
        signals.records.push(record.clone());

        Ok(())
    }

    fn seal(&self, tag: Tag) -> Result<(), LedgerError> {
        let signals = self.tag_signals(tag)?;
        let mut signals = signals.lock().map_err(|_| LedgerError::poisoned())?;

        if signals.sealed {
            return Err(LedgerError::Sealed { tag });
        }
        signals.sealed = true;

        Ok(())
    }

    fn signals(&self, tag: Tag) -> Result<Vec<SignalRecord>, LedgerError> {
        let signals = self.tag_signals(tag)?;
        let signals = signals.lock().map_err(|_| LedgerError::poisoned())?;

        Ok(signals.records.clone())
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread};

    use super::{LedgerError, MembershipLedger, MemoryLedger};
    use crate::{
        identity::Commitment,
        signal::{NullifierHash, SignalRecord, Vote},
        topic::Tag,
    };

    #[test]
    fn test_record_and_seal() {
        let ledger = MemoryLedger::new();
        let tag = Tag::new(3);
        let record = SignalRecord::new(tag, NullifierHash::from_bytes([1u8; 32]), Vote::Yes);

        // Unknown tags reject everything
        assert!(matches!(
            ledger.record_signal(&record),
            Err(LedgerError::UnknownTag { .. })
        ));

        ledger.open_tag(tag).unwrap();
        assert!(matches!(ledger.open_tag(tag), Err(LedgerError::DuplicateTag { .. })));
        ledger.record_signal(&record).unwrap();

        // The same nullifier is rejected regardless of the vote
        let repeat = SignalRecord::new(tag, NullifierHash::from_bytes([1u8; 32]), Vote::No);
        assert!(matches!(
            ledger.record_signal(&repeat),
            Err(LedgerError::DuplicateNullifier)
        ));

        // Sealing stops new signals but keeps the old ones
        ledger.seal(tag).unwrap();
        let late = SignalRecord::new(tag, NullifierHash::from_bytes([2u8; 32]), Vote::No);
        assert!(matches!(ledger.record_signal(&late), Err(LedgerError::Sealed { .. })));
        assert!(matches!(ledger.seal(tag), Err(LedgerError::Sealed { .. })));
        assert_eq!(ledger.signals(tag).unwrap(), vec![record]);
    }

    #[test]
    fn test_member_count() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.member_count().unwrap(), 0);

        ledger.publish(&Commitment::from_bytes([1u8; 32])).unwrap();
        ledger.publish(&Commitment::from_bytes([2u8; 32])).unwrap();
        assert!(ledger.publish(&Commitment::from_bytes([1u8; 32])).is_err());
        assert_eq!(ledger.member_count().unwrap(), 2);
        assert_eq!(ledger.snapshot().unwrap().len(), 2);
    }

    #[test]
    fn test_tags_are_independent() {
        let ledger = MemoryLedger::new();
        let nullifier = NullifierHash::from_bytes([7u8; 32]);

        for tag in [Tag::new(1), Tag::new(2)] {
            ledger.open_tag(tag).unwrap();
            ledger.record_signal(&SignalRecord::new(tag, nullifier, Vote::Yes)).unwrap();
        }
        assert_eq!(ledger.signals(Tag::new(1)).unwrap().len(), 1);
        assert_eq!(ledger.signals(Tag::new(2)).unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_inserts() {
        const THREADS: usize = 16;

        let ledger = Arc::new(MemoryLedger::new());
        let tag = Tag::new(1);
        ledger.open_tag(tag).unwrap();

        let accepted = thread::scope(|scope| {
            let handles = (0..THREADS)
                .map(|_| {
                    let ledger = Arc::clone(&ledger);
                    scope.spawn(move || {
                        ledger
                            .record_signal(&SignalRecord::new(tag, NullifierHash::from_bytes([9u8; 32]), Vote::Yes))
                            .is_ok()
                    })
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|accepted| *accepted)
                .count()
        });
        assert_eq!(accepted, 1);
    }
}
