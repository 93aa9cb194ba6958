// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    domains,
    identity::Commitment,
    ledger::{LedgerError, MembershipLedger},
    Transcript,
};

/// A point-in-time view of the membership set.
///
/// A snapshot is constructed from the ordered vector of published commitments.
/// Internally, it also contains a cryptographic hash of the commitments, which acts as the root that proofs are
/// bound to. Snapshots are cheap to clone.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MembershipSnapshot {
    commitments: Arc<Vec<Commitment>>,
    hash: Vec<u8>,
}

impl MembershipSnapshot {
    // Domain separator used for hashing
    const DOMAIN: &'static str = "nullvote membership snapshot";
    // Version identifier used for hashing
    const VERSION: u64 = 0;

    /// Generate a new [`MembershipSnapshot`] from a slice of commitments, in publication order.
    pub fn new(commitments: &[Commitment]) -> Self {
        // Use Merlin for the transcript hash
        let mut transcript = Transcript::new(Self::DOMAIN.as_bytes());
        transcript.append_u64(b"version", Self::VERSION);
        transcript.append_u64(b"size", commitments.len() as u64);
        for item in commitments {
            transcript.append_message(b"commitment", item.as_bytes());
        }
        let mut hash = vec![0u8; domains::TRANSCRIPT_HASH_BYTES];
        transcript.challenge_bytes(b"hash", &mut hash);

        Self {
            commitments: Arc::new(commitments.to_vec()),
            hash,
        }
    }

    /// Get the commitments in this [`MembershipSnapshot`], in publication order.
    pub fn get_commitments(&self) -> &[Commitment] {
        &self.commitments
    }

    /// Get the number of members in this [`MembershipSnapshot`].
    pub fn len(&self) -> usize {
        self.commitments.len()
    }

    /// Check if this [`MembershipSnapshot`] has no members.
    pub fn is_empty(&self) -> bool {
        self.commitments.is_empty()
    }

    /// Check if `commitment` is a member.
    pub fn contains(&self, commitment: &Commitment) -> bool {
        self.position(commitment).is_some()
    }

    /// Get the index of `commitment`, if it is a member.
    pub fn position(&self, commitment: &Commitment) -> Option<usize> {
        self.commitments.iter().position(|item| item == commitment)
    }

    /// Check if this [`MembershipSnapshot`] is an earlier view of `other`.
    ///
    /// The membership set only grows, so a genuine older snapshot lists the first commitments of any later one in the
    /// same order.
    pub fn is_prefix_of(&self, other: &MembershipSnapshot) -> bool {
        other.commitments.starts_with(self.commitments.as_slice())
    }

    /// Get a cryptographic hash representation of this [`MembershipSnapshot`].
    ///
    /// Two snapshots with the same commitments in the same order have the same hash.
    pub fn get_hash(&self) -> &[u8] {
        &self.hash
    }
}

/// The registry of published identity commitments.
///
/// The registry is a thin layer over a [`MembershipLedger`], which owns the append-only membership set and enforces
/// that no commitment appears twice.
#[derive(Debug)]
pub struct MembershipRegistry<L> {
    ledger: Arc<L>,
}

impl<L: MembershipLedger> MembershipRegistry<L> {
    /// Generate a new [`MembershipRegistry`] over `ledger`.
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Publish `commitment`, returning its index in the membership set.
    ///
    /// If the commitment was already published, returns [`LedgerError::DuplicateCommitment`] and the set is
    /// unchanged.
    pub fn publish(&self, commitment: &Commitment) -> Result<u64, LedgerError> {
        let index = self.ledger.publish(commitment)?;
        info!(index, "published identity commitment");

        Ok(index)
    }

    /// Get a snapshot of the current membership set.
    pub fn snapshot(&self) -> Result<MembershipSnapshot, LedgerError> {
        let snapshot = self.ledger.snapshot()?;
        debug!(members = snapshot.len(), "took membership snapshot");

        Ok(snapshot)
    }

    /// Get the number of published members.
    pub fn len(&self) -> Result<usize, LedgerError> {
        self.ledger.member_count()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use curve25519_dalek::RistrettoPoint;
    use rand_chacha::ChaCha12Rng;
    use rand_core::SeedableRng;

    use super::{MembershipRegistry, MembershipSnapshot};
    use crate::{
        identity::Commitment,
        ledger::{LedgerError, MemoryLedger},
    };

    // Helper function to generate random commitments
    fn random_commitments(size: usize) -> Vec<Commitment> {
        let mut rng = ChaCha12Rng::seed_from_u64(8675309);

        (0..size)
            .map(|_| Commitment::from_point(&RistrettoPoint::random(&mut rng)))
            .collect::<Vec<Commitment>>()
    }

    #[test]
    fn test_snapshot_hash() {
        let commitments = random_commitments(4);

        let snapshot = MembershipSnapshot::new(&commitments);
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.position(&commitments[2]), Some(2));
        assert_eq!(snapshot, MembershipSnapshot::new(&commitments));

        // Order and size both matter
        let mut reversed = commitments.clone();
        reversed.reverse();
        assert_ne!(snapshot.get_hash(), MembershipSnapshot::new(&reversed).get_hash());
        assert_ne!(snapshot.get_hash(), MembershipSnapshot::new(&commitments[..3]).get_hash());
        assert!(MembershipSnapshot::new(&[]).is_empty());

        // Earlier views are prefixes; reordered or truncated-elsewhere views are not
        assert!(MembershipSnapshot::new(&commitments[..2]).is_prefix_of(&snapshot));
        assert!(snapshot.is_prefix_of(&snapshot));
        assert!(!MembershipSnapshot::new(&commitments[1..]).is_prefix_of(&snapshot));
        assert!(!MembershipSnapshot::new(&reversed).is_prefix_of(&snapshot));
        assert!(!snapshot.is_prefix_of(&MembershipSnapshot::new(&commitments[..3])));
    }

    #[test]
    fn test_publish() {
        let registry = MembershipRegistry::new(Arc::new(MemoryLedger::new()));
        let commitments = random_commitments(3);

        for (i, commitment) in commitments.iter().enumerate() {
            assert_eq!(registry.publish(commitment).unwrap(), i as u64);
        }
        assert!(matches!(
            registry.publish(&commitments[1]),
            Err(LedgerError::DuplicateCommitment)
        ));

        // Older snapshots are unaffected by later publication
        let before = registry.snapshot().unwrap();
        let extra = Commitment::from_point(&RistrettoPoint::random(&mut ChaCha12Rng::seed_from_u64(1)));
        registry.publish(&extra).unwrap();
        assert_eq!(before.len(), 3);
        assert_eq!(registry.len().unwrap(), 4);
        assert!(registry.snapshot().unwrap().contains(&extra));
    }
}
