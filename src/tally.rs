// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use core::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::SignalingError,
    ledger::{LedgerError, MembershipLedger},
    signal::{SignalRecord, Vote},
    topic::{Tag, Topic},
};

/// The yes/no counts for a closed topic.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct TallyResult {
    tag: Tag,
    yes: u64,
    no: u64,
}

impl TallyResult {
    /// Get the topic tag.
    pub fn get_tag(&self) -> Tag {
        self.tag
    }

    /// Get the number of yes votes.
    pub fn get_yes(&self) -> u64 {
        self.yes
    }

    /// Get the number of no votes.
    pub fn get_no(&self) -> u64 {
        self.no
    }

    /// Get the number of votes.
    pub fn total(&self) -> u64 {
        self.yes + self.no
    }

    /// Check if the proposal passes.
    ///
    /// A proposal passes unless there are strictly more no votes than yes votes, so ties pass.
    pub fn passes(&self) -> bool {
        self.yes >= self.no
    }
}

impl fmt::Display for TallyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "yes: {}, no: {}", self.yes, self.no)
    }
}

/// Count the votes among `records` that belong to `tag`.
///
/// Records for other tags are ignored.
pub fn tally_records(tag: Tag, records: &[SignalRecord]) -> TallyResult {
    records
        .iter()
        .filter(|record| record.get_tag() == tag)
        .fold(TallyResult { tag, yes: 0, no: 0 }, |mut result, record| {
            match record.get_payload() {
                Vote::Yes => result.yes += 1,
                Vote::No => result.no += 1,
            }
            result
        })
}

/// Tallies closed topics from the signals recorded on a [`MembershipLedger`].
#[derive(Debug)]
pub struct TallyEngine<L> {
    ledger: Arc<L>,
}

impl<L: MembershipLedger> TallyEngine<L> {
    /// Generate a new [`TallyEngine`] over `ledger`.
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Tally the closed topic `topic`.
    ///
    /// Returns [`SignalingError::TopicStillOpen`] if the topic is open. Tallying reads the recorded signals only, so
    /// it can be repeated and always gives the same result.
    pub fn tally(&self, topic: &Topic) -> Result<TallyResult, SignalingError> {
        if topic.is_open() {
            return Err(SignalingError::TopicStillOpen {
                name: topic.get_name().to_owned(),
            });
        }

        let records = self.ledger.signals(topic.get_tag()).map_err(|error| match error {
            LedgerError::UnknownTag { .. } => SignalingError::UnknownTopic {
                name: topic.get_name().to_owned(),
            },
            error => error.into(),
        })?;
        let result = tally_records(topic.get_tag(), &records);
        info!(tag = %topic.get_tag(), yes = result.yes, no = result.no, "tallied topic");

        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{tally_records, TallyEngine};
    use crate::{
        error::SignalingError,
        ledger::{MembershipLedger, MemoryLedger},
        signal::{NullifierHash, SignalRecord, Vote},
        topic::{Tag, TopicRegistry},
    };

    fn record(tag: u64, seed: u8, vote: Vote) -> SignalRecord {
        SignalRecord::new(Tag::new(tag), NullifierHash::from_bytes([seed; 32]), vote)
    }

    #[test]
    fn test_tally_records() {
        let records = vec![
            record(1, 0, Vote::Yes),
            record(1, 1, Vote::No),
            record(1, 2, Vote::No),
            record(2, 3, Vote::Yes),
        ];

        let result = tally_records(Tag::new(1), &records);
        assert_eq!(result.get_yes(), 1);
        assert_eq!(result.get_no(), 2);
        assert_eq!(result.total(), 3);
        assert!(!result.passes());

        let result = tally_records(Tag::new(2), &records);
        assert!(result.passes());

        // An empty topic is a tie
        let result = tally_records(Tag::new(3), &records);
        assert_eq!(result.total(), 0);
        assert!(result.passes());
    }

    #[test]
    fn test_tally_engine() {
        let ledger = Arc::new(MemoryLedger::new());
        let registry = TopicRegistry::new(1111);
        let engine = TallyEngine::new(Arc::clone(&ledger));

        let topic = registry.open_topic_with("upgrade", |tag| ledger.open_tag(tag)).unwrap();
        ledger.record_signal(&record(1111, 0, Vote::Yes)).unwrap();
        ledger.record_signal(&record(1111, 1, Vote::No)).unwrap();

        assert!(matches!(
            engine.tally(&topic),
            Err(SignalingError::TopicStillOpen { .. })
        ));

        let topic = registry.close_topic_with("upgrade", |tag| ledger.seal(tag)).unwrap();
        let result = engine.tally(&topic).unwrap();
        assert_eq!((result.get_yes(), result.get_no()), (1, 1));
        assert!(result.passes());

        // Tallying is repeatable
        assert_eq!(engine.tally(&topic).unwrap(), result);
    }
}
