// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use core::fmt;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::ledger::LedgerError;

/// A per-topic tag, sometimes called an external nullifier.
///
/// Tags scope nullifiers to a single topic. They are allocated by a [`TopicRegistry`] from a strictly increasing
/// sequence and are never reused.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Tag(u64);

impl Tag {
    /// Wrap a raw tag value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw tag value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The lifecycle state of a [`Topic`].
///
/// The only transition is `Open -> Closed`, and it is terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum TopicState {
    /// The topic accepts signals.
    Open,
    /// The topic accepts no further signals and can be tallied.
    Closed,
}

/// A named topic bound to a unique [`Tag`].
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Topic {
    name: String,
    tag: Tag,
    state: TopicState,
    created_seq: u64,
}

impl Topic {
    /// Get the name of this [`Topic`].
    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Get the tag of this [`Topic`].
    pub fn get_tag(&self) -> Tag {
        self.tag
    }

    /// Get the state of this [`Topic`].
    pub fn get_state(&self) -> TopicState {
        self.state
    }

    /// Get the creation sequence number of this [`Topic`].
    ///
    /// Topics are numbered from zero in the order they were opened.
    pub fn get_created_seq(&self) -> u64 {
        self.created_seq
    }

    /// Check if this [`Topic`] accepts signals.
    pub fn is_open(&self) -> bool {
        self.state == TopicState::Open
    }
}

/// Errors that can arise relating to [`TopicRegistry`].
#[derive(Debug, Snafu)]
pub enum TopicError {
    /// The topic name was empty.
    #[snafu(display("Topic names must not be empty"))]
    InvalidName,
    /// An open topic already uses the name.
    #[snafu(display("An open topic named `{name}` already exists"))]
    NameConflict {
        /// The conflicting name.
        name: String,
    },
    /// No topic has the name.
    #[snafu(display("No topic named `{name}` exists"))]
    UnknownTopic {
        /// The requested name.
        name: String,
    },
    /// The topic is already closed.
    #[snafu(display("The topic named `{name}` is already closed"))]
    AlreadyClosed {
        /// The requested name.
        name: String,
    },
    /// Every tag has been allocated.
    #[snafu(display("The tag sequence is exhausted"))]
    TagSpaceExhausted,
    /// The ledger rejected the transition, so the registry is unchanged.
    #[snafu(display("The ledger rejected the topic transition: {source}"))]
    Ledger {
        /// The ledger error.
        source: LedgerError,
    },
    /// The registry lock was poisoned by a panicking thread.
    #[snafu(display("The topic registry is unavailable"))]
    Poisoned,
}

// Mutable registry state, guarded by a single lock
#[derive(Debug)]
struct TopicTable {
    next_tag: Option<u64>,
    next_seq: u64,
    // Most recent tag for each name, open or closed
    latest: HashMap<String, Tag>,
    topics: BTreeMap<Tag, Topic>,
}

/// The registry of topics and their tags.
///
/// The registry owns the tag sequence, which is seeded once at construction and never reset. Opening and closing are
/// check-then-act operations performed under the registry lock; reads return cloned [`Topic`] records.
#[derive(Debug)]
pub struct TopicRegistry {
    table: Mutex<TopicTable>,
}

impl TopicRegistry {
    /// Generate a new empty [`TopicRegistry`] whose first tag is `first_tag`.
    pub fn new(first_tag: u64) -> Self {
        Self {
            table: Mutex::new(TopicTable {
                next_tag: Some(first_tag),
                next_seq: 0,
                latest: HashMap::new(),
                topics: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, TopicTable>, TopicError> {
        self.table.lock().map_err(|_| TopicError::Poisoned)
    }

    /// Open a new topic named `name`.
    ///
    /// The topic receives the next tag in the sequence. If an open topic already uses the name, returns
    /// [`TopicError::NameConflict`]; names of closed topics may be reused, and always receive a fresh tag.
    pub fn open_topic(&self, name: &str) -> Result<Topic, TopicError> {
        self.open_topic_with(name, |_| Ok(()))
    }

    /// Open a new topic named `name`, running `activate` with the new tag before the topic becomes visible.
    ///
    /// If `activate` fails, the registry is left unchanged and the tag is not consumed.
    pub fn open_topic_with<F>(&self, name: &str, activate: F) -> Result<Topic, TopicError>
    where
        F: FnOnce(Tag) -> Result<(), LedgerError>,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(TopicError::InvalidName);
        }

        let mut table = self.lock()?;

        if let Some(tag) = table.latest.get(name) {
            if table.topics.get(tag).is_some_and(Topic::is_open) {
                return Err(TopicError::NameConflict { name: name.to_owned() });
            }
        }

        let tag = Tag(table.next_tag.ok_or(TopicError::TagSpaceExhausted)?);
        activate(tag).context(LedgerSnafu)?;

        let topic = Topic {
            name: name.to_owned(),
            tag,
            state: TopicState::Open,
            created_seq: table.next_seq,
        };
        table.next_tag = tag.value().checked_add(1);
        table.next_seq += 1;
        table.latest.insert(topic.name.clone(), tag);
        table.topics.insert(tag, topic.clone());

        Ok(topic)
    }

    /// Close the open topic named `name`.
    ///
    /// Returns [`TopicError::UnknownTopic`] if no topic has the name, and [`TopicError::AlreadyClosed`] if the most
    /// recent topic with the name is not open.
    pub fn close_topic(&self, name: &str) -> Result<Topic, TopicError> {
        self.close_topic_with(name, |_| Ok(()))
    }

    /// Close the open topic named `name`, running `seal` with its tag before the state changes.
    ///
    /// If `seal` fails, the topic stays open.
    pub fn close_topic_with<F>(&self, name: &str, seal: F) -> Result<Topic, TopicError>
    where
        F: FnOnce(Tag) -> Result<(), LedgerError>,
    {
        let name = name.trim();
        let mut table = self.lock()?;

        let tag = *table
            .latest
            .get(name)
            .ok_or_else(|| TopicError::UnknownTopic { name: name.to_owned() })?;
        let topic = table
            .topics
            .get_mut(&tag)
            .ok_or_else(|| TopicError::UnknownTopic { name: name.to_owned() })?;
        if !topic.is_open() {
            return Err(TopicError::AlreadyClosed { name: name.to_owned() });
        }

        seal(tag).context(LedgerSnafu)?;
        topic.state = TopicState::Closed;

        Ok(topic.clone())
    }

    /// Get the most recent topic named `name`, whether open or closed.
    pub fn lookup(&self, name: &str) -> Result<Topic, TopicError> {
        let name = name.trim();
        let table = self.lock()?;

        table
            .latest
            .get(name)
            .and_then(|tag| table.topics.get(tag))
            .cloned()
            .ok_or_else(|| TopicError::UnknownTopic { name: name.to_owned() })
    }

    /// Get the topic with tag `tag`, if any.
    pub fn get(&self, tag: Tag) -> Result<Option<Topic>, TopicError> {
        Ok(self.lock()?.topics.get(&tag).cloned())
    }

    /// Get all open topics, in the order they were opened.
    pub fn active_topics(&self) -> Result<Vec<Topic>, TopicError> {
        // Tags increase with creation order, so the map order is creation order
        Ok(self.lock()?.topics.values().filter(|topic| topic.is_open()).cloned().collect())
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::{Tag, TopicError, TopicRegistry, TopicState};
    use crate::ledger::LedgerError;

    fn refusal(_: Tag) -> Result<(), LedgerError> {
        Err(LedgerError::Unavailable {
            reason: "refused".to_owned(),
        })
    }

    #[test]
    fn test_lifecycle() {
        let registry = TopicRegistry::new(1111);

        let topic = registry.open_topic("upgrade").unwrap();
        assert_eq!(topic.get_tag(), Tag::new(1111));
        assert_eq!(topic.get_state(), TopicState::Open);
        assert_eq!(topic.get_created_seq(), 0);

        // The name is taken while the topic is open
        assert!(matches!(
            registry.open_topic("upgrade"),
            Err(TopicError::NameConflict { .. })
        ));

        let closed = registry.close_topic("upgrade").unwrap();
        assert_eq!(closed.get_tag(), topic.get_tag());
        assert_eq!(closed.get_state(), TopicState::Closed);
        assert!(matches!(
            registry.close_topic("upgrade"),
            Err(TopicError::AlreadyClosed { .. })
        ));
        assert!(matches!(
            registry.close_topic("downgrade"),
            Err(TopicError::UnknownTopic { .. })
        ));

        // Reopening the name allocates a fresh tag
        let reopened = registry.open_topic("upgrade").unwrap();
        assert_eq!(reopened.get_tag(), Tag::new(1112));
        assert_eq!(reopened.get_created_seq(), 1);
        assert_eq!(registry.lookup("upgrade").unwrap(), reopened);
        assert_eq!(registry.get(Tag::new(1111)).unwrap().unwrap(), closed);
    }

    #[test]
    fn test_invalid_names() {
        let registry = TopicRegistry::new(0);

        assert!(matches!(registry.open_topic(""), Err(TopicError::InvalidName)));
        assert!(matches!(registry.open_topic("  "), Err(TopicError::InvalidName)));

        // Surrounding whitespace is not part of the name
        registry.open_topic(" budget ").unwrap();
        assert!(registry.lookup("budget").is_ok());
    }

    #[test]
    fn test_tags_distinct() {
        let registry = TopicRegistry::new(0);
        let mut tags = HashSet::new();

        for round in 0..10 {
            for name in ["a", "b", "c"] {
                let topic = registry.open_topic(name).unwrap();
                assert!(tags.insert(topic.get_tag()));
                if round % 2 == 0 || name != "c" {
                    registry.close_topic(name).unwrap();
                }
            }
            // Keep `c` open on odd rounds, then close it
            if round % 2 == 1 {
                registry.close_topic("c").unwrap();
            }
        }
        assert_eq!(tags.len(), 30);
    }

    #[test]
    fn test_tag_space_exhausted() {
        let registry = TopicRegistry::new(u64::MAX);

        assert_eq!(registry.open_topic("last").unwrap().get_tag(), Tag::new(u64::MAX));
        assert!(matches!(
            registry.open_topic("overflow"),
            Err(TopicError::TagSpaceExhausted)
        ));
    }

    #[test]
    fn test_rejected_transitions() {
        let registry = TopicRegistry::new(5);

        // A rejected open consumes no tag
        assert!(matches!(
            registry.open_topic_with("vote", refusal),
            Err(TopicError::Ledger { .. })
        ));
        assert!(registry.lookup("vote").is_err());
        assert_eq!(registry.open_topic("vote").unwrap().get_tag(), Tag::new(5));

        // A rejected close leaves the topic open
        assert!(matches!(
            registry.close_topic_with("vote", refusal),
            Err(TopicError::Ledger { .. })
        ));
        assert!(registry.lookup("vote").unwrap().is_open());
        assert_eq!(registry.active_topics().unwrap().len(), 1);
    }
}
