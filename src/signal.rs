// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use core::{fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::topic::Tag;

/// A vote carried by a signal.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Vote {
    /// In favor of the topic.
    Yes,
    /// Against the topic.
    No,
}

/// Errors that can arise relating to [`Vote`].
#[derive(Debug, Snafu)]
pub enum VoteError {
    /// The input was not a recognized vote.
    #[snafu(display("Votes must be `yes` or `no`, not `{input}`"))]
    Unrecognized {
        /// The rejected input.
        input: String,
    },
}

impl Vote {
    /// Get the canonical encoding of this [`Vote`], which is bound into proofs.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Vote::Yes => b"yes",
            Vote::No => b"no",
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::Yes => write!(f, "yes"),
            Vote::No => write!(f, "no"),
        }
    }
}

impl FromStr for Vote {
    type Err = VoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => Ok(Vote::Yes),
            "no" | "n" => Ok(Vote::No),
            _ => Err(VoteError::Unrecognized { input: s.to_owned() }),
        }
    }
}

/// A nullifier hash.
///
/// This is a deterministic function of an identity secret and a topic [`Tag`], computed by a
/// [`ProofService`](`crate::service::ProofService`). It is unique per identity and topic, but cannot be linked to the
/// identity that produced it.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct NullifierHash([u8; 32]);

impl NullifierHash {
    /// Wrap an encoded nullifier hash.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the encoded nullifier hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for NullifierHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NullifierHash(")?;
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

/// The record of an accepted signal.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct SignalRecord {
    tag: Tag,
    nullifier_hash: NullifierHash,
    payload: Vote,
}

impl SignalRecord {
    /// Generate a new [`SignalRecord`].
    pub fn new(tag: Tag, nullifier_hash: NullifierHash, payload: Vote) -> Self {
        Self {
            tag,
            nullifier_hash,
            payload,
        }
    }

    /// Get the tag of the topic this signal was cast on.
    pub fn get_tag(&self) -> Tag {
        self.tag
    }

    /// Get the nullifier hash of this signal.
    pub fn get_nullifier_hash(&self) -> &NullifierHash {
        &self.nullifier_hash
    }

    /// Get the vote carried by this signal.
    pub fn get_payload(&self) -> Vote {
        self.payload
    }
}

#[cfg(test)]
mod test {
    use super::Vote;

    #[test]
    fn test_parse_vote() {
        assert_eq!("yes".parse::<Vote>().unwrap(), Vote::Yes);
        assert_eq!(" NO ".parse::<Vote>().unwrap(), Vote::No);
        assert_eq!("y".parse::<Vote>().unwrap(), Vote::Yes);
        assert!("maybe".parse::<Vote>().is_err());
        assert!("".parse::<Vote>().is_err());

        // Display and parsing agree
        for vote in [Vote::Yes, Vote::No] {
            assert_eq!(vote.to_string().parse::<Vote>().unwrap(), vote);
            assert_eq!(vote.as_bytes(), vote.to_string().as_bytes());
        }
    }
}
