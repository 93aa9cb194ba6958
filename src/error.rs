// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use snafu::prelude::*;

use crate::{
    config::ConfigError,
    identity::IdentityError,
    ledger::LedgerError,
    topic::{Tag, TopicError},
};

/// Errors returned by the caller-facing [`Protocol`](`crate::protocol::Protocol`) operations.
///
/// No error leaves the protocol in a partially updated state. Messages are safe to show to members: in particular,
/// [`SignalingError::DuplicateSignal`] never says which earlier signal collided.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SignalingError {
    /// The identity commitment was already published.
    #[snafu(display("This identity is already registered"))]
    DuplicateIdentity,
    /// An open topic already uses the name.
    #[snafu(display("An open topic named `{name}` already exists"))]
    NameConflict {
        /// The conflicting name.
        name: String,
    },
    /// No topic has the name or tag.
    #[snafu(display("No topic named `{name}` exists"))]
    UnknownTopic {
        /// The requested name.
        name: String,
    },
    /// The topic was already closed.
    #[snafu(display("The topic named `{name}` is already closed"))]
    AlreadyClosed {
        /// The requested name.
        name: String,
    },
    /// The topic no longer accepts signals.
    #[snafu(display("This topic is closed"))]
    TopicClosed {
        /// The tag of the closed topic.
        tag: Tag,
    },
    /// The identity is not in the membership set.
    #[snafu(display("Registration required"))]
    NotAMember,
    /// The proof service failed or timed out.
    #[snafu(display("Proof generation failed: {reason}"))]
    ProofGenerationFailed {
        /// The reason proof generation failed.
        reason: String,
    },
    /// The proof did not verify.
    #[snafu(display("The signal proof is invalid"))]
    InvalidProof,
    /// A signal with the same nullifier was already accepted on the topic.
    #[snafu(display("You already signaled on this topic"))]
    DuplicateSignal,
    /// The topic must be closed before it can be tallied.
    #[snafu(display("The topic named `{name}` is still open"))]
    TopicStillOpen {
        /// The requested name.
        name: String,
    },
    /// The topic name was empty.
    #[snafu(display("Topic names must not be empty"))]
    InvalidTopicName,
    /// Every tag has been allocated.
    #[snafu(display("No more topics can be opened"))]
    TagSpaceExhausted,
    /// The random number generator failed.
    #[snafu(display("The random number generator failed"))]
    RandomnessFailure {
        /// The identity error.
        source: IdentityError,
    },
    /// The ledger could not be used.
    #[snafu(display("The ledger is unavailable: {reason}"))]
    LedgerUnavailable {
        /// The reason the ledger is unavailable.
        reason: String,
    },
    /// The protocol could not be set up or reached an inconsistent state.
    #[snafu(display("Internal error: {reason}"))]
    Internal {
        /// The reason for the error.
        reason: String,
    },
}

impl SignalingError {
    /// Check if repeating the same call may succeed.
    ///
    /// Only transient failures qualify. Every other rejection is permanent for the given inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SignalingError::ProofGenerationFailed { .. } | SignalingError::LedgerUnavailable { .. }
        )
    }
}

impl From<LedgerError> for SignalingError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::DuplicateCommitment => SignalingError::DuplicateIdentity,
            LedgerError::DuplicateNullifier => SignalingError::DuplicateSignal,
            LedgerError::Sealed { tag } => SignalingError::TopicClosed { tag },
            LedgerError::UnknownTag { tag } => SignalingError::UnknownTopic {
                name: format!("#{tag}"),
            },
            LedgerError::DuplicateTag { tag } => SignalingError::Internal {
                reason: format!("tag {tag} was already opened on the ledger"),
            },
            LedgerError::Unavailable { reason } => SignalingError::LedgerUnavailable { reason },
        }
    }
}

impl From<TopicError> for SignalingError {
    fn from(error: TopicError) -> Self {
        match error {
            TopicError::InvalidName => SignalingError::InvalidTopicName,
            TopicError::NameConflict { name } => SignalingError::NameConflict { name },
            TopicError::UnknownTopic { name } => SignalingError::UnknownTopic { name },
            TopicError::AlreadyClosed { name } => SignalingError::AlreadyClosed { name },
            TopicError::TagSpaceExhausted => SignalingError::TagSpaceExhausted,
            TopicError::Ledger { source } => source.into(),
            TopicError::Poisoned => SignalingError::Internal {
                reason: "the topic registry lock was poisoned".to_owned(),
            },
        }
    }
}

impl From<ConfigError> for SignalingError {
    fn from(error: ConfigError) -> Self {
        SignalingError::Internal {
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::SignalingError;
    use crate::{
        ledger::LedgerError,
        topic::{Tag, TopicError},
    };

    #[test]
    fn test_retryable() {
        assert!(SignalingError::ProofGenerationFailed {
            reason: "timed out".to_owned()
        }
        .is_retryable());
        assert!(SignalingError::from(LedgerError::Unavailable {
            reason: "offline".to_owned()
        })
        .is_retryable());
        assert!(!SignalingError::DuplicateSignal.is_retryable());
        assert!(!SignalingError::NotAMember.is_retryable());
    }

    #[test]
    fn test_conversions() {
        assert!(matches!(
            SignalingError::from(LedgerError::DuplicateNullifier),
            SignalingError::DuplicateSignal
        ));
        assert!(matches!(
            SignalingError::from(LedgerError::Sealed { tag: Tag::new(1) }),
            SignalingError::TopicClosed { .. }
        ));
        assert!(matches!(
            SignalingError::from(TopicError::Ledger {
                source: LedgerError::DuplicateCommitment
            }),
            SignalingError::DuplicateIdentity
        ));
    }

    #[test]
    fn test_messages_preserve_anonymity() {
        assert_eq!(
            SignalingError::DuplicateSignal.to_string(),
            "You already signaled on this topic"
        );
        assert_eq!(SignalingError::NotAMember.to_string(), "Registration required");
    }
}
