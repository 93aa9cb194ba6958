// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use curve25519_dalek::{traits::Identity, RistrettoPoint};
use snafu::prelude::*;

use crate::{domains, membership::MembershipSnapshot, parameters::Parameters, topic::Tag, Transcript};

/// A signal proof statement.
///
/// The statement consists of a [`MembershipSnapshot`] acting as the ring of commitments, the [`Tag`] of the topic,
/// and a message (the encoded vote) that is bound to any proof generated using the statement. It also contains
/// [`Parameters`] and the decoded ring, so proofs against the same statement need not decode it again.
#[allow(non_snake_case)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignalStatement {
    params: Arc<Parameters>,
    snapshot: MembershipSnapshot,
    M: Vec<RistrettoPoint>,
    tag: Tag,
    H: RistrettoPoint,
    message: Vec<u8>,
    hash: Vec<u8>,
}

/// Errors that can arise relating to [`SignalStatement`].
#[derive(Debug, Snafu)]
pub enum StatementError {
    /// An invalid parameter was provided.
    #[snafu(display("An invalid parameter was provided: {reason}"))]
    InvalidParameter {
        /// The reason for the parameter error.
        reason: &'static str,
    },
}

impl SignalStatement {
    // Domain separator used for hashing
    const DOMAIN: &'static str = "nullvote statement";
    // Version identifier used for hashing
    const VERSION: u64 = 0;

    /// Generate a new [`SignalStatement`].
    ///
    /// The snapshot must be nonempty, and every commitment in it must decode to a group element other than the
    /// identity. If either of these conditions is not met, returns a [`StatementError`].
    #[allow(non_snake_case)]
    pub fn new(
        params: &Arc<Parameters>,
        snapshot: &MembershipSnapshot,
        tag: Tag,
        message: &[u8],
    ) -> Result<Self, StatementError> {
        if snapshot.is_empty() {
            return Err(StatementError::InvalidParameter {
                reason: "membership snapshot was empty",
            });
        }

        // Decode the ring
        let M = snapshot
            .get_commitments()
            .iter()
            .map(|commitment| commitment.decompress())
            .collect::<Option<Vec<RistrettoPoint>>>()
            .ok_or(StatementError::InvalidParameter {
                reason: "membership snapshot contained an invalid commitment",
            })?;
        if M.contains(&RistrettoPoint::identity()) {
            return Err(StatementError::InvalidParameter {
                reason: "membership snapshot contained the identity point",
            });
        }

        // Use Merlin for the transcript hash
        let mut transcript = Transcript::new(Self::DOMAIN.as_bytes());
        transcript.append_u64(b"version", Self::VERSION);
        transcript.append_message(b"params", params.get_hash());
        transcript.append_message(b"snapshot", snapshot.get_hash());
        transcript.append_u64(b"tag", tag.value());
        transcript.append_message(b"message", message);
        let mut hash = vec![0u8; domains::TRANSCRIPT_HASH_BYTES];
        transcript.challenge_bytes(b"hash", &mut hash);

        Ok(Self {
            params: params.clone(),
            snapshot: snapshot.clone(),
            M,
            tag,
            H: params.tag_generator(tag),
            message: message.to_vec(),
            hash,
        })
    }

    /// Get the parameters for this [`SignalStatement`].
    pub fn get_params(&self) -> &Arc<Parameters> {
        &self.params
    }

    /// Get the membership snapshot for this [`SignalStatement`].
    pub fn get_snapshot(&self) -> &MembershipSnapshot {
        &self.snapshot
    }

    /// Get the decoded ring of commitments for this [`SignalStatement`].
    pub fn get_keys(&self) -> &[RistrettoPoint] {
        &self.M
    }

    /// Get the topic tag for this [`SignalStatement`].
    pub fn get_tag(&self) -> Tag {
        self.tag
    }

    /// Get the per-topic generator for this [`SignalStatement`].
    #[allow(non_snake_case)]
    pub fn get_H(&self) -> &RistrettoPoint {
        &self.H
    }

    /// Get the message for this [`SignalStatement`].
    pub fn get_message(&self) -> &[u8] {
        &self.message
    }

    /// Get a cryptographic hash representation of this [`SignalStatement`], suitable for transcripting.
    pub(crate) fn get_hash(&self) -> &[u8] {
        &self.hash
    }
}
