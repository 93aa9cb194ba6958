// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use curve25519_dalek::Scalar;
use rand_core::OsRng;
use snafu::prelude::*;

use crate::{
    config::ProtocolConfig,
    domains,
    identity::Commitment,
    membership::MembershipSnapshot,
    parameters::Parameters,
    proof::{ProofError, SignalProof},
    signal::{NullifierHash, Vote},
    statement::{SignalStatement, StatementError},
    topic::Tag,
    Transcript,
};

/// The public inputs a signal proof is checked against.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicSignals {
    snapshot: MembershipSnapshot,
    tag: Tag,
    vote: Vote,
    nullifier_hash: NullifierHash,
}

impl PublicSignals {
    /// Generate new [`PublicSignals`].
    pub fn new(snapshot: MembershipSnapshot, tag: Tag, vote: Vote, nullifier_hash: NullifierHash) -> Self {
        Self {
            snapshot,
            tag,
            vote,
            nullifier_hash,
        }
    }

    /// Get the membership snapshot the proof was generated against.
    pub fn get_snapshot(&self) -> &MembershipSnapshot {
        &self.snapshot
    }

    /// Get the root of the membership snapshot.
    pub fn get_root(&self) -> &[u8] {
        self.snapshot.get_hash()
    }

    /// Get the topic tag.
    pub fn get_tag(&self) -> Tag {
        self.tag
    }

    /// Get the vote.
    pub fn get_vote(&self) -> Vote {
        self.vote
    }

    /// Get the nullifier hash.
    pub fn get_nullifier_hash(&self) -> &NullifierHash {
        &self.nullifier_hash
    }
}

/// The output of [`ProofService::prove_signal`].
#[derive(Clone, Debug)]
pub struct ProvenSignal<P> {
    /// The proof object.
    pub proof: P,
    /// The nullifier hash for the secret and tag.
    pub nullifier_hash: NullifierHash,
    /// The public inputs the proof is checked against.
    pub public_signals: PublicSignals,
}

/// Errors that can arise relating to a [`ProofService`].
#[derive(Debug, Snafu)]
pub enum ServiceError {
    /// The witness does not match the statement.
    #[snafu(display("The witness is malformed: {reason}"))]
    MalformedWitness {
        /// The reason the witness was rejected.
        reason: &'static str,
    },
    /// The statement could not be built.
    #[snafu(display("The statement is invalid: {source}"))]
    Statement {
        /// The statement error.
        source: StatementError,
    },
    /// The prover failed.
    #[snafu(display("Proof generation failed: {source}"))]
    Proving {
        /// The proof error.
        source: ProofError,
    },
}

/// The external service that computes commitments, proofs, and verification.
///
/// The protocol core treats implementations as black boxes with these contracts:
/// - [`ProofService::derive_commitment`] is deterministic and one-way.
/// - [`ProofService::prove_signal`] returns a nullifier hash that depends only on the secret and the tag.
/// - [`ProofService::verify`] accepts exactly the proofs produced by a member of the snapshot for the given
///   public signals. The verification key is held by the implementation.
///
/// Proving may be slow; the core runs it on a worker pool, which is why implementations must be `Send + Sync`.
pub trait ProofService: Send + Sync {
    /// The proof object produced and checked by this service.
    type Proof: Clone + Send + 'static;

    /// Derive the public commitment for `secret`.
    fn derive_commitment(&self, secret: &Scalar) -> Commitment;

    /// Prove that the holder of `secret` is a member of `snapshot` and casts `vote` on the topic with tag `tag`.
    fn prove_signal(
        &self,
        secret: &Scalar,
        snapshot: &MembershipSnapshot,
        tag: Tag,
        vote: Vote,
    ) -> Result<ProvenSignal<Self::Proof>, ServiceError>;

    /// Check `proof` against `public_signals`.
    ///
    /// Returns `Ok(false)` for a well-formed request whose proof does not verify.
    fn verify(&self, proof: &Self::Proof, public_signals: &PublicSignals) -> Result<bool, ServiceError>;
}

/// A [`ProofService`] backed by [`SignalProof`] linkable ring signatures.
///
/// Commitments are `r*G` and nullifier hashes encode `r*H`, where `H` is derived from the topic tag. Every proof is
/// bound to the deployment context from [`ProtocolConfig`], so proofs from one deployment fail in another.
#[derive(Clone, Debug)]
pub struct RingProofService {
    params: Arc<Parameters>,
    context: String,
}

impl RingProofService {
    /// Generate a new [`RingProofService`] with default [`Parameters`] and the context from `config`.
    pub fn new(config: &ProtocolConfig) -> Self {
        Self::new_with_parameters(Arc::new(Parameters::new()), config)
    }

    /// Generate a new [`RingProofService`] with specific [`Parameters`].
    pub fn new_with_parameters(params: Arc<Parameters>, config: &ProtocolConfig) -> Self {
        Self {
            params,
            context: config.context.clone(),
        }
    }

    /// Get the [`Parameters`] used by this service.
    pub fn get_params(&self) -> &Arc<Parameters> {
        &self.params
    }

    // Every proof transcript starts from the deployment context
    fn transcript(&self) -> Transcript {
        let mut transcript = Transcript::new(domains::TRANSCRIPT_SIGNAL.as_bytes());
        transcript.append_message(b"context", self.context.as_bytes());

        transcript
    }
}

impl ProofService for RingProofService {
    type Proof = SignalProof;

    fn derive_commitment(&self, secret: &Scalar) -> Commitment {
        Commitment::from_point(&(secret * self.params.get_G()))
    }

    fn prove_signal(
        &self,
        secret: &Scalar,
        snapshot: &MembershipSnapshot,
        tag: Tag,
        vote: Vote,
    ) -> Result<ProvenSignal<SignalProof>, ServiceError> {
        let statement = SignalStatement::new(&self.params, snapshot, tag, vote.as_bytes()).context(StatementSnafu)?;
        let l = snapshot
            .position(&self.derive_commitment(secret))
            .ok_or(ServiceError::MalformedWitness {
                reason: "commitment is not in the snapshot",
            })?;

        let proof =
            SignalProof::prove_with_rng(secret, l, &statement, &mut OsRng, &mut self.transcript()).context(ProvingSnafu)?;
        let nullifier_hash = proof.get_nullifier_hash();

        Ok(ProvenSignal {
            proof,
            nullifier_hash,
            public_signals: PublicSignals::new(snapshot.clone(), tag, vote, nullifier_hash),
        })
    }

    fn verify(&self, proof: &SignalProof, public_signals: &PublicSignals) -> Result<bool, ServiceError> {
        if &proof.get_nullifier_hash() != public_signals.get_nullifier_hash() {
            return Ok(false);
        }

        let statement = SignalStatement::new(
            &self.params,
            public_signals.get_snapshot(),
            public_signals.get_tag(),
            public_signals.get_vote().as_bytes(),
        )
        .context(StatementSnafu)?;

        Ok(proof.verify(&statement, &mut self.transcript()).is_ok())
    }
}
