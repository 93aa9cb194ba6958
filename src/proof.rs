// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use curve25519_dalek::{
    ristretto::CompressedRistretto,
    traits::{Identity, MultiscalarMul, VartimeMultiscalarMul},
    RistrettoPoint,
    Scalar,
};
use rand_core::CryptoRngCore;
use snafu::prelude::*;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::{signal::NullifierHash, statement::SignalStatement, transcript::ProofTranscript, Transcript};

// Size of serialized proof elements in bytes
const SERIALIZED_BYTES: usize = 32;

/// A signal proof.
///
/// This is a linkable ring signature over the commitments of a [`SignalStatement`]. It shows that the signer knows the
/// secret behind one of the commitments without revealing which, and it carries the nullifier point `J = r*H`, where
/// `r` is the secret and `H` is the per-topic generator. Two valid proofs on the same topic with the same `J` were
/// produced by the same secret.
#[allow(non_snake_case)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignalProof {
    J: RistrettoPoint,
    c0: Scalar,
    s: Vec<Scalar>,
}

/// Errors that can arise relating to [`SignalProof`].
#[derive(Debug, Snafu)]
pub enum ProofError {
    /// An invalid parameter was provided.
    #[snafu(display("An invalid parameter was provided: {reason}"))]
    InvalidParameter {
        /// The reason for the parameter error.
        reason: &'static str,
    },
    /// A transcript challenge was invalid.
    #[snafu(display("A transcript challenge was invalid"))]
    InvalidChallenge,
    /// Proof deserialization failed.
    #[snafu(display("Proof deserialization failed"))]
    FailedDeserialization,
    /// Proof verification failed.
    #[snafu(display("Proof verification failed"))]
    FailedVerification,
}

impl SignalProof {
    /// Generate a [`SignalProof`].
    ///
    /// You must provide the signing `secret`, the index `l` of its commitment in the statement's ring, a
    /// [`SignalStatement`], a [`CryptoRngCore`] random number generator `rng`, and a [`Transcript`] `transcript`.
    ///
    /// The commitment at index `l` must be `secret*G`; otherwise, returns a [`ProofError`].
    #[allow(non_snake_case)]
    pub fn prove_with_rng<R: CryptoRngCore>(
        secret: &Scalar,
        l: usize,
        statement: &SignalStatement,
        rng: &mut R,
        transcript: &mut Transcript,
    ) -> Result<Self, ProofError> {
        let params = statement.get_params();
        let G = params.get_G();
        let H = statement.get_H();
        let M = statement.get_keys();
        let N = M.len();

        // Check the witness against the statement
        if secret == &Scalar::ZERO {
            return Err(ProofError::InvalidParameter { reason: "`r == 0`" });
        }
        let signer = M.get(l).ok_or(ProofError::InvalidParameter { reason: "`l >= N`" })?;
        if signer != &(secret * G) {
            return Err(ProofError::InvalidParameter {
                reason: "`M[l] != r*G`",
            });
        }

        // Compute the nullifier point and set up the transcript
        let J = secret * H;
        let proof_transcript = ProofTranscript::new(transcript, statement, &J);
        let mut transcript_rng = proof_transcript.build_rng(secret, l, rng);

        // Start the ring at the signer
        let mut c = vec![Scalar::ZERO; N];
        let mut s = vec![Scalar::ZERO; N];
        let alpha = Zeroizing::new(Scalar::random(&mut transcript_rng));
        c[(l + 1) % N] = proof_transcript.challenge(&(*alpha * G), &(*alpha * H));

        // Walk the rest of the ring with random responses
        for offset in 1..N {
            let i = (l + offset) % N;
            s[i] = Scalar::random(&mut transcript_rng);

            let L = RistrettoPoint::multiscalar_mul([s[i], c[i]], [*G, M[i]]);
            let R = RistrettoPoint::multiscalar_mul([s[i], c[i]], [*H, J]);
            c[(i + 1) % N] = proof_transcript.challenge(&L, &R);
        }

        // Close the ring
        if c[l] == Scalar::ZERO {
            return Err(ProofError::InvalidChallenge);
        }
        s[l] = *alpha - c[l] * secret;

        Ok(Self { J, c0: c[0], s })
    }

    /// Verify a [`SignalProof`].
    ///
    /// You must provide a [`SignalStatement`] and the same [`Transcript`] state that was used for proving.
    /// If verification fails, returns a [`ProofError`].
    #[allow(non_snake_case)]
    pub fn verify(&self, statement: &SignalStatement, transcript: &mut Transcript) -> Result<(), ProofError> {
        let G = statement.get_params().get_G();
        let H = statement.get_H();
        let M = statement.get_keys();

        if self.s.len() != M.len() {
            return Err(ProofError::InvalidParameter {
                reason: "proof size does not match the ring",
            });
        }
        if self.J == RistrettoPoint::identity() {
            return Err(ProofError::InvalidParameter {
                reason: "`J` was the identity point",
            });
        }

        let proof_transcript = ProofTranscript::new(transcript, statement, &self.J);

        // Recompute every challenge around the ring
        let mut c = self.c0;
        for (M_i, s_i) in M.iter().zip(self.s.iter()) {
            let L = RistrettoPoint::vartime_multiscalar_mul([s_i, &c], [G, M_i]);
            let R = RistrettoPoint::vartime_multiscalar_mul([s_i, &c], [H, &self.J]);
            c = proof_transcript.challenge(&L, &R);
        }

        // The ring must close on the initial challenge
        if bool::from(c.ct_eq(&self.c0)) {
            Ok(())
        } else {
            Err(ProofError::FailedVerification)
        }
    }

    /// Get the nullifier hash carried by this [`SignalProof`].
    pub fn get_nullifier_hash(&self) -> NullifierHash {
        NullifierHash::from_bytes(self.J.compress().to_bytes())
    }

    /// Serialize a [`SignalProof`] to a canonical byte vector.
    ///
    /// The encoding is `J || c0 || s[0] || ... || s[N-1]`, with each element taking 32 bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(SERIALIZED_BYTES * (self.s.len() + 2));
        result.extend_from_slice(self.J.compress().as_bytes());
        result.extend_from_slice(self.c0.as_bytes());
        for s in &self.s {
            result.extend_from_slice(s.as_bytes());
        }

        result
    }

    /// Deserialize a [`SignalProof`] from a canonical byte slice.
    ///
    /// If `bytes` does not represent a canonical encoding of a proof with at least one response, returns a
    /// [`ProofError`].
    #[allow(non_snake_case)]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofError> {
        if bytes.len() < 3 * SERIALIZED_BYTES || bytes.len() % SERIALIZED_BYTES != 0 {
            return Err(ProofError::FailedDeserialization);
        }

        let mut chunks = bytes.chunks_exact(SERIALIZED_BYTES);
        let J = chunks
            .next()
            .and_then(|chunk| CompressedRistretto::from_slice(chunk).ok())
            .and_then(|point| point.decompress())
            .ok_or(ProofError::FailedDeserialization)?;
        let c0 = chunks
            .next()
            .and_then(read_scalar)
            .ok_or(ProofError::FailedDeserialization)?;
        let s = chunks
            .map(read_scalar)
            .collect::<Option<Vec<Scalar>>>()
            .ok_or(ProofError::FailedDeserialization)?;

        Ok(Self { J, c0, s })
    }
}

// Decode a canonical scalar from a 32-byte chunk
fn read_scalar(chunk: &[u8]) -> Option<Scalar> {
    let bytes: [u8; SERIALIZED_BYTES] = chunk.try_into().ok()?;
    Option::from(Scalar::from_canonical_bytes(bytes))
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use curve25519_dalek::{RistrettoPoint, Scalar};
    use rand_chacha::ChaCha12Rng;
    use rand_core::{CryptoRngCore, SeedableRng};

    use super::{ProofError, SignalProof};
    use crate::{
        identity::Commitment,
        membership::MembershipSnapshot,
        parameters::Parameters,
        statement::SignalStatement,
        topic::Tag,
        Transcript,
    };

    // Generate a ring of random commitments with ours at index `l`
    fn generate_data<R: CryptoRngCore>(
        size: usize,
        l: usize,
        tag: Tag,
        message: &[u8],
        rng: &mut R,
    ) -> (Scalar, SignalStatement) {
        let params = Arc::new(Parameters::new());
        let secret = Scalar::random(rng);

        let commitments = (0..size)
            .map(|i| {
                if i == l {
                    Commitment::from_point(&(secret * params.get_G()))
                } else {
                    Commitment::from_point(&RistrettoPoint::random(rng))
                }
            })
            .collect::<Vec<Commitment>>();
        let snapshot = MembershipSnapshot::new(&commitments);
        let statement = SignalStatement::new(&params, &snapshot, tag, message).unwrap();

        (secret, statement)
    }

    #[test]
    fn test_prove_verify() {
        let mut rng = ChaCha12Rng::seed_from_u64(8675309);

        // Exercise single-member rings and every signer position
        for size in [1, 2, 5] {
            for l in 0..size {
                let (secret, statement) = generate_data(size, l, Tag::new(1111), b"yes", &mut rng);
                let transcript = Transcript::new(b"Test transcript");

                let proof = SignalProof::prove_with_rng(&secret, l, &statement, &mut rng, &mut transcript.clone()).unwrap();
                assert!(proof.verify(&statement, &mut transcript.clone()).is_ok());
            }
        }
    }

    #[test]
    fn test_nullifier_linking() {
        let mut rng = ChaCha12Rng::seed_from_u64(8675309);
        let (secret, statement) = generate_data(4, 2, Tag::new(1), b"yes", &mut rng);
        let transcript = Transcript::new(b"Test transcript");

        // The same secret and tag give the same nullifier, even with a different vote
        let first = SignalProof::prove_with_rng(&secret, 2, &statement, &mut rng, &mut transcript.clone()).unwrap();
        let other_vote = SignalStatement::new(
            statement.get_params(),
            statement.get_snapshot(),
            statement.get_tag(),
            b"no",
        )
        .unwrap();
        let second = SignalProof::prove_with_rng(&secret, 2, &other_vote, &mut rng, &mut transcript.clone()).unwrap();
        assert_eq!(first.get_nullifier_hash(), second.get_nullifier_hash());
        assert_ne!(first, second);

        // A different tag gives a different nullifier
        let other_tag = SignalStatement::new(
            statement.get_params(),
            statement.get_snapshot(),
            Tag::new(2),
            b"yes",
        )
        .unwrap();
        let third = SignalProof::prove_with_rng(&secret, 2, &other_tag, &mut rng, &mut transcript.clone()).unwrap();
        assert_ne!(first.get_nullifier_hash(), third.get_nullifier_hash());
    }

    #[test]
    fn test_evil_statements() {
        let mut rng = ChaCha12Rng::seed_from_u64(8675309);
        let (secret, statement) = generate_data(4, 1, Tag::new(1), b"yes", &mut rng);
        let transcript = Transcript::new(b"Test transcript");
        let proof = SignalProof::prove_with_rng(&secret, 1, &statement, &mut rng, &mut transcript.clone()).unwrap();

        // Different vote
        let evil = SignalStatement::new(
            statement.get_params(),
            statement.get_snapshot(),
            statement.get_tag(),
            b"no",
        )
        .unwrap();
        assert!(proof.verify(&evil, &mut transcript.clone()).is_err());

        // Different tag
        let evil = SignalStatement::new(statement.get_params(), statement.get_snapshot(), Tag::new(2), b"yes").unwrap();
        assert!(proof.verify(&evil, &mut transcript.clone()).is_err());

        // Different ring
        let mut commitments = statement.get_snapshot().get_commitments().to_vec();
        commitments.push(Commitment::from_point(&RistrettoPoint::random(&mut rng)));
        let evil = SignalStatement::new(
            statement.get_params(),
            &MembershipSnapshot::new(&commitments),
            statement.get_tag(),
            b"yes",
        )
        .unwrap();
        assert!(proof.verify(&evil, &mut transcript.clone()).is_err());

        // Different transcript
        assert!(proof
            .verify(&statement, &mut Transcript::new(b"Evil transcript"))
            .is_err());
    }

    #[test]
    fn test_evil_witness() {
        let mut rng = ChaCha12Rng::seed_from_u64(8675309);
        let (secret, statement) = generate_data(4, 1, Tag::new(1), b"yes", &mut rng);
        let transcript = Transcript::new(b"Test transcript");

        // Wrong index
        assert!(matches!(
            SignalProof::prove_with_rng(&secret, 2, &statement, &mut rng, &mut transcript.clone()),
            Err(ProofError::InvalidParameter { .. })
        ));

        // Out of range index
        assert!(SignalProof::prove_with_rng(&secret, 4, &statement, &mut rng, &mut transcript.clone()).is_err());

        // Wrong secret
        let evil = Scalar::random(&mut rng);
        assert!(SignalProof::prove_with_rng(&evil, 1, &statement, &mut rng, &mut transcript.clone()).is_err());
    }

    #[test]
    fn test_serialization() {
        let mut rng = ChaCha12Rng::seed_from_u64(8675309);
        let (secret, statement) = generate_data(3, 0, Tag::new(1), b"yes", &mut rng);
        let transcript = Transcript::new(b"Test transcript");
        let proof = SignalProof::prove_with_rng(&secret, 0, &statement, &mut rng, &mut transcript.clone()).unwrap();

        let bytes = proof.to_bytes();
        assert_eq!(bytes.len(), 32 * 5);
        let decoded = SignalProof::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, proof);
        assert!(decoded.verify(&statement, &mut transcript.clone()).is_ok());

        // Truncated or misaligned
        assert!(SignalProof::from_bytes(&bytes[..64]).is_err());
        assert!(SignalProof::from_bytes(&bytes[..bytes.len() - 1]).is_err());

        // Non-canonical scalar
        let mut evil = bytes.clone();
        evil[64..96].copy_from_slice(&[0xff; 32]);
        assert!(matches!(
            SignalProof::from_bytes(&evil),
            Err(ProofError::FailedDeserialization)
        ));

        // Invalid point
        let mut evil = bytes;
        evil[..32].copy_from_slice(&[0xff; 32]);
        assert!(SignalProof::from_bytes(&evil).is_err());
    }
}
