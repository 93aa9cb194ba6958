// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use curve25519_dalek::{RistrettoPoint, Scalar};
use merlin::TranscriptRng;
use rand_core::CryptoRngCore;

use crate::{domains, statement::SignalStatement, Transcript};

/// A signal proof transcript.
///
/// Every ring challenge is derived from a fork of the same base transcript, which binds the statement and the
/// nullifier point.
pub(crate) struct ProofTranscript {
    base: Transcript,
}

impl ProofTranscript {
    /// Initialize a transcript.
    #[allow(non_snake_case)]
    pub(crate) fn new(transcript: &mut Transcript, statement: &SignalStatement, J: &RistrettoPoint) -> Self {
        // Update the transcript
        transcript.append_message(b"dom-sep", domains::TRANSCRIPT_PROOF.as_bytes());
        transcript.append_u64(b"version", domains::VERSION);
        transcript.append_message(b"statement", statement.get_hash());
        transcript.append_message(b"J", J.compress().as_bytes());

        Self {
            base: transcript.clone(),
        }
    }

    /// Derive the ring challenge that follows the commitments `L` and `R`.
    #[allow(non_snake_case)]
    pub(crate) fn challenge(&self, L: &RistrettoPoint, R: &RistrettoPoint) -> Scalar {
        let mut transcript = self.base.clone();
        transcript.append_message(b"L", L.compress().as_bytes());
        transcript.append_message(b"R", R.compress().as_bytes());

        // Use wide reduction
        let mut c_bytes = [0u8; 64];
        transcript.challenge_bytes(b"c", &mut c_bytes);
        Scalar::from_bytes_mod_order_wide(&c_bytes)
    }

    /// Build a random number generator from the transcript, binding in witness data.
    pub(crate) fn build_rng<R: CryptoRngCore>(&self, secret: &Scalar, l: usize, external_rng: &mut R) -> TranscriptRng {
        self.base
            .build_rng()
            .rekey_with_witness_bytes(b"l", &(l as u64).to_le_bytes())
            .rekey_with_witness_bytes(b"r", secret.as_bytes())
            .finalize(external_rng)
    }
}
