// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use blake3::Hasher;
use curve25519_dalek::{constants::RISTRETTO_BASEPOINT_POINT, traits::Identity, RistrettoPoint};
use snafu::prelude::*;

use crate::{domains, topic::Tag, Transcript};

/// Public parameters used for generating and verifying signal proofs.
///
/// Parameters consist of the group generator `G` used to define identity commitments. Per-topic generators used to
/// define nullifiers are derived from topic tags on demand. You can either use [`Parameters::new`] to have `G`
/// defined for you, or use [`Parameters::new_with_generator`] if your use case requires a specific value.
#[allow(non_snake_case)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Parameters {
    G: RistrettoPoint,
    hash: Vec<u8>,
}

/// Errors that can arise relating to [`Parameters`].
#[derive(Debug, Snafu)]
pub enum ParameterError {
    /// An invalid parameter was provided.
    #[snafu(display("An invalid parameter was provided: {reason}"))]
    InvalidParameter {
        /// The reason for the parameter error.
        reason: &'static str,
    },
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new()
    }
}

impl Parameters {
    // Domain separator used for hashing
    const DOMAIN: &'static str = "nullvote parameters";
    // Version identifier used for hashing
    const VERSION: u64 = 0;

    /// Generate new [`Parameters`] for signal proofs.
    ///
    /// This function uses the Ristretto base point for `G`.
    /// If your use case requires a specific generator, use [`Parameters::new_with_generator`] instead.
    pub fn new() -> Self {
        Self::build(RISTRETTO_BASEPOINT_POINT)
    }

    /// Generate new [`Parameters`] for signal proofs with a specific generator `G`.
    ///
    /// The generator must not be the identity element; otherwise, returns a [`ParameterError`].
    /// Its independence from the per-topic generators cannot be checked by this function.
    #[allow(non_snake_case)]
    pub fn new_with_generator(G: &RistrettoPoint) -> Result<Self, ParameterError> {
        if G == &RistrettoPoint::identity() {
            return Err(ParameterError::InvalidParameter {
                reason: "`G` was the identity point",
            });
        }

        Ok(Self::build(*G))
    }

    // Helper function to do the actual generation
    #[allow(non_snake_case)]
    fn build(G: RistrettoPoint) -> Self {
        // Use Merlin for the transcript hash
        let mut transcript = Transcript::new(Self::DOMAIN.as_bytes());
        transcript.append_u64(b"version", Self::VERSION);
        transcript.append_message(b"G", G.compress().as_bytes());
        let mut hash = vec![0u8; domains::TRANSCRIPT_HASH_BYTES];
        transcript.challenge_bytes(b"hash", &mut hash);

        Self { G, hash }
    }

    /// Get the group generator `G` from these [`Parameters`].
    ///
    /// This is the generator used for defining identity commitments.
    #[allow(non_snake_case)]
    pub fn get_G(&self) -> &RistrettoPoint {
        &self.G
    }

    /// Derive the per-topic generator for a [`Tag`].
    ///
    /// This is the generator used for defining nullifiers on the topic. Distinct tags yield independent generators,
    /// which is what scopes nullifiers to a single topic.
    pub fn tag_generator(&self, tag: Tag) -> RistrettoPoint {
        // Use `BLAKE3` to generate the tag generator
        let mut bytes = [0u8; 64];
        let mut hasher = Hasher::new();
        hasher.update(domains::POINT_TAG.as_bytes());
        hasher.update(&self.hash);
        hasher.update(&tag.value().to_le_bytes());
        hasher.finalize_xof().fill(&mut bytes);

        RistrettoPoint::from_uniform_bytes(&bytes)
    }

    /// Get a cryptographic hash representation of these [`Parameters`], suitable for transcripting.
    pub(crate) fn get_hash(&self) -> &[u8] {
        &self.hash
    }
}
