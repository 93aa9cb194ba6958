// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use core::fmt;

use curve25519_dalek::{ristretto::CompressedRistretto, RistrettoPoint, Scalar};
use rand_core::CryptoRngCore;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::service::ProofService;

/// A public identity commitment.
///
/// This is the canonical 32-byte encoding of a group element derived one-way from an identity secret by a
/// [`ProofService`]. It reveals nothing about the secret.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Commitment([u8; 32]);

impl Commitment {
    /// Wrap an encoded commitment.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Encode a group element as a commitment.
    pub fn from_point(point: &RistrettoPoint) -> Self {
        Self(point.compress().to_bytes())
    }

    /// Get the encoded commitment.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Decode the commitment as a group element, if it is a valid encoding.
    pub fn decompress(&self) -> Option<RistrettoPoint> {
        CompressedRistretto(self.0).decompress()
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment(")?;
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

/// An anonymous group member identity.
///
/// The identity consists of a secret, which never leaves the owning process, and the public [`Commitment`] derived
/// from it. The secret is zeroized when the identity is dropped and is never printed.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Identity {
    secret: Scalar,
    #[zeroize(skip)]
    commitment: Commitment,
}

/// Errors that can arise relating to [`Identity`].
#[derive(Debug, Snafu)]
pub enum IdentityError {
    /// An invalid parameter was provided.
    #[snafu(display("An invalid parameter was provided: {reason}"))]
    InvalidParameter {
        /// The reason for the parameter error.
        reason: &'static str,
    },
    /// The random number generator failed.
    #[snafu(display("The random number generator failed"))]
    Randomness {
        /// The underlying generator error.
        source: rand_core::Error,
    },
}

impl Identity {
    /// Generate an [`Identity`] from an existing secret.
    ///
    /// The secret must be nonzero; otherwise, returns an [`IdentityError`]. The commitment is derived by `service`.
    ///
    /// If you'd like an [`Identity`] generated securely for you, use [`Identity::random`] instead.
    pub fn new<S: ProofService + ?Sized>(service: &S, secret: &Scalar) -> Result<Self, IdentityError> {
        if secret == &Scalar::ZERO {
            return Err(IdentityError::InvalidParameter { reason: "`secret == 0`" });
        }

        Ok(Self {
            secret: *secret,
            commitment: service.derive_commitment(secret),
        })
    }

    /// Generate a new random [`Identity`].
    ///
    /// The secret is sampled from the [`CryptoRngCore`] random number generator `rng` using wide reduction.
    /// If the generator fails, returns an [`IdentityError`].
    pub fn random<S: ProofService + ?Sized, R: CryptoRngCore>(service: &S, rng: &mut R) -> Result<Self, IdentityError> {
        let mut bytes = Zeroizing::new([0u8; 64]);
        rng.try_fill_bytes(&mut *bytes).context(RandomnessSnafu)?;
        let secret = Zeroizing::new(Scalar::from_bytes_mod_order_wide(&bytes));

        Self::new(service, &secret)
    }

    /// Get the secret for this [`Identity`].
    ///
    /// This must only be handed to a [`ProofService`] running under the member's control.
    pub fn get_secret(&self) -> &Scalar {
        &self.secret
    }

    /// Get the public commitment for this [`Identity`].
    pub fn get_commitment(&self) -> &Commitment {
        &self.commitment
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("commitment", &self.commitment)
            .finish_non_exhaustive()
    }
}
