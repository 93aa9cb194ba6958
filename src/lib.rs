// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

//! An anonymous group signaling protocol.
//!
//! # Overview
//!
//! Members of a group publish a commitment to a secret identity. Anyone can then open a named topic, and each member
//! can cast a single yes/no signal on it. A signal proves that its sender is a member of the group without revealing
//! which one, and carries a nullifier hash that depends only on the sender's secret and the topic. Two signals from
//! the same member on the same topic share a nullifier hash, so the second one is rejected; signals on different
//! topics cannot be linked. Once a topic is closed, its signals are tallied.
//!
//! More formally, let `G` be a fixed generator of the Ristretto group, and let `H_t` be a generator derived from the
//! tag `t` of a topic. A member with secret `r` publishes the commitment `r*G`. A signal on topic `t` is a linkable
//! ring signature over the published commitments `M` for the relation
//!
//! `{ M, H_t, J ; (l, r) : M[l] = r*G, J = r*H_t }`
//!
//! and `J` is the nullifier. The vote and the membership snapshot are bound into the Fiat-Shamir transcript, so a
//! signal cannot be replayed with a different vote.
//!
//! # Implementation notes
//!
//! This implementation makes several opinionated choices:
//! - It uses [Ristretto](https://ristretto.group/) for group operations.
//! - It uses [Merlin](https://merlin.cool/) for Fiat-Shamir transcript operations.
//! - It uses [BLAKE3](https://github.com/BLAKE3-team/BLAKE3) for other cryptographic hashing operations.
//! - Proof generation runs on a [`rayon`](https://crates.io/crates/rayon) worker pool with a configurable timeout.
//!
//! The proof system and the ledger are traits, [`ProofService`] and [`MembershipLedger`], so deployments can swap in
//! their own. The crate ships [`RingProofService`] and the in-memory [`MemoryLedger`].
//!
//! Events are emitted with [`tracing`](https://crates.io/crates/tracing); no subscriber is installed. Events never
//! contain secrets, commitments, or nullifiers of signers.
//!
//! There are several features available.
//!
//! | Feature | Default? | Description |
//! | :--- | :---: | :--- |
//! | `serde` | | Adds serialization and deserialization of configuration and records via [`serde`](https://crates.io/crates/serde) |
//!
//! Proofs support a custom serialization format designed to be efficient and canonical. This functionality has an
//! associated fuzzer that can be run using a nightly compiler: `cargo +nightly fuzz run proofs`.
//!
//! # Warning
//!
//! While this implementation is written with security in mind, it is currently **experimental** and not suitable for
//! production use.
//!
//! # Example
//!
//! Here's a complete example of a vote; see the documentation for additional functionality.
//!
//! ```
//! use nullvote::*;
//! use rand_core::OsRng;
//!
//! let protocol = Protocol::in_memory(ProtocolConfig::default()).unwrap();
//!
//! // Members generate identities and publish their commitments
//! let alice = protocol.register(&mut OsRng).unwrap();
//! let bob = protocol.register(&mut OsRng).unwrap();
//! protocol.publish(&alice).unwrap();
//! protocol.publish(&bob).unwrap();
//!
//! // Open a topic and signal on it
//! protocol.open_topic("upgrade").unwrap();
//! protocol.submit_signal(&alice, "upgrade", Vote::Yes).unwrap();
//! protocol.submit_signal(&bob, "upgrade", Vote::No).unwrap();
//!
//! // Nobody can signal twice
//! assert!(matches!(
//!     protocol.submit_signal(&alice, "upgrade", Vote::No),
//!     Err(SignalingError::DuplicateSignal)
//! ));
//!
//! // Close the topic and count the votes
//! let result = protocol.end_vote("upgrade").unwrap();
//! assert_eq!((result.get_yes(), result.get_no()), (1, 1));
//! assert!(result.passes());
//! ```

pub use merlin::Transcript;

/// Protocol configuration.
pub mod config;
pub use config::{ConfigError, ProtocolConfig};
/// Caller-facing errors.
pub mod error;
pub use error::SignalingError;
/// Member identities and commitments.
pub mod identity;
pub use identity::{Commitment, Identity};
/// The membership and signal ledger.
pub mod ledger;
pub use ledger::{LedgerError, MembershipLedger, MemoryLedger};
/// The membership set.
pub mod membership;
pub use membership::{MembershipRegistry, MembershipSnapshot};
/// Public parameters used for generating and verifying signal proofs.
pub mod parameters;
pub use parameters::Parameters;
/// Linkable ring signature proofs.
pub mod proof;
pub use proof::SignalProof;
/// The protocol facade.
pub mod protocol;
pub use protocol::Protocol;
/// The proof service interface and its ring signature implementation.
pub mod service;
pub use service::{ProofService, ProvenSignal, PublicSignals, RingProofService};
/// Votes and signal records.
pub mod signal;
pub use signal::{NullifierHash, SignalRecord, Vote};
/// Signal proof statements.
pub mod statement;
pub use statement::SignalStatement;
/// Tallying closed topics.
pub mod tally;
pub use tally::{TallyEngine, TallyResult};
/// Topics and their tags.
pub mod topic;
pub use topic::{Tag, Topic, TopicRegistry, TopicState};
/// Signal proof transcripts.
pub(crate) mod transcript;
/// Signal validation.
pub mod validator;
pub use validator::SignalValidator;

/// Domain separators used for hashing operations
pub(crate) mod domains {
    // Version
    pub(crate) const VERSION: u64 = 0;

    // Number of bytes in a transcript hash
    pub(crate) const TRANSCRIPT_HASH_BYTES: usize = 32;

    // Parameters
    pub(crate) const POINT_TAG: &str = "nullvote tag generator";

    // Proof
    pub(crate) const TRANSCRIPT_PROOF: &str = "nullvote proof";
    pub(crate) const TRANSCRIPT_SIGNAL: &str = "nullvote signal";
}
