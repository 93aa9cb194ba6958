// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use std::{
    sync::{mpsc, Arc},
    time::{Duration, Instant},
};

use curve25519_dalek::Scalar;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::{
    config::ProtocolConfig,
    error::SignalingError,
    identity::Identity,
    ledger::{LedgerError, MembershipLedger},
    membership::MembershipSnapshot,
    service::{ProofService, ProvenSignal},
    signal::{SignalRecord, Vote},
    topic::Topic,
};

/// Checks and records signals.
///
/// Proving is offloaded to a dedicated worker pool so that a slow proof service never holds a lock. A caller waits at
/// most the configured queue timeout for a worker to pick up its job, then at most the configured proof timeout for
/// the proof itself. A job whose caller gave up before it started is skipped. A job that outlives its caller after
/// starting keeps running on the pool, but its result is discarded.
pub struct SignalValidator<S, L> {
    service: Arc<S>,
    ledger: Arc<L>,
    pool: ThreadPool,
    proof_timeout: Duration,
    queue_timeout: Duration,
}

impl<S, L> SignalValidator<S, L>
where
    S: ProofService + 'static,
    L: MembershipLedger,
{
    /// Generate a new [`SignalValidator`] with a worker pool sized by `config`.
    pub fn new(service: Arc<S>, ledger: Arc<L>, config: &ProtocolConfig) -> Result<Self, SignalingError> {
        config.validate()?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|index| format!("nullvote-prover-{index}"))
            .panic_handler(|_| error!("a proving job panicked"))
            .build()
            .map_err(|error| SignalingError::Internal {
                reason: format!("unable to build the proving pool: {error}"),
            })?;

        Ok(Self {
            service,
            ledger,
            pool,
            proof_timeout: config.proof_timeout,
            queue_timeout: config.queue_timeout,
        })
    }

    /// Check a signal from `identity` on `topic` and record it.
    ///
    /// The topic must be open, `snapshot` must be a genuine view of the ledger's membership set, and the identity must
    /// be a member of `snapshot`. Older snapshots are accepted, since membership only grows. The signal is proven by
    /// the proof service, verified, and recorded only if no signal with the same nullifier hash was recorded for the
    /// topic. If the topic is closed while the signal is in flight, the signal is rejected with
    /// [`SignalingError::TopicClosed`].
    pub fn submit_signal(
        &self,
        identity: &Identity,
        topic: &Topic,
        vote: Vote,
        snapshot: &MembershipSnapshot,
    ) -> Result<SignalRecord, SignalingError> {
        let result = self.check_and_record(identity, topic, vote, snapshot);
        match &result {
            Ok(_) => info!(tag = %topic.get_tag(), "accepted signal"),
            Err(error) => warn!(tag = %topic.get_tag(), %error, "rejected signal"),
        }

        result
    }

    fn check_and_record(
        &self,
        identity: &Identity,
        topic: &Topic,
        vote: Vote,
        snapshot: &MembershipSnapshot,
    ) -> Result<SignalRecord, SignalingError> {
        let tag = topic.get_tag();

        if !topic.is_open() {
            return Err(SignalingError::TopicClosed { tag });
        }
        if !snapshot.contains(identity.get_commitment()) {
            return Err(SignalingError::NotAMember);
        }

        // A snapshot the ledger never had cannot vouch for membership
        if !snapshot.is_prefix_of(&self.ledger.snapshot()?) {
            debug!(%tag, "membership snapshot does not match the ledger");
            return Err(SignalingError::NotAMember);
        }

        let proven = self.prove(identity.get_secret(), snapshot, topic, vote)?;

        // The public signals must describe exactly this request
        let public_signals = &proven.public_signals;
        if public_signals.get_tag() != tag ||
            public_signals.get_vote() != vote ||
            public_signals.get_root() != snapshot.get_hash() ||
            public_signals.get_nullifier_hash() != &proven.nullifier_hash
        {
            return Err(SignalingError::InvalidProof);
        }
        match self.service.verify(&proven.proof, public_signals) {
            Ok(true) => {},
            Ok(false) => return Err(SignalingError::InvalidProof),
            Err(error) => {
                debug!(%error, "proof service rejected the verification request");
                return Err(SignalingError::InvalidProof);
            },
        }

        let record = SignalRecord::new(tag, proven.nullifier_hash, vote);
        self.ledger.record_signal(&record).map_err(|error| match error {
            LedgerError::UnknownTag { .. } => SignalingError::UnknownTopic {
                name: topic.get_name().to_owned(),
            },
            error => error.into(),
        })?;

        Ok(record)
    }

    // Run the proof service on the pool, waiting for a worker and then for the proof
    fn prove(
        &self,
        secret: &Scalar,
        snapshot: &MembershipSnapshot,
        topic: &Topic,
        vote: Vote,
    ) -> Result<ProvenSignal<S::Proof>, SignalingError> {
        let (started_sender, started_receiver) = mpsc::sync_channel(1);
        let (sender, receiver) = mpsc::sync_channel(1);

        let service = Arc::clone(&self.service);
        let secret = Zeroizing::new(*secret);
        let snapshot = snapshot.clone();
        let tag = topic.get_tag();
        self.pool.spawn(move || {
            // Skip the job if the caller has given up already
            if started_sender.send(()).is_err() {
                return;
            }
            let _ = sender.send(service.prove_signal(&secret, &snapshot, tag, vote));
        });

        match started_receiver.recv_timeout(self.queue_timeout) {
            Ok(()) => {},
            Err(mpsc::RecvTimeoutError::Timeout) => {
                return Err(SignalingError::ProofGenerationFailed {
                    reason: format!("no proving worker after {} ms", self.queue_timeout.as_millis()),
                })
            },
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(SignalingError::ProofGenerationFailed {
                    reason: "the proving job stopped unexpectedly".to_owned(),
                })
            },
        }

        let start = Instant::now();
        let proven = match receiver.recv_timeout(self.proof_timeout) {
            Ok(result) => result.map_err(|error| SignalingError::ProofGenerationFailed {
                reason: error.to_string(),
            })?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                return Err(SignalingError::ProofGenerationFailed {
                    reason: format!("no proof after {} ms", self.proof_timeout.as_millis()),
                })
            },
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(SignalingError::ProofGenerationFailed {
                    reason: "the proving job stopped unexpectedly".to_owned(),
                })
            },
        };
        debug!(%tag, elapsed_ms = start.elapsed().as_millis() as u64, "generated signal proof");

        Ok(proven)
    }
}
