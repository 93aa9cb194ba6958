// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use rand_core::CryptoRngCore;
use snafu::prelude::*;
use tracing::info;

use crate::{
    config::ProtocolConfig,
    error::{RandomnessFailureSnafu, SignalingError},
    identity::Identity,
    ledger::{MembershipLedger, MemoryLedger},
    membership::{MembershipRegistry, MembershipSnapshot},
    service::{ProofService, RingProofService},
    signal::{SignalRecord, Vote},
    tally::{TallyEngine, TallyResult},
    topic::{Tag, Topic, TopicRegistry},
    validator::SignalValidator,
};

/// The caller-facing anonymous signaling protocol.
///
/// A [`Protocol`] owns the topic registry and the proving pool, and shares a [`ProofService`] and a
/// [`MembershipLedger`] with any other component that needs them. Every operation takes `&self`, so a single instance
/// can be shared between threads behind an [`Arc`].
///
/// Members [`register`](`Protocol::register`) locally and [`publish`](`Protocol::publish`) their commitment. Topics are
/// opened by name, receive a fresh tag, and accept at most one signal per member until they are closed and tallied.
pub struct Protocol<S, L = MemoryLedger> {
    config: ProtocolConfig,
    service: Arc<S>,
    members: MembershipRegistry<L>,
    ledger: Arc<L>,
    topics: TopicRegistry,
    validator: SignalValidator<S, L>,
    tally: TallyEngine<L>,
}

impl Protocol<RingProofService, MemoryLedger> {
    /// Generate a new [`Protocol`] with the ring signature service and an in-memory ledger.
    pub fn in_memory(config: ProtocolConfig) -> Result<Self, SignalingError> {
        let service = Arc::new(RingProofService::new(&config));

        Self::new(config, service, Arc::new(MemoryLedger::new()))
    }
}

impl<S, L> Protocol<S, L>
where
    S: ProofService + 'static,
    L: MembershipLedger,
{
    /// Generate a new [`Protocol`] from its collaborators.
    ///
    /// The configuration is validated first, and the tag sequence starts at [`ProtocolConfig::first_tag`].
    pub fn new(config: ProtocolConfig, service: Arc<S>, ledger: Arc<L>) -> Result<Self, SignalingError> {
        config.validate()?;
        let validator = SignalValidator::new(Arc::clone(&service), Arc::clone(&ledger), &config)?;

        Ok(Self {
            topics: TopicRegistry::new(config.first_tag),
            members: MembershipRegistry::new(Arc::clone(&ledger)),
            tally: TallyEngine::new(Arc::clone(&ledger)),
            validator,
            service,
            ledger,
            config,
        })
    }

    /// Get the configuration.
    pub fn get_config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Get the proof service.
    pub fn get_service(&self) -> &Arc<S> {
        &self.service
    }

    /// Generate a fresh [`Identity`] from `rng`.
    ///
    /// The identity is not published; see [`Protocol::publish`].
    pub fn register<R: CryptoRngCore>(&self, rng: &mut R) -> Result<Identity, SignalingError> {
        Identity::random(self.service.as_ref(), rng).context(RandomnessFailureSnafu)
    }

    /// Publish the commitment of `identity`, returning its index in the membership set.
    pub fn publish(&self, identity: &Identity) -> Result<u64, SignalingError> {
        Ok(self.members.publish(identity.get_commitment())?)
    }

    /// Get a snapshot of the membership set.
    pub fn snapshot(&self) -> Result<MembershipSnapshot, SignalingError> {
        Ok(self.members.snapshot()?)
    }

    /// Open a topic named `name` with a fresh tag.
    pub fn open_topic(&self, name: &str) -> Result<Topic, SignalingError> {
        let topic = self.topics.open_topic_with(name, |tag| self.ledger.open_tag(tag))?;
        info!(name = topic.get_name(), tag = %topic.get_tag(), "opened topic");

        Ok(topic)
    }

    /// Close the open topic named `name`.
    ///
    /// Once this returns, no further signal is accepted for the topic.
    pub fn close_topic(&self, name: &str) -> Result<Topic, SignalingError> {
        let topic = self.topics.close_topic_with(name, |tag| self.ledger.seal(tag))?;
        info!(name = topic.get_name(), tag = %topic.get_tag(), "closed topic");

        Ok(topic)
    }

    /// Submit a `vote` from `identity` on the topic named `name`.
    ///
    /// The signal is proven against the current membership snapshot. See [`SignalValidator::submit_signal`] for the
    /// checks performed.
    pub fn submit_signal(&self, identity: &Identity, name: &str, vote: Vote) -> Result<SignalRecord, SignalingError> {
        let topic = self.topics.lookup(name)?;
        let snapshot = self.members.snapshot()?;

        self.validator.submit_signal(identity, &topic, vote, &snapshot)
    }

    /// Tally the closed topic named `name`.
    pub fn tally(&self, name: &str) -> Result<TallyResult, SignalingError> {
        let topic = self.topics.lookup(name)?;

        self.tally.tally(&topic)
    }

    /// Tally the closed topic with tag `tag`.
    ///
    /// Unlike [`Protocol::tally`], this reaches topics whose name has since been reused.
    pub fn tally_by_tag(&self, tag: Tag) -> Result<TallyResult, SignalingError> {
        let topic = self.topic_by_tag(tag)?;

        self.tally.tally(&topic)
    }

    /// Close the topic named `name` and tally it.
    pub fn end_vote(&self, name: &str) -> Result<TallyResult, SignalingError> {
        let topic = self.close_topic(name)?;

        self.tally.tally(&topic)
    }

    /// Get the most recent topic named `name`.
    pub fn topic(&self, name: &str) -> Result<Topic, SignalingError> {
        Ok(self.topics.lookup(name)?)
    }

    /// Get the topic with tag `tag`.
    pub fn topic_by_tag(&self, tag: Tag) -> Result<Topic, SignalingError> {
        self.topics.get(tag)?.ok_or_else(|| SignalingError::UnknownTopic {
            name: format!("#{tag}"),
        })
    }

    /// Get all open topics, in the order they were opened.
    pub fn active_topics(&self) -> Result<Vec<Topic>, SignalingError> {
        Ok(self.topics.active_topics()?)
    }
}
