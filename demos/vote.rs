// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

//! A walkthrough of a single vote.
//!
//! Each command-line argument is the vote of one member, so `cargo run --example vote -- yes no yes` registers three
//! members who vote in that order. Everyone registers, a proposal is opened, every member votes, and ending the vote
//! prints the outcome. One member then tries to vote a second time, which is rejected.
//!
//! Set `RUST_LOG=nullvote=debug` to watch the protocol events.

use std::{env, process::ExitCode};

use nullvote::{Protocol, ProtocolConfig, SignalingError, TallyResult, Vote};
use rand_core::{CryptoRngCore, OsRng};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PROPOSAL: &str = "Adopt the new meeting schedule";

fn run<R: CryptoRngCore>(config: ProtocolConfig, votes: &[Vote], rng: &mut R) -> Result<TallyResult, SignalingError> {
    let protocol = Protocol::in_memory(config)?;

    // Register
    let members = votes
        .iter()
        .map(|_| {
            let identity = protocol.register(rng)?;
            protocol.publish(&identity)?;
            Ok(identity)
        })
        .collect::<Result<Vec<_>, SignalingError>>()?;
    println!("Registered {} members", members.len());

    // New proposal
    let topic = protocol.open_topic(PROPOSAL)?;
    println!("Opened \"{}\" with tag {}", topic.get_name(), topic.get_tag());

    // Vote
    for (identity, vote) in members.iter().zip(votes) {
        protocol.submit_signal(identity, PROPOSAL, *vote)?;
        println!("Accepted a `{}` vote", vote);
    }
    if let Some(identity) = members.first() {
        match protocol.submit_signal(identity, PROPOSAL, Vote::No) {
            Err(error @ SignalingError::DuplicateSignal) => println!("Rejected a second vote: {}", error),
            Err(error) => return Err(error),
            Ok(_) => {
                return Err(SignalingError::Internal {
                    reason: "a second vote was accepted".to_owned(),
                })
            },
        }
    }

    // End the vote
    protocol.end_vote(PROPOSAL)
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "nullvote=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let votes = match env::args().skip(1).map(|arg| arg.parse()).collect::<Result<Vec<Vote>, _>>() {
        Ok(votes) if votes.is_empty() => vec![Vote::Yes, Vote::No],
        Ok(votes) => votes,
        Err(error) => {
            eprintln!("{}", error);
            return ExitCode::FAILURE;
        },
    };

    let config = match ProtocolConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{}", error);
            return ExitCode::FAILURE;
        },
    };

    match run(config, &votes, &mut OsRng) {
        Ok(result) => {
            println!("Result: {}", result);
            println!("The proposal {}", if result.passes() { "passes" } else { "fails" });
            ExitCode::SUCCESS
        },
        Err(error) => {
            eprintln!("{}", error);
            ExitCode::FAILURE
        },
    }
}
