// Copyright (c) 2024, The Tari Project
// SPDX-License-Identifier: BSD-3-Clause

use std::{env, num::NonZeroUsize, thread, time::Duration};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Configuration for a [`Protocol`](`crate::protocol::Protocol`) instance.
///
/// The defaults are suitable for tests and local use. Deployments should set at least the tag seed and the context
/// explicitly, either directly or through [`ProtocolConfig::from_env`].
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct ProtocolConfig {
    /// The first tag allocated by the topic registry; later tags increase strictly from here.
    pub first_tag: u64,
    /// How long a caller waits for proof generation before giving up, counted from when a worker picks up the job.
    pub proof_timeout: Duration,
    /// How long a caller waits for a free proving worker before giving up.
    pub queue_timeout: Duration,
    /// The number of threads in the proving worker pool.
    pub worker_threads: usize,
    /// A deployment context bound into every proof, so proofs from one deployment never verify in another.
    pub context: String,
}

/// Errors that can arise relating to [`ProtocolConfig`].
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[snafu(display("Environment variable `{key}` has an invalid value `{value}`"))]
    InvalidValue {
        /// The environment variable.
        key: &'static str,
        /// The value that failed to parse.
        value: String,
    },
    /// An invalid parameter was provided.
    #[snafu(display("An invalid parameter was provided: {reason}"))]
    InvalidParameter {
        /// The reason for the parameter error.
        reason: &'static str,
    },
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            first_tag: Self::DEFAULT_FIRST_TAG,
            proof_timeout: Self::DEFAULT_PROOF_TIMEOUT,
            queue_timeout: Self::DEFAULT_QUEUE_TIMEOUT,
            worker_threads: thread::available_parallelism().map_or(4, NonZeroUsize::get),
            context: Self::DEFAULT_CONTEXT.to_owned(),
        }
    }
}

impl ProtocolConfig {
    /// Prefix shared by all environment variables read by [`ProtocolConfig::from_env`].
    pub const ENV_PREFIX: &'static str = "NULLVOTE_";

    const DEFAULT_FIRST_TAG: u64 = 1111;
    const DEFAULT_PROOF_TIMEOUT: Duration = Duration::from_secs(30);
    const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_secs(120);
    const DEFAULT_CONTEXT: &'static str = "nullvote local";

    const ENV_FIRST_TAG: &'static str = "NULLVOTE_FIRST_TAG";
    const ENV_PROOF_TIMEOUT_MS: &'static str = "NULLVOTE_PROOF_TIMEOUT_MS";
    const ENV_QUEUE_TIMEOUT_MS: &'static str = "NULLVOTE_QUEUE_TIMEOUT_MS";
    const ENV_WORKER_THREADS: &'static str = "NULLVOTE_WORKER_THREADS";
    const ENV_CONTEXT: &'static str = "NULLVOTE_CONTEXT";

    /// Load a [`ProtocolConfig`] from the environment.
    ///
    /// Recognized variables are `NULLVOTE_FIRST_TAG`, `NULLVOTE_PROOF_TIMEOUT_MS`, `NULLVOTE_QUEUE_TIMEOUT_MS`,
    /// `NULLVOTE_WORKER_THREADS`, and `NULLVOTE_CONTEXT`. Unset variables keep their default values. A variable that
    /// is set but cannot be parsed returns a [`ConfigError`], as does a configuration that fails
    /// [`ProtocolConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    // Helper function that allows the environment to be substituted in tests
    fn from_lookup<F: Fn(&'static str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(Self::ENV_FIRST_TAG) {
            config.first_tag = parse(Self::ENV_FIRST_TAG, value)?;
        }
        if let Some(value) = lookup(Self::ENV_PROOF_TIMEOUT_MS) {
            config.proof_timeout = Duration::from_millis(parse(Self::ENV_PROOF_TIMEOUT_MS, value)?);
        }
        if let Some(value) = lookup(Self::ENV_QUEUE_TIMEOUT_MS) {
            config.queue_timeout = Duration::from_millis(parse(Self::ENV_QUEUE_TIMEOUT_MS, value)?);
        }
        if let Some(value) = lookup(Self::ENV_WORKER_THREADS) {
            config.worker_threads = parse(Self::ENV_WORKER_THREADS, value)?;
        }
        if let Some(value) = lookup(Self::ENV_CONTEXT) {
            config.context = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that this configuration can drive a [`Protocol`](`crate::protocol::Protocol`).
    ///
    /// The timeouts and worker pool size must be nonzero, and the context must not be empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proof_timeout.is_zero() {
            return Err(ConfigError::InvalidParameter {
                reason: "`proof_timeout` was zero",
            });
        }
        if self.queue_timeout.is_zero() {
            return Err(ConfigError::InvalidParameter {
                reason: "`queue_timeout` was zero",
            });
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::InvalidParameter {
                reason: "`worker_threads` was zero",
            });
        }
        if self.context.is_empty() {
            return Err(ConfigError::InvalidParameter {
                reason: "`context` was empty",
            });
        }

        Ok(())
    }
}

fn parse<T: core::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue { key, value })
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, time::Duration};

    use super::{ConfigError, ProtocolConfig};

    #[test]
    fn test_defaults() {
        let config = ProtocolConfig::default();

        assert_eq!(config.first_tag, 1111);
        assert!(config.worker_threads > 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lookup() {
        let vars = HashMap::from([
            ("NULLVOTE_FIRST_TAG", "42".to_owned()),
            ("NULLVOTE_PROOF_TIMEOUT_MS", "250".to_owned()),
            ("NULLVOTE_QUEUE_TIMEOUT_MS", "1000".to_owned()),
            ("NULLVOTE_WORKER_THREADS", " 2 ".to_owned()),
            ("NULLVOTE_CONTEXT", "staging".to_owned()),
        ]);
        let config = ProtocolConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

        assert_eq!(config.first_tag, 42);
        assert_eq!(config.proof_timeout, Duration::from_millis(250));
        assert_eq!(config.queue_timeout, Duration::from_secs(1));
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.context, "staging");
    }

    #[test]
    fn test_invalid_lookup() {
        // Unparseable value
        let result = ProtocolConfig::from_lookup(|key| (key == "NULLVOTE_FIRST_TAG").then(|| "soon".to_owned()));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                key: "NULLVOTE_FIRST_TAG",
                ..
            })
        ));

        // Parseable but invalid value
        let result = ProtocolConfig::from_lookup(|key| (key == "NULLVOTE_WORKER_THREADS").then(|| "0".to_owned()));
        assert!(matches!(result, Err(ConfigError::InvalidParameter { .. })));
    }
}
