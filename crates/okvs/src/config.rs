// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::errors::{OkvsError, OkvsResult};
use crate::scheduler::ParallelScheduler;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix for environment overrides, e.g. `OKVS_THREADS=8`
pub const ENV_PREFIX: &str = "OKVS_";

/// Keys per task in a batch decode
pub const DEFAULT_DECODE_BLOCK: usize = 2048;

/// Runtime tuning shared by the encoder and the batch decoder
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct OkvsConfig {
    /// Worker pool size
    pub threads: usize,
    /// Keys per task in a batch decode
    pub decode_block: usize,
    /// Target rows per task within one elimination step
    pub elimination_block: usize,
    /// Elimination steps with fewer target rows than this run on the calling thread.
    ///
    /// A step's targets are the rows starting at or before the pivot column, so
    /// there are fewer than `w` of them and usually only a handful. The default
    /// lets the long steps of a wide band fan out while the rest stay inline.
    pub parallel_threshold: usize,
    /// Re-keyed attempts made by `encode_with_retry`
    pub retries: usize,
}

impl Default for OkvsConfig {
    fn default() -> Self {
        Self {
            threads: ParallelScheduler::max_threads_minus(0),
            decode_block: DEFAULT_DECODE_BLOCK,
            elimination_block: 32,
            parallel_threshold: 64,
            retries: 8,
        }
    }
}

impl OkvsConfig {
    /// Defaults, overlaid by an optional YAML file, overlaid by `OKVS_*` variables.
    pub fn load(path: Option<&Path>) -> OkvsResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(OkvsConfig::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(OkvsError::config(format!(
                    "configuration file {} not found",
                    path.display()
                )));
            }
            figment = figment.merge(Yaml::file(path));
        }
        let config: OkvsConfig = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OkvsResult<()> {
        if self.threads == 0 {
            return Err(OkvsError::config("threads must be at least 1"));
        }
        if self.decode_block == 0 || self.elimination_block == 0 {
            return Err(OkvsError::config("block sizes must be at least 1"));
        }
        if self.retries == 0 {
            return Err(OkvsError::config("retries must be at least 1"));
        }
        Ok(())
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn scheduler(&self) -> OkvsResult<ParallelScheduler> {
        self.validate()?;
        ParallelScheduler::new(self.threads)
    }
}
