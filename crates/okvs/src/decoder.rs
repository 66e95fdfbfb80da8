// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::config::OkvsConfig;
use crate::errors::{OkvsError, OkvsResult};
use crate::ring::Ring;
use crate::scheduler::ParallelScheduler;
use crate::table::Okvs;
use std::time::Instant;
use tracing::{debug, error};

/// Decodes many keys against one store, a contiguous block of keys per task.
#[derive(Debug, Clone)]
pub struct BatchDecoder {
    scheduler: ParallelScheduler,
    block: usize,
}

impl BatchDecoder {
    pub fn new(config: &OkvsConfig) -> OkvsResult<Self> {
        Ok(Self::with_scheduler(config.scheduler()?, config.decode_block))
    }

    pub fn with_scheduler(scheduler: ParallelScheduler, block: usize) -> Self {
        Self {
            scheduler,
            block: block.max(1),
        }
    }

    /// Element `i` of the result is `okvs.decode(keys[i])`.
    pub fn decode<R, K>(&self, okvs: &Okvs<R>, keys: &[K]) -> Vec<R::Value>
    where
        R: Ring,
        K: AsRef<[u8]> + Sync,
    {
        let started = Instant::now();
        let values = self
            .scheduler
            .map_blocks(keys, self.block, |key| okvs.decode(key.as_ref()));
        debug!(
            keys = keys.len(),
            block = self.block,
            elapsed = ?started.elapsed(),
            "Batch decoded"
        );
        values
    }

    /// Batch form of [`Okvs::decode_with_check`].
    pub fn decode_with_check<R, K>(&self, okvs: &Okvs<R>, keys: &[K]) -> Vec<(R::Value, bool)>
    where
        R: Ring,
        K: AsRef<[u8]> + Sync,
    {
        self.scheduler
            .map_blocks(keys, self.block, |key| okvs.decode_with_check(key.as_ref()))
    }

    /// Decode every key of `pairs` and compare against its value.
    ///
    /// # Errors
    ///
    /// Returns `DecodeMismatch` naming the first pair that does not decode to its value.
    pub fn verify<R, K>(&self, okvs: &Okvs<R>, pairs: &[(K, R::Value)]) -> OkvsResult<()>
    where
        R: Ring,
        K: AsRef<[u8]> + Sync,
    {
        let matches = self.scheduler.map_blocks(pairs, self.block, |(key, value)| {
            okvs.decode(key.as_ref()) == *value
        });
        match matches.iter().position(|ok| !ok) {
            Some(index) => {
                error!(index, "Decoded value differs from encoded value");
                Err(OkvsError::DecodeMismatch { index })
            }
            None => Ok(()),
        }
    }
}
