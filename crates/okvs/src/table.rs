// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::band::bit_at;
use crate::errors::{OkvsError, OkvsResult};
use crate::hashing::RowGenerator;
use crate::params::{Keying, Params};
use crate::ring::Ring;
use crate::scheduler::ParallelScheduler;

/// An encoded store: the table `P` plus what is needed to recompute a key's row.
///
/// Immutable once built (apart from [`Okvs::scale`]), so any number of threads may
/// decode from a shared reference.
#[derive(Debug, Clone)]
pub struct Okvs<R: Ring> {
    params: Params,
    keying: Keying,
    ring: R,
    generator: RowGenerator,
    table: Vec<R::Value>,
}

impl<R: Ring> Okvs<R> {
    /// Assemble a store from an existing table, e.g. one read from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the table length differs from `params.m`.
    pub fn from_parts(
        params: Params,
        keying: Keying,
        ring: R,
        table: Vec<R::Value>,
    ) -> OkvsResult<Self> {
        if table.len() != params.m {
            return Err(OkvsError::invalid_parameters(format!(
                "table has {} entries, expected {}",
                table.len(),
                params.m
            )));
        }
        Ok(Self {
            generator: RowGenerator::new(&params, &keying),
            params,
            keying,
            ring,
            table,
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn keying(&self) -> &Keying {
        &self.keying
    }

    pub fn ring(&self) -> &R {
        &self.ring
    }

    pub fn entries(&self) -> &[R::Value] {
        &self.table
    }

    /// Recover the value stored for `key`.
    ///
    /// Only the `w` entries starting at the key's position are read. A key that was
    /// never encoded still yields some value; the store cannot tell.
    pub fn decode(&self, key: &[u8]) -> R::Value {
        let mut acc = self.ring.zero();
        if self.params.r() == 0 {
            return acc;
        }
        let position = self.generator.position(key);
        let band = self.generator.band_bytes(key);
        let window = &self.table[position..position + self.generator.width()];
        for (j, entry) in window.iter().enumerate() {
            if bit_at(&band, j) {
                acc = self.ring.add(&acc, entry);
            }
        }
        acc
    }

    /// Decode, and report whether the value lies below `n`.
    ///
    /// For applications that store indices in `[0, n)` and read anything else as
    /// "absent".
    pub fn decode_with_check(&self, key: &[u8]) -> (R::Value, bool) {
        let value = self.decode(key);
        let in_domain = self.ring.lies_below(&value, self.params.n as u64);
        (value, in_domain)
    }

    /// Multiply every table entry by `factor`.
    ///
    /// Decoding is linear in the table, so afterwards every key decodes to
    /// `factor · value`.
    pub fn scale(&mut self, scheduler: &ParallelScheduler, block: usize, factor: &R::Scalar) {
        let ring = &self.ring;
        scheduler.for_each_block(&mut self.table, block, |entry| {
            *entry = ring.scale(factor, entry)
        });
    }
}
