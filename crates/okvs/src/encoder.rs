// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Construction of the table `P` by banded Gaussian elimination.
//!
//! Rows are sorted by start position. Row `i` is reduced against every earlier pivot
//! before it becomes a source itself; its pivot is its first non-zero coefficient,
//! and only the following rows that start at or before that column can hold a
//! non-zero there. Back-substitution then fills one table column per row, from the
//! last row to the first.

use crate::band::BandRow;
use crate::config::OkvsConfig;
use crate::errors::{OkvsError, OkvsResult};
use crate::hashing::RowGenerator;
use crate::params::{Keying, Params, Placement};
use crate::ring::Ring;
use crate::scheduler::ParallelScheduler;
use crate::system::Row;
use crate::table::Okvs;
use rand::Rng;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Pivot chosen for one row during forward elimination
#[derive(Debug, Clone)]
struct Pivot<S> {
    column: usize,
    inverse: S,
}

#[derive(Debug, Clone)]
pub struct Encoder<R: Ring> {
    params: Params,
    ring: R,
    config: OkvsConfig,
    scheduler: ParallelScheduler,
}

impl<R: Ring> Encoder<R> {
    pub fn new(params: Params, ring: R, config: &OkvsConfig) -> OkvsResult<Self> {
        let scheduler = config.scheduler()?;
        Ok(Self::with_scheduler(params, ring, config, scheduler))
    }

    /// Share an existing worker pool, e.g. with a [`crate::BatchDecoder`].
    pub fn with_scheduler(
        params: Params,
        ring: R,
        config: &OkvsConfig,
        scheduler: ParallelScheduler,
    ) -> Self {
        Self {
            params,
            ring,
            config: config.clone(),
            scheduler,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn ring(&self) -> &R {
        &self.ring
    }

    pub fn scheduler(&self) -> &ParallelScheduler {
        &self.scheduler
    }

    /// Encode `pairs` under one fixed keying.
    ///
    /// # Errors
    ///
    /// - `ParameterMismatch` if `pairs.len() != n`
    /// - `ValueOutOfRange` if a value is not a canonical ring element
    /// - `UnsolvableSystem` if this keying does not give a full-rank system
    pub fn encode<K>(&self, pairs: &[(K, R::Value)], keying: Keying) -> OkvsResult<Okvs<R>>
    where
        K: AsRef<[u8]> + Sync,
    {
        let Params { n, m, w } = self.params;
        if pairs.len() != n {
            return Err(OkvsError::ParameterMismatch {
                expected: n,
                actual: pairs.len(),
            });
        }
        if let Some(index) = pairs.iter().position(|(_, v)| !self.ring.contains(v)) {
            return Err(OkvsError::ValueOutOfRange { index });
        }

        let started = Instant::now();
        info!(n, m, w, "Encoding OKVS");

        let mut rows = self.build_rows(pairs, &keying);
        // stable, so equal positions keep insertion order
        rows.sort_by_key(|row| row.position);
        debug!(elapsed = ?started.elapsed(), "Rows generated and sorted");

        let pivots = self.eliminate(&mut rows)?;
        debug!(elapsed = ?started.elapsed(), "Forward elimination complete");

        let table = self.back_substitute(&rows, &pivots);
        info!(n, m, w, elapsed = ?started.elapsed(), "OKVS encoded");

        Okvs::from_parts(self.params, keying, self.ring.clone(), table)
    }

    /// Encode with fresh random seeds until an attempt yields a full-rank system.
    ///
    /// Gives up after `config.retries` attempts and returns the last
    /// `UnsolvableSystem`. Any other error is returned immediately.
    pub fn encode_with_retry<K, G>(
        &self,
        pairs: &[(K, R::Value)],
        placement: Placement,
        rng: &mut G,
    ) -> OkvsResult<Okvs<R>>
    where
        K: AsRef<[u8]> + Sync,
        G: Rng + ?Sized,
    {
        let mut last_error = None;
        for attempt in 1..=self.config.retries {
            let keying = Keying::random(placement, rng);
            match self.encode(pairs, keying) {
                Ok(okvs) => return Ok(okvs),
                Err(err) if err.is_unsolvable() => {
                    warn!(attempt, retries = self.config.retries, %err, "Re-keying OKVS");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_error.unwrap_or(OkvsError::UnsolvableSystem { row: 0 }))
    }

    fn build_rows<K>(&self, pairs: &[(K, R::Value)], keying: &Keying) -> Vec<Row<R>>
    where
        K: AsRef<[u8]> + Sync,
    {
        if pairs.is_empty() {
            return Vec::new();
        }
        let generator = RowGenerator::new(&self.params, keying);
        let ring = &self.ring;
        self.scheduler.map(pairs, |(key, value)| {
            Row::new(ring, &generator, key.as_ref(), value.clone())
        })
    }

    /// Triangularize `rows` in place and return each row's pivot.
    ///
    /// Each step finishes every elimination against row `i` before row `i + 1` is
    /// inspected; the scheduler call returns only once all its blocks are done.
    fn eliminate(&self, rows: &mut [Row<R>]) -> OkvsResult<Vec<Pivot<R::Scalar>>> {
        let ring = &self.ring;
        let mut pivots = Vec::with_capacity(rows.len());

        for i in 0..rows.len() {
            let (head, tail) = rows.split_at_mut(i + 1);
            let source = &head[i];

            let Some(offset) = source.pivot_offset(ring) else {
                warn!(row = i, position = source.position, "No pivot found, system is unsolvable");
                return Err(OkvsError::UnsolvableSystem { row: i });
            };
            let column = source.position + offset;
            let inverse = ring.multiplicative_inverse(&source.band.coefficient(ring, offset))?;

            // positions are sorted, so the rows reaching the pivot column are a prefix of tail
            let reach = tail.partition_point(|row| row.position <= column);
            let targets = &mut tail[..reach];
            if targets.len() < self.config.parallel_threshold {
                for target in targets.iter_mut() {
                    target.absorb(ring, source, column, &inverse);
                }
            } else {
                self.scheduler
                    .for_each_block(targets, self.config.elimination_block, |target| {
                        target.absorb(ring, source, column, &inverse)
                    });
            }

            pivots.push(Pivot { column, inverse });
        }

        Ok(pivots)
    }

    /// Solve the triangular system from the last row to the first.
    ///
    /// Pivot columns are distinct, so each step writes a column no later step reads
    /// as its own pivot, and columns that are never pivots stay zero.
    fn back_substitute(&self, rows: &[Row<R>], pivots: &[Pivot<R::Scalar>]) -> Vec<R::Value> {
        let ring = &self.ring;
        let mut table = vec![ring.zero(); self.params.m];

        for (row, pivot) in rows.iter().zip(pivots).rev() {
            let pivot_offset = pivot.column - row.position;
            let mut acc = ring.zero();
            row.band.for_each_nonzero(ring, |j, coefficient| {
                if j != pivot_offset {
                    let term = ring.scale(coefficient, &table[row.position + j]);
                    acc = ring.add(&acc, &term);
                }
            });
            table[pivot.column] = ring.scale(&pivot.inverse, &ring.sub(&row.value, &acc));
        }

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::{Gf2, PrimeField};
    use num_bigint::BigUint;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn config() -> OkvsConfig {
        OkvsConfig {
            parallel_threshold: 4,
            elimination_block: 2,
            ..OkvsConfig::default().with_threads(4)
        }
    }

    fn pairs(n: u32) -> Vec<(Vec<u8>, u32)> {
        (0..n)
            .map(|i| (format!("key-{i}").into_bytes(), i.wrapping_mul(2654435761)))
            .collect()
    }

    #[test]
    fn test_parameter_mismatch_before_any_work() {
        let params = Params::new(8, 9, 4).unwrap();
        let encoder = Encoder::new(params, Gf2::new(), &config()).unwrap();
        let err = encoder.encode(&pairs(7), Keying::default()).unwrap_err();
        assert!(matches!(
            err,
            OkvsError::ParameterMismatch {
                expected: 8,
                actual: 7
            }
        ));
    }

    #[test]
    fn test_empty_input_gives_zero_table() {
        let params = Params::new(0, 16, 16).unwrap();
        let encoder = Encoder::new(params, Gf2::new(), &config()).unwrap();
        let okvs = encoder.encode(&pairs(0), Keying::default()).unwrap();
        assert_eq!(okvs.entries(), &vec![0u32; 16][..]);
    }

    #[test]
    fn test_round_trip_gf2() {
        let params = Params::new(300, 375, 64).unwrap();
        let encoder = Encoder::new(params, Gf2::new(), &config()).unwrap();
        let pairs = pairs(300);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let okvs = encoder
            .encode_with_retry(&pairs, Placement::Uniform, &mut rng)
            .unwrap();
        for (key, value) in &pairs {
            assert_eq!(okvs.decode(key), *value);
        }
    }

    #[test]
    fn test_round_trip_byte_aligned() {
        let params = Params::new(300, 375, 64).unwrap();
        let encoder = Encoder::new(params, Gf2::new(), &config()).unwrap();
        let pairs = pairs(300);
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let okvs = encoder
            .encode_with_retry(&pairs, Placement::ByteAligned, &mut rng)
            .unwrap();
        assert_eq!(okvs.keying().placement, Placement::ByteAligned);
        for (key, value) in &pairs {
            assert_eq!(okvs.decode(key), *value);
        }
    }

    #[test]
    fn test_round_trip_wide_gf2() {
        let params = Params::new(300, 375, 64).unwrap();
        let encoder = Encoder::new(params, Gf2::<u128>::default(), &config()).unwrap();
        let pairs: Vec<(Vec<u8>, u128)> = (0u128..300)
            .map(|i| (i.to_le_bytes().to_vec(), (i << 96) | (i * 0x9e37_79b9)))
            .collect();
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let okvs = encoder
            .encode_with_retry(&pairs, Placement::Uniform, &mut rng)
            .unwrap();
        for (key, value) in &pairs {
            assert_eq!(okvs.decode(key), *value);
        }
        assert!(okvs.entries().iter().any(|entry| *entry > u128::from(u64::MAX)));
    }

    #[test]
    fn test_round_trip_prime_field() {
        let q = BigUint::from(2305843009213693951u64);
        let field = PrimeField::new(q.clone()).unwrap();
        let params = Params::new(200, 250, 48).unwrap();
        let encoder = Encoder::new(params, field, &config()).unwrap();
        let pairs: Vec<(Vec<u8>, BigUint)> = (0u64..200)
            .map(|i| (i.to_be_bytes().to_vec(), (BigUint::from(i) * 7919u32 + 13u32) % &q))
            .collect();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let okvs = encoder
            .encode_with_retry(&pairs, Placement::Uniform, &mut rng)
            .unwrap();
        for (key, value) in &pairs {
            assert_eq!(&okvs.decode(key), value);
        }
    }

    #[test]
    fn test_rejects_unreduced_field_value() {
        let field = PrimeField::new(BigUint::from(101u32)).unwrap();
        let params = Params::new(2, 40, 8).unwrap();
        let encoder = Encoder::new(params, field, &config()).unwrap();
        let pairs = vec![
            (b"a".to_vec(), BigUint::from(3u32)),
            (b"b".to_vec(), BigUint::from(101u32)),
        ];
        let err = encoder.encode(&pairs, Keying::default()).unwrap_err();
        assert!(matches!(err, OkvsError::ValueOutOfRange { index: 1 }));
    }

    #[test]
    fn test_duplicate_key_is_unsolvable() {
        let params = Params::new(2, 40, 8).unwrap();
        let encoder = Encoder::new(params, Gf2::new(), &config()).unwrap();
        let pairs = vec![(b"same".to_vec(), 1u32), (b"same".to_vec(), 2u32)];
        let err = encoder.encode(&pairs, Keying::default()).unwrap_err();
        assert!(err.is_unsolvable());
    }

    #[test]
    fn test_retry_gives_up_with_unsolvable() {
        let params = Params::new(2, 40, 8).unwrap();
        let config = OkvsConfig {
            retries: 3,
            ..config()
        };
        let encoder = Encoder::new(params, Gf2::new(), &config).unwrap();
        let pairs = vec![(b"same".to_vec(), 1u32), (b"same".to_vec(), 2u32)];
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let err = encoder
            .encode_with_retry(&pairs, Placement::Uniform, &mut rng)
            .unwrap_err();
        assert!(err.is_unsolvable());
    }

    #[test]
    fn test_parallel_and_inline_elimination_agree() {
        let params = Params::new(300, 375, 64).unwrap();
        let pairs = pairs(300);
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let parallel = Encoder::new(params, Gf2::new(), &config()).unwrap();
        let okvs = parallel
            .encode_with_retry(&pairs, Placement::Uniform, &mut rng)
            .unwrap();

        let inline_config = OkvsConfig {
            parallel_threshold: usize::MAX,
            ..OkvsConfig::default().with_threads(1)
        };
        let inline = Encoder::new(params, Gf2::new(), &inline_config).unwrap();
        let again = inline.encode(&pairs, *okvs.keying()).unwrap();
        assert_eq!(okvs.entries(), again.entries());
    }
}
