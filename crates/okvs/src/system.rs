// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::band::BandRow;
use crate::hashing::RowGenerator;
use crate::ring::Ring;

/// One equation of the banded system: `sum_j band[j] * P[position + j] = value`.
#[derive(Debug, Clone)]
pub struct Row<R: Ring> {
    pub position: usize,
    pub band: R::Band,
    pub value: R::Value,
}

impl<R: Ring> Row<R> {
    pub fn new(ring: &R, generator: &RowGenerator, key: &[u8], value: R::Value) -> Self {
        Self {
            position: generator.position(key),
            band: generator.band(ring, key),
            value,
        }
    }

    /// Local offset of the first non-zero coefficient
    pub fn pivot_offset(&self, ring: &R) -> Option<usize> {
        self.band.first_nonzero(ring)
    }

    /// Clear this row's coefficient at absolute column `pivot` using `source`, whose
    /// first non-zero coefficient sits at that column.
    ///
    /// Requires `source.position <= self.position <= pivot`.
    pub fn absorb(&mut self, ring: &R, source: &Row<R>, pivot: usize, pivot_inverse: &R::Scalar) {
        let local = pivot - self.position;
        let coefficient = self.band.coefficient(ring, local);
        if ring.is_zero(&coefficient) {
            return;
        }
        let scale = ring.mul(&coefficient, pivot_inverse);
        let shift = self.position - source.position;
        self.band.eliminate(ring, &source.band, shift, &scale);
        ring.combine(&mut self.value, &source.value, &scale);
    }
}
