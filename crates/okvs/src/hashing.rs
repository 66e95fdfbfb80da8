// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Keyed derivation of a key's start position and band.
//!
//! Both are read from a BLAKE3 XOF keyed with the store's seed. A one-byte domain tag
//! in front of the key makes the position and the band two independent functions.

use crate::band::BandRow;
use crate::params::{Keying, Params, Placement};
use crate::ring::Ring;

const POSITION_DOMAIN: u8 = 0x01;
const BAND_DOMAIN: u8 = 0x02;

/// Number of hash bytes read as the big-endian integer reduced into `[0, r)`.
const POSITION_BYTES: usize = 8;

#[derive(Debug, Clone)]
pub struct RowGenerator {
    hasher: blake3::Hasher,
    range: usize,
    width: usize,
    band_bytes: usize,
    placement: Placement,
}

impl RowGenerator {
    pub fn new(params: &Params, keying: &Keying) -> Self {
        Self {
            hasher: blake3::Hasher::new_keyed(&keying.seed),
            range: params.r(),
            width: params.w,
            band_bytes: params.band_bytes(),
            placement: keying.placement,
        }
    }

    fn expand(&self, domain: u8, key: &[u8], out: &mut [u8]) {
        let mut hasher = self.hasher.clone();
        hasher.update(&[domain]);
        hasher.update(key);
        hasher.finalize_xof().fill(out);
    }

    /// Start offset of `key`'s band, in `[0, r)`.
    ///
    /// Must not be called when `r == 0`; such parameters only describe empty tables.
    pub fn position(&self, key: &[u8]) -> usize {
        let mut bytes = [0u8; POSITION_BYTES];
        self.expand(POSITION_DOMAIN, key, &mut bytes);
        let hashed = u64::from_be_bytes(bytes) % self.range as u64;
        self.placement.place(hashed as usize)
    }

    /// Raw band bits, `ceil(w / 8)` bytes, most significant bit first.
    pub fn band_bytes(&self, key: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0u8; self.band_bytes];
        self.expand(BAND_DOMAIN, key, &mut bytes);
        bytes
    }

    /// Band unpacked into the ring's row storage
    pub fn band<R: Ring>(&self, ring: &R, key: &[u8]) -> R::Band {
        <R::Band as BandRow<R>>::unpack(ring, &self.band_bytes(key), self.width)
    }

    pub fn width(&self) -> usize {
        self.width
    }
}
