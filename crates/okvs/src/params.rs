// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::errors::{OkvsError, OkvsResult};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Key for the row generator's pseudorandom function.
pub type Seed = [u8; 32];

/// Shape of an encoded table.
///
/// `n` pairs are stored in `m` entries; each key touches a window of `w` consecutive
/// entries starting somewhere in `[0, m - w)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Number of key-value pairs
    pub n: usize,
    /// Table width
    pub m: usize,
    /// Band width
    pub w: usize,
}

impl Params {
    /// Creates parameters, validating that every band fits inside the table.
    ///
    /// # Errors
    ///
    /// Returns an error if `w == 0`, `m < w`, or there are pairs to place but no
    /// start positions (`m == w`).
    pub fn new(n: usize, m: usize, w: usize) -> OkvsResult<Self> {
        if w == 0 {
            return Err(OkvsError::invalid_parameters("band width must be positive"));
        }
        if m < w {
            return Err(OkvsError::invalid_parameters(format!(
                "table width {m} is smaller than band width {w}"
            )));
        }
        if n > 0 && m == w {
            return Err(OkvsError::invalid_parameters(format!(
                "table width {m} leaves no start positions for band width {w}"
            )));
        }
        Ok(Self { n, m, w })
    }

    /// Sizes the table as `m = ceil(n * (1 + epsilon))`, widened to at least `w + 1`.
    pub fn with_slack(n: usize, w: usize, epsilon: f64) -> OkvsResult<Self> {
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(OkvsError::invalid_parameters(format!(
                "slack must be a non-negative number, got {epsilon}"
            )));
        }
        let m = (n as f64 * (1.0 + epsilon)).ceil() as usize;
        Self::new(n, m.max(w + 1), w)
    }

    /// Range of valid start positions, `m - w`
    pub fn r(&self) -> usize {
        self.m - self.w
    }

    /// Bytes of hash output needed for one band
    pub fn band_bytes(&self) -> usize {
        self.w.div_ceil(8)
    }
}

/// How a hashed start position is mapped into `[0, r)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Any position in `[0, r)`
    #[default]
    Uniform,
    /// Positions rounded down to a multiple of 8, so rows combine on byte boundaries
    ByteAligned,
}

impl Placement {
    pub fn place(&self, hashed: usize) -> usize {
        match self {
            Placement::Uniform => hashed,
            Placement::ByteAligned => hashed / 8 * 8,
        }
    }
}

/// Everything besides [`Params`] that determines where a key's row lands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keying {
    pub seed: Seed,
    pub placement: Placement,
}

impl Keying {
    pub fn new(seed: Seed) -> Self {
        Self {
            seed,
            placement: Placement::Uniform,
        }
    }

    /// Fresh uniformly random seed, keeping the given placement
    pub fn random<R: Rng + ?Sized>(placement: Placement, rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self { seed, placement }
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }
}
