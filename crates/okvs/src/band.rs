// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Storage strategies for the W-wide coefficient window of a row.

use crate::ring::{Gf2, Ring, XorWord};
use std::fmt::Debug;

/// Read bit `index` of a hash output, most significant bit first within each byte.
#[inline]
pub fn bit_at(bytes: &[u8], index: usize) -> bool {
    bytes[index / 8] & (0x80 >> (index % 8)) != 0
}

/// A band of `width` coefficients over a ring.
///
/// Offsets are local to the band: offset `j` stands for table column `position + j`.
pub trait BandRow<R: Ring>: Clone + Debug + Send + Sync {
    /// Unpack the first `width` bits of `bytes` into coefficients.
    fn unpack(ring: &R, bytes: &[u8], width: usize) -> Self;

    fn width(&self) -> usize;

    /// Offset of the first non-zero coefficient.
    fn first_nonzero(&self, ring: &R) -> Option<usize>;

    fn coefficient(&self, ring: &R, offset: usize) -> R::Scalar;

    /// `self[t] := self[t] - scale · source[t + shift]` for every `t` in `[0, width - shift)`.
    ///
    /// `shift` is the distance between the two rows' start positions. Coefficients of
    /// `source` below `shift` fall outside this band and must already be zero.
    fn eliminate(&mut self, ring: &R, source: &Self, shift: usize, scale: &R::Scalar);

    /// Visit every non-zero coefficient in increasing offset order.
    fn for_each_nonzero<F: FnMut(usize, &R::Scalar)>(&self, ring: &R, f: F);
}

/// Bitset band for GF(2), packed into 64-bit words.
///
/// Bit `j` lives in word `j / 64` at position `j % 64`. Bits at or beyond `width`
/// are always zero, which lets [`BandRow::eliminate`] XOR whole shifted words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitBand {
    words: Vec<u64>,
    width: usize,
}

impl BitBand {
    pub fn zeros(width: usize) -> Self {
        Self {
            words: vec![0; width.div_ceil(64)],
            width,
        }
    }

    pub fn get(&self, offset: usize) -> bool {
        self.words[offset / 64] >> (offset % 64) & 1 == 1
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }
}

impl<V: XorWord> BandRow<Gf2<V>> for BitBand {
    fn unpack(_ring: &Gf2<V>, bytes: &[u8], width: usize) -> Self {
        let mut band = Self::zeros(width);
        for j in 0..width {
            if bit_at(bytes, j) {
                band.words[j / 64] |= 1u64 << (j % 64);
            }
        }
        band
    }

    fn width(&self) -> usize {
        self.width
    }

    fn first_nonzero(&self, _ring: &Gf2<V>) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| i * 64 + w.trailing_zeros() as usize)
    }

    fn coefficient(&self, _ring: &Gf2<V>, offset: usize) -> bool {
        self.get(offset)
    }

    fn eliminate(&mut self, _ring: &Gf2<V>, source: &Self, shift: usize, scale: &bool) {
        if !*scale {
            return;
        }
        let word_shift = shift / 64;
        let bit_shift = shift % 64;
        for (i, dst) in self.words.iter_mut().enumerate() {
            let lo = i + word_shift;
            let Some(low_word) = source.words.get(lo) else {
                break;
            };
            let mut word = low_word >> bit_shift;
            if bit_shift != 0 {
                if let Some(high_word) = source.words.get(lo + 1) {
                    word |= high_word << (64 - bit_shift);
                }
            }
            *dst ^= word;
        }
    }

    fn for_each_nonzero<F: FnMut(usize, &bool)>(&self, _ring: &Gf2<V>, mut f: F) {
        for (i, &word) in self.words.iter().enumerate() {
            let mut rest = word;
            while rest != 0 {
                let bit = rest.trailing_zeros() as usize;
                f(i * 64 + bit, &true);
                rest &= rest - 1;
            }
        }
    }
}

/// Dense coefficient vector, usable with any ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBand<S> {
    coefficients: Vec<S>,
}

impl<S> FieldBand<S> {
    pub fn coefficients(&self) -> &[S] {
        &self.coefficients
    }
}

impl<R, S> BandRow<R> for FieldBand<S>
where
    R: Ring<Scalar = S>,
    S: Clone + Debug + PartialEq + Send + Sync,
{
    fn unpack(ring: &R, bytes: &[u8], width: usize) -> Self {
        Self {
            coefficients: (0..width).map(|j| ring.lift_bit(bit_at(bytes, j))).collect(),
        }
    }

    fn width(&self) -> usize {
        self.coefficients.len()
    }

    fn first_nonzero(&self, ring: &R) -> Option<usize> {
        self.coefficients.iter().position(|c| !ring.is_zero(c))
    }

    fn coefficient(&self, _ring: &R, offset: usize) -> S {
        self.coefficients[offset].clone()
    }

    fn eliminate(&mut self, ring: &R, source: &Self, shift: usize, scale: &S) {
        let span = self.coefficients.len().saturating_sub(shift);
        for (dst, src) in self.coefficients[..span]
            .iter_mut()
            .zip(&source.coefficients[shift..])
        {
            if !ring.is_zero(src) {
                ring.combine_scalar(dst, src, scale);
            }
        }
    }

    fn for_each_nonzero<F: FnMut(usize, &S)>(&self, ring: &R, mut f: F) {
        for (j, c) in self.coefficients.iter().enumerate() {
            if !ring.is_zero(c) {
                f(j, c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::PrimeField;
    use num_bigint::BigUint;
    use proptest::prelude::*;

    #[test]
    fn test_unpack_is_msb_first() {
        let band = BitBand::unpack(&Gf2::new(), &[0b1000_0001, 0b0100_0000], 12);
        let ones: Vec<usize> = {
            let mut v = Vec::new();
            band.for_each_nonzero(&Gf2::new(), |j, _| v.push(j));
            v
        };
        assert_eq!(ones, vec![0, 7, 9]);
        assert_eq!(band.first_nonzero(&Gf2::new()), Some(0));
    }

    #[test]
    fn test_unpack_ignores_bits_past_width() {
        let band = BitBand::unpack(&Gf2::new(), &[0b0000_1111], 4);
        assert_eq!(band.first_nonzero(&Gf2::new()), None);
        assert_eq!(band.count_ones(), 0);
    }

    #[test]
    fn test_field_band_eliminates_pivot() {
        let f = PrimeField::new(BigUint::from(101u32)).unwrap();
        // source starts two columns left of target, pivot at source offset 3
        let source = FieldBand::<BigUint>::unpack(&f, &[0b0001_1000], 8);
        let mut target = FieldBand::<BigUint>::unpack(&f, &[0b0100_0000], 8);
        let pivot = source.first_nonzero(&f).unwrap();
        assert_eq!(pivot, 3);
        let scale = target.coefficient(&f, pivot - 2);
        target.eliminate(&f, &source, 2, &scale);
        assert!(f.is_zero(&target.coefficient(&f, 1)));
        // column 4 of source lands on target offset 2
        assert_eq!(target.coefficient(&f, 2), BigUint::from(100u32));
    }

    proptest! {
        #[test]
        fn bit_band_matches_dense_reference(
            src in prop::collection::vec(any::<u8>(), 24),
            dst in prop::collection::vec(any::<u8>(), 24),
            width in 1usize..=192,
            shift in 0usize..192,
        ) {
            let shift = shift % width;
            let mut fast = BitBand::unpack(&Gf2::new(), &dst, width);
            let mut dense = FieldBand::<bool>::unpack(&Gf2::new(), &dst, width);
            let fast_src = BitBand::unpack(&Gf2::new(), &src, width);
            let dense_src = FieldBand::<bool>::unpack(&Gf2::new(), &src, width);

            fast.eliminate(&Gf2::new(), &fast_src, shift, &true);
            dense.eliminate(&Gf2::new(), &dense_src, shift, &true);

            for j in 0..width {
                prop_assert_eq!(fast.get(j), dense.coefficients()[j], "offset {}", j);
            }
            prop_assert_eq!(
                fast.first_nonzero(&Gf2::new()),
                BandRow::<Gf2>::first_nonzero(&dense, &Gf2::new())
            );
        }
    }
}
