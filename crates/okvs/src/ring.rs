// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Algebraic structures the store is defined over.
//!
//! A [`Ring`] separates the *scalars* that appear as band coefficients from the
//! *values* held in the table. For [`PrimeField`] both are elements of `Z_q`. For
//! [`Gf2`] a coefficient is a single bit while a value is a machine word of `k` bits,
//! i.e. `k` independent GF(2) systems solved at once by XOR.

use crate::band::{BandRow, BitBand, FieldBand};
use crate::errors::{MathError, OkvsResult};
use crate::math::{is_probable_prime, mod_inverse, random_prime};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::Rng;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::ops::{BitXor, BitXorAssign};

/// Operations needed by elimination, back-substitution and decoding.
pub trait Ring: Clone + Debug + Send + Sync {
    /// Band coefficient.
    type Scalar: Clone + Debug + PartialEq + Send + Sync;
    /// Table entry and row value.
    type Value: Clone + Debug + PartialEq + Send + Sync;
    /// Row storage strategy for a W-wide band.
    type Band: BandRow<Self>;

    /// Additive identity of the value space.
    fn zero(&self) -> Self::Value;

    /// Embed a hash bit as a coefficient.
    fn lift_bit(&self, bit: bool) -> Self::Scalar;

    fn is_zero(&self, scalar: &Self::Scalar) -> bool;

    /// True when `value` is a canonical element (for `Z_q`, below `q`).
    fn contains(&self, value: &Self::Value) -> bool;

    fn mul(&self, a: &Self::Scalar, b: &Self::Scalar) -> Self::Scalar;

    fn multiplicative_inverse(&self, scalar: &Self::Scalar) -> OkvsResult<Self::Scalar>;

    fn add(&self, a: &Self::Value, b: &Self::Value) -> Self::Value;

    fn sub(&self, a: &Self::Value, b: &Self::Value) -> Self::Value;

    /// `scalar · value`
    fn scale(&self, scalar: &Self::Scalar, value: &Self::Value) -> Self::Value;

    /// `dst := dst - scale · src`
    fn combine(&self, dst: &mut Self::Value, src: &Self::Value, scale: &Self::Scalar) {
        *dst = self.sub(dst, &self.scale(scale, src));
    }

    /// `dst := dst - scale · src` on band coefficients
    fn combine_scalar(&self, dst: &mut Self::Scalar, src: &Self::Scalar, scale: &Self::Scalar);

    /// True when `value` is strictly below `bound` read as an unsigned integer.
    fn lies_below(&self, value: &Self::Value, bound: u64) -> bool;

    /// Width in bytes of one persisted table entry.
    fn value_width(&self) -> usize;

    fn write_value(&self, value: &Self::Value, out: &mut Vec<u8>);

    fn read_value(&self, bytes: &[u8]) -> Self::Value;
}

/// Fixed-width machine word holding one GF(2) table value.
///
/// Every bit of the word is an independent GF(2) system; all of them are solved at
/// once by XOR.
pub trait XorWord:
    Copy + Debug + Default + Eq + Send + Sync + BitXor<Output = Self> + BitXorAssign
{
    /// Width of the persisted little-endian form.
    const BYTES: usize;

    fn write_le(&self, out: &mut Vec<u8>);

    fn read_le(bytes: &[u8]) -> Self;

    fn lies_below(&self, bound: u64) -> bool;
}

macro_rules! impl_xor_word {
    ($($word:ty),*) => {$(
        impl XorWord for $word {
            const BYTES: usize = std::mem::size_of::<$word>();

            fn write_le(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut word = [0u8; std::mem::size_of::<$word>()];
                word.copy_from_slice(&bytes[..Self::BYTES]);
                <$word>::from_le_bytes(word)
            }

            fn lies_below(&self, bound: u64) -> bool {
                u128::from(*self) < u128::from(bound)
            }
        }
    )*};
}

impl_xor_word!(u8, u16, u32, u64, u128);

/// GF(2) coefficients with `V`-word values, 32-bit by default.
///
/// `Gf2::new()` gives the 32-bit ring; wider values use e.g. `Gf2::<u128>::default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Gf2<V = u32> {
    word: PhantomData<V>,
}

impl Gf2 {
    pub const fn new() -> Self {
        Self { word: PhantomData }
    }
}

impl<V: XorWord> Ring for Gf2<V> {
    type Scalar = bool;
    type Value = V;
    type Band = BitBand;

    fn zero(&self) -> V {
        V::default()
    }

    fn lift_bit(&self, bit: bool) -> bool {
        bit
    }

    fn is_zero(&self, scalar: &bool) -> bool {
        !*scalar
    }

    fn contains(&self, _value: &V) -> bool {
        true
    }

    fn mul(&self, a: &bool, b: &bool) -> bool {
        *a && *b
    }

    fn multiplicative_inverse(&self, scalar: &bool) -> OkvsResult<bool> {
        if *scalar {
            Ok(true)
        } else {
            Err(MathError::NoModularInverse {
                a: "0".to_string(),
                modulus: "2".to_string(),
            }
            .into())
        }
    }

    fn add(&self, a: &V, b: &V) -> V {
        *a ^ *b
    }

    fn sub(&self, a: &V, b: &V) -> V {
        *a ^ *b
    }

    fn scale(&self, scalar: &bool, value: &V) -> V {
        if *scalar {
            *value
        } else {
            V::default()
        }
    }

    fn combine(&self, dst: &mut V, src: &V, scale: &bool) {
        if *scale {
            *dst ^= *src;
        }
    }

    fn combine_scalar(&self, dst: &mut bool, src: &bool, scale: &bool) {
        *dst ^= *src && *scale;
    }

    fn lies_below(&self, value: &V, bound: u64) -> bool {
        value.lies_below(bound)
    }

    fn value_width(&self) -> usize {
        V::BYTES
    }

    fn write_value(&self, value: &V, out: &mut Vec<u8>) {
        value.write_le(out);
    }

    fn read_value(&self, bytes: &[u8]) -> V {
        V::read_le(bytes)
    }
}

/// The prime field `Z_q`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimeField {
    q: BigUint,
    width: usize,
}

impl PrimeField {
    /// Build the field for a prime modulus `q`.
    ///
    /// # Errors
    ///
    /// Returns a math error if `q` is not prime.
    pub fn new(q: BigUint) -> OkvsResult<Self> {
        if !is_probable_prime(&q) {
            return Err(MathError::InvalidModulus {
                modulus: q.to_string(),
                reason: "modulus must be prime".to_string(),
            }
            .into());
        }
        let width = q.bits().div_ceil(8) as usize;
        Ok(Self { q, width })
    }

    /// Build a field over a freshly drawn prime of `bits` bits.
    pub fn random<R: Rng + ?Sized>(bits: u64, rng: &mut R) -> OkvsResult<Self> {
        Self::new(random_prime(bits, rng)?)
    }

    pub fn modulus(&self) -> &BigUint {
        &self.q
    }
}

impl Ring for PrimeField {
    type Scalar = BigUint;
    type Value = BigUint;
    type Band = FieldBand<BigUint>;

    fn zero(&self) -> BigUint {
        BigUint::zero()
    }

    fn lift_bit(&self, bit: bool) -> BigUint {
        if bit {
            BigUint::one()
        } else {
            BigUint::zero()
        }
    }

    fn is_zero(&self, scalar: &BigUint) -> bool {
        scalar.is_zero()
    }

    fn contains(&self, value: &BigUint) -> bool {
        value < &self.q
    }

    fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.q
    }

    fn multiplicative_inverse(&self, scalar: &BigUint) -> OkvsResult<BigUint> {
        mod_inverse(scalar, &self.q)
    }

    fn add(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + b) % &self.q
    }

    fn sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + &self.q - (b % &self.q)) % &self.q
    }

    fn scale(&self, scalar: &BigUint, value: &BigUint) -> BigUint {
        self.mul(scalar, value)
    }

    fn combine_scalar(&self, dst: &mut BigUint, src: &BigUint, scale: &BigUint) {
        if src.is_zero() || scale.is_zero() {
            return;
        }
        let product = self.mul(scale, src);
        *dst = self.sub(dst, &product);
    }

    fn lies_below(&self, value: &BigUint, bound: u64) -> bool {
        value < &BigUint::from(bound)
    }

    fn value_width(&self) -> usize {
        self.width
    }

    fn write_value(&self, value: &BigUint, out: &mut Vec<u8>) {
        let mut bytes = value.to_bytes_le();
        bytes.resize(self.width, 0);
        out.extend_from_slice(&bytes);
    }

    fn read_value(&self, bytes: &[u8]) -> BigUint {
        BigUint::from_bytes_le(&bytes[..self.width])
    }
}
