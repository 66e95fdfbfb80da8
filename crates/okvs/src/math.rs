// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::errors::{MathError, OkvsResult};
use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::Rng;

/// Small primes used for trial division and as Miller-Rabin witnesses.
const SMALL_PRIMES: [u32; 20] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
];

/// Compute modular inverse using extended Euclidean algorithm
/// Returns an error if inverse doesn't exist (gcd(a, modulus) != 1)
pub fn mod_inverse(a: &BigUint, modulus: &BigUint) -> OkvsResult<BigUint> {
    let no_inverse = || MathError::NoModularInverse {
        a: a.to_string(),
        modulus: modulus.to_string(),
    };

    if modulus.is_zero() {
        return Err(no_inverse().into());
    }
    let a_reduced = a % modulus;
    if a_reduced.is_zero() {
        return Err(no_inverse().into());
    }

    let m = BigInt::from(modulus.clone());
    let mut old_r = BigInt::from(a_reduced);
    let mut r = m.clone();
    let mut old_s = BigInt::one();
    let mut s = BigInt::zero();

    while !r.is_zero() {
        let quotient = &old_r / &r;

        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);

        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }

    if !old_r.is_one() {
        return Err(no_inverse().into());
    }

    old_s
        .mod_floor(&m)
        .to_biguint()
        .ok_or_else(|| no_inverse().into())
}

/// Miller-Rabin test against the fixed witness set in [`SMALL_PRIMES`].
///
/// Deterministic for every `n < 3.3 * 10^24`, probabilistic above that.
pub fn is_probable_prime(n: &BigUint) -> bool {
    let two = BigUint::from(2u32);
    if n < &two {
        return false;
    }
    for p in SMALL_PRIMES {
        let p = BigUint::from(p);
        if n == &p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }

    let n_minus_one = n - 1u32;
    let mut d = n_minus_one.clone();
    let mut s = 0u32;
    while d.is_even() {
        d >>= 1;
        s += 1;
    }

    'witness: for a in SMALL_PRIMES {
        let mut x = BigUint::from(a).modpow(&d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Draw a random prime with exactly `bits` bits
pub fn random_prime<R: Rng + ?Sized>(bits: u64, rng: &mut R) -> OkvsResult<BigUint> {
    if bits < 2 {
        return Err(MathError::InvalidModulus {
            modulus: format!("{bits}-bit"),
            reason: "a prime needs at least 2 bits".to_string(),
        }
        .into());
    }

    loop {
        let mut candidate = rng.gen_biguint(bits);
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(0, bits > 2 || candidate.bit(0));
        if is_probable_prime(&candidate) {
            return Ok(candidate);
        }
    }
}
