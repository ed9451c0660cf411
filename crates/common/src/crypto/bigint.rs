//! Exact modular arithmetic over unbounded unsigned integers
//!
//! Everything the RSA engine needs sits on top of these few operations.
//! Addition, subtraction, multiplication and reduction are thin wrappers over
//! [`num_bigint::BigUint`]; exponentiation, GCD and the modular inverse are
//! spelled out so the algorithms stay visible.
//!
//! None of this is constant time.

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};

pub fn add(a: &BigUint, b: &BigUint) -> BigUint {
    a + b
}

/// Saturates at zero instead of underflowing.
pub fn sub(a: &BigUint, b: &BigUint) -> BigUint {
    if b > a {
        BigUint::zero()
    } else {
        a - b
    }
}

pub fn mul(a: &BigUint, b: &BigUint) -> BigUint {
    a * b
}

/// `a mod m`
///
/// # Panics
///
/// Panics if `m` is zero.
pub fn modulo(a: &BigUint, m: &BigUint) -> BigUint {
    assert!(!m.is_zero(), "modulus must be non-zero");
    a % m
}

/// Compute `base^exp mod modulus` by left-to-right square-and-multiply
///
/// Walks the exponent from its most significant bit down. Each step squares
/// the accumulator modulo `modulus` and, when the bit is set, multiplies the
/// base back in.
///
/// # Panics
///
/// Panics if `modulus` is zero.
pub fn mod_pow(base: &BigUint, exp: &BigUint, modulus: &BigUint) -> BigUint {
    assert!(!modulus.is_zero(), "modulus must be non-zero");
    if modulus.is_one() {
        return BigUint::zero();
    }

    let base = base % modulus;
    let mut result = BigUint::one();
    for i in (0..exp.bits()).rev() {
        result = (&result * &result) % modulus;
        if exp.bit(i) {
            result = (&result * &base) % modulus;
        }
    }
    result
}

/// Greatest common divisor by the Euclidean algorithm
pub fn gcd(a: &BigUint, b: &BigUint) -> BigUint {
    let mut a = a.clone();
    let mut b = b.clone();
    while !b.is_zero() {
        let r = &a % &b;
        a = b;
        b = r;
    }
    a
}

/// Extended Euclid: returns `(g, x, y)` with `a*x + b*y = g = gcd(a, b)`
fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());

    while !r.is_zero() {
        let (q, rem) = old_r.div_rem(&r);
        old_r = std::mem::replace(&mut r, rem);
        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);
        let next_t = &old_t - &q * &t;
        old_t = std::mem::replace(&mut t, next_t);
    }

    (old_r, old_s, old_t)
}

/// Modular inverse of `a` modulo `m`
///
/// Returns the unique value in `[0, m)` such that `a * x ≡ 1 (mod m)`, or
/// `None` when `a` and `m` are not coprime.
///
/// # Panics
///
/// Panics if `m` is zero.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    assert!(!m.is_zero(), "modulus must be non-zero");
    if m.is_one() {
        return Some(BigUint::zero());
    }

    let a_int = BigInt::from_biguint(Sign::Plus, a % m);
    let m_int = BigInt::from_biguint(Sign::Plus, m.clone());
    let (g, x, _) = extended_gcd(&a_int, &m_int);
    if !g.is_one() {
        return None;
    }

    // x may be negative; fold it back into [0, m)
    let normalized = x.mod_floor(&m_int);
    normalized.to_biguint()
}
