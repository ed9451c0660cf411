//! Probable-prime generation
//!
//! Candidates are drawn at a fixed bit length, sieved against a table of
//! small primes, and only then certified with Miller–Rabin. The sieve is a
//! shortcut: it throws away most composites before any modular
//! exponentiation is spent on them.

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::Rng;

use super::bigint::mod_pow;

/// Miller–Rabin rounds used when none are specified
pub const DEFAULT_MR_ROUNDS: u32 = 20;
/// Sieve samples per candidate, and certification attempts per prime
pub const DEFAULT_MAX_CANDIDATES: u64 = 100_000;
/// Smallest prime size we are willing to generate
pub const MIN_PRIME_BITS: u64 = 8;

/// The first 70 primes, used as a trial division sieve
pub const SMALL_PRIMES: [u32; 70] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
    97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191,
    193, 197, 199, 211, 223, 227, 229, 233, 239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293,
    307, 311, 313, 317, 331, 337, 347, 349,
];

#[derive(Debug, thiserror::Error)]
pub enum PrimeError {
    #[error("no probable prime of {bits} bits found after {attempts} candidates")]
    Exhausted { bits: u64, attempts: u64 },
    #[error("invalid prime bit length {0}, need at least {MIN_PRIME_BITS}")]
    InvalidBitLength(u64),
}

/// Tuning for prime search
#[derive(Debug, Clone, Copy)]
pub struct PrimeConfig {
    pub rounds: u32,
    pub max_candidates: u64,
}

impl Default for PrimeConfig {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_MR_ROUNDS,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

/// Draw an odd integer from `[2^(bits-1) + 1, 2^bits - 1)`
///
/// # Panics
///
/// Panics if `bits < 3`, where the range is empty.
pub fn n_bit_random<R: Rng + ?Sized>(rng: &mut R, bits: u64) -> BigUint {
    assert!(bits >= 3, "bit length too small for a candidate range");
    let low = (BigUint::one() << (bits - 1)) + 1u32;
    let high = (BigUint::one() << bits) - 1u32;
    rng.gen_biguint_range(&low, &high) | BigUint::one()
}

/// True if `candidate` has a factor in [`SMALL_PRIMES`] other than itself
fn has_small_factor(candidate: &BigUint) -> bool {
    SMALL_PRIMES.iter().any(|&p| {
        let p = BigUint::from(p);
        (candidate % &p).is_zero() && &p * &p <= *candidate
    })
}

/// Sample candidates until one survives the small-prime sieve
///
/// Returns `None` if `max_candidates` samples were all rejected.
pub fn low_level_prime<R: Rng + ?Sized>(
    rng: &mut R,
    bits: u64,
    max_candidates: u64,
) -> Option<BigUint> {
    (0..max_candidates)
        .map(|_| n_bit_random(rng, bits))
        .find(|candidate| !has_small_factor(candidate))
}

/// Miller–Rabin probabilistic primality test
///
/// Writes `candidate - 1 = 2^s * d` with `d` odd, then for each round picks a
/// random base in `[2, candidate)` and computes `base^d mod candidate`. A
/// round passes if that is 1, or if squaring reaches `candidate - 1` within
/// `s` steps. Any failing round declares the candidate composite.
pub fn miller_rabin<R: Rng + ?Sized>(rng: &mut R, candidate: &BigUint, rounds: u32) -> bool {
    let two = BigUint::from(2u32);
    if *candidate < two {
        return false;
    }
    if *candidate == two || *candidate == BigUint::from(3u32) {
        return true;
    }
    if candidate.is_even() {
        return false;
    }

    let n_minus_one = candidate - 1u32;
    let mut d = n_minus_one.clone();
    let mut s = 0u32;
    while d.is_even() {
        d >>= 1;
        s += 1;
    }

    'rounds: for _ in 0..rounds {
        let base = rng.gen_biguint_range(&two, candidate);
        let mut x = mod_pow(&base, &d, candidate);
        if x.is_one() {
            continue;
        }
        for _ in 0..s {
            if x == n_minus_one {
                continue 'rounds;
            }
            x = (&x * &x) % candidate;
        }
        return false;
    }

    true
}

/// Generate a probable prime of exactly `bits` bits
pub fn generate_prime_with<R: Rng + ?Sized>(
    rng: &mut R,
    bits: u64,
    config: &PrimeConfig,
) -> Result<BigUint, PrimeError> {
    if bits < MIN_PRIME_BITS {
        return Err(PrimeError::InvalidBitLength(bits));
    }

    for _ in 0..config.max_candidates {
        let Some(candidate) = low_level_prime(rng, bits, config.max_candidates) else {
            break;
        };
        if miller_rabin(rng, &candidate, config.rounds) {
            return Ok(candidate);
        }
    }

    Err(PrimeError::Exhausted {
        bits,
        attempts: config.max_candidates,
    })
}

/// Generate a probable prime of exactly `bits` bits using the thread RNG
pub fn generate_prime(bits: u64) -> Result<BigUint, PrimeError> {
    generate_prime_with(&mut rand::thread_rng(), bits, &PrimeConfig::default())
}

#[cfg(test)]
mod test {
    use super::*;

    fn is_prime_by_trial_division(n: u64) -> bool {
        if n < 2 {
            return false;
        }
        let mut i = 2u64;
        while i * i <= n {
            if n % i == 0 {
                return false;
            }
            i += 1;
        }
        true
    }

    #[test]
    fn test_small_prime_table_is_prime() {
        for p in SMALL_PRIMES {
            assert!(is_prime_by_trial_division(p as u64), "{} is not prime", p);
        }
        assert_eq!(SMALL_PRIMES[69], 349);
    }

    #[test]
    fn test_n_bit_random_range_and_parity() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let n = n_bit_random(&mut rng, 16);
            assert_eq!(n.bits(), 16);
            assert!(n.is_odd());
            assert!(n > BigUint::from(1u32 << 15));
        }
    }

    #[test]
    fn test_miller_rabin_known_values() {
        let mut rng = rand::thread_rng();
        for p in [2u64, 3, 5, 7, 97, 7919, 104_729, 2_147_483_647] {
            assert!(miller_rabin(&mut rng, &BigUint::from(p), DEFAULT_MR_ROUNDS));
        }
        // includes the Carmichael numbers 561, 41041 and 825265
        for c in [0u64, 1, 4, 9, 561, 41_041, 825_265, 7919 * 104_729] {
            assert!(!miller_rabin(&mut rng, &BigUint::from(c), DEFAULT_MR_ROUNDS));
        }
    }

    #[test]
    fn test_generated_primes_pass_trial_division() {
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let p = generate_prime_with(&mut rng, 32, &PrimeConfig::default()).unwrap();
            let p: u64 = p.try_into().unwrap();
            assert!(p >= 1 << 31);
            assert!(is_prime_by_trial_division(p), "{} is composite", p);
        }
    }

    #[test]
    fn test_low_level_prime_rejects_small_factors() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let c = low_level_prime(&mut rng, 24, DEFAULT_MAX_CANDIDATES).unwrap();
            for p in SMALL_PRIMES {
                assert!(!(&c % p).is_zero());
            }
        }
    }

    #[test]
    fn test_generate_prime_large() {
        let p = generate_prime(256).unwrap();
        assert_eq!(p.bits(), 256);
    }

    #[test]
    fn test_generate_prime_invalid_bits() {
        assert!(matches!(
            generate_prime(4),
            Err(PrimeError::InvalidBitLength(4))
        ));
    }

    #[test]
    fn test_generate_prime_exhausted() {
        let config = PrimeConfig {
            rounds: DEFAULT_MR_ROUNDS,
            max_candidates: 0,
        };
        let result = generate_prime_with(&mut rand::thread_rng(), 64, &config);
        assert!(matches!(result, Err(PrimeError::Exhausted { .. })));
    }
}
