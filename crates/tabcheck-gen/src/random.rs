//! Random primitive generators.
//!
//! Every function takes the random source explicitly so that a run can be
//! replayed from its seed.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;

use tabcheck_error::{OracleError, Result};

/// Upper bound for the length chosen when a caller asks for length 0.
pub const MAX_RANDOM_STRING_LEN: usize = 64;

const ALPHA: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";

/// Character set for [`random_string`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alphabet {
    /// Printable ASCII without space (`0x21..=0x7E`).
    Printable,
    /// Upper- and lower-case ASCII letters.
    Alpha,
}

impl Alphabet {
    fn pick<R: Rng + ?Sized>(self, rng: &mut R) -> char {
        match self {
            Self::Printable => char::from(rng.gen_range(0x21_u8..=0x7E)),
            Self::Alpha => char::from(ALPHA[rng.gen_range(0..ALPHA.len())]),
        }
    }
}

/// Fair coin.
pub fn random_choice<R: Rng + ?Sized>(rng: &mut R) -> bool {
    rng.gen_bool(0.5)
}

/// Random string of exactly `length` characters drawn from `alphabet`.
///
/// A `length` of 0 means "any length in `[1, 64]`".
pub fn random_string<R: Rng + ?Sized>(rng: &mut R, alphabet: Alphabet, length: usize) -> String {
    let length = if length == 0 {
        rng.gen_range(1..=MAX_RANDOM_STRING_LEN)
    } else {
        length
    };
    (0..length).map(|_| alphabet.pick(rng)).collect()
}

/// Random decimal literal: `precision` digits with a decimal point inserted
/// at a uniformly random position, including before the first and after the
/// last digit (`".123"`, `"123."`).
///
/// Precision is clamped to at least one digit so the literal always parses.
pub fn random_float_literal<R: Rng + ?Sized>(rng: &mut R, precision: usize) -> String {
    let precision = precision.max(1);
    let mut literal: String = (0..precision)
        .map(|_| char::from(DIGITS[rng.gen_range(0..DIGITS.len())]))
        .collect();
    let point = rng.gen_range(0..=precision);
    literal.insert(point, '.');
    literal
}

/// `n` codes in `[0, k)` whose first occurrences are ordered: each new
/// maximum is exactly one more than the previous maximum.
///
/// This is the order in which a first-sight symbol table hands out codes,
/// so the codes are exactly what an interning parser assigns to the labels
/// they stand for. The realized set may be a strict subset of `[0, k)`.
///
/// # Errors
///
/// Returns `OracleError::InvalidSpec` if `k == 0` and `n > 0`.
pub fn random_ordered_codes<R: Rng + ?Sized>(rng: &mut R, n: usize, k: u32) -> Result<Vec<u32>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    if k == 0 {
        return Err(OracleError::spec("cardinality must be at least 1"));
    }
    let mut codes = Vec::with_capacity(n);
    codes.push(0);
    let mut max = 0_u32;
    for _ in 1..n {
        let bound = max.saturating_add(2).min(k);
        let code = rng.gen_range(0..bound);
        max = max.max(code);
        codes.push(code);
    }
    Ok(codes)
}

/// Random permutation of `[0, n)` whose first `fixed_prefix` positions are
/// the identity.
pub fn random_permutation<R: Rng + ?Sized>(rng: &mut R, n: usize, fixed_prefix: usize) -> Vec<usize> {
    let fixed = fixed_prefix.min(n);
    let mut perm: Vec<usize> = (0..n).collect();
    perm[fixed..].shuffle(rng);
    perm
}

/// `count` pairwise-distinct alphabetic labels of at least `length`
/// characters, none equal to `reserved`.
///
/// Labels grow by one character after a run of collisions, so the call
/// terminates even when `52^length` is close to `count`.
pub fn distinct_labels<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    length: usize,
    reserved: &str,
) -> Vec<String> {
    const MAX_COLLISIONS: usize = 64;

    let mut length = length.max(1);
    let mut seen = HashSet::with_capacity(count);
    let mut labels = Vec::with_capacity(count);
    let mut collisions = 0;
    while labels.len() < count {
        let label = random_string(rng, Alphabet::Alpha, length);
        if label != reserved && seen.insert(label.clone()) {
            labels.push(label);
            collisions = 0;
        } else {
            collisions += 1;
            if collisions == MAX_COLLISIONS {
                length += 1;
                collisions = 0;
            }
        }
    }
    labels
}
