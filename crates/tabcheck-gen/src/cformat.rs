//! C `printf`-compatible floating point formatting.
//!
//! The program under test prints floats with a C format string and reads
//! them with `strtof`. Rust's `{:e}` output differs from C's `%e`
//! (`1.0e0` vs `1.0e+00`), so both the randomized input formats and the
//! canonical oracle format go through [`CFloatFormat`].

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use tabcheck_error::{OracleError, Result};

use crate::random::random_choice;

/// Canonical format the program under test uses when echoing floats.
pub const DEFAULT_CANONICAL_FORMAT: &str = "%.1e";

/// Precision C uses when a conversion has none.
const C_DEFAULT_PRECISION: u8 = 6;

/// Largest precision accepted when parsing a format string.
const MAX_PRECISION: u8 = 17;

/// `f` or `e` conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notation {
    Fixed,
    Exponential,
}

impl Notation {
    const fn conversion(self) -> char {
        match self {
            Self::Fixed => 'f',
            Self::Exponential => 'e',
        }
    }
}

/// A `%[+].<precision>{e,f}` conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CFloatFormat {
    pub precision: u8,
    pub notation: Notation,
    /// `+` flag: non-negative values carry an explicit sign.
    pub plus_sign: bool,
}

impl CFloatFormat {
    #[must_use]
    pub const fn new(precision: u8, notation: Notation, plus_sign: bool) -> Self {
        Self {
            precision,
            notation,
            plus_sign,
        }
    }

    /// The oracle's canonical format, `%.1e`.
    #[must_use]
    pub const fn canonical() -> Self {
        Self::new(1, Notation::Exponential, false)
    }

    /// Random input-side format: precision 3..=8, either notation, optional
    /// explicit sign.
    ///
    /// Precision never drops below 3 because the canonical echo keeps two
    /// significant digits and the parser cannot recover digits its input
    /// never had.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let precision = rng.gen_range(3..=8);
        let notation = if random_choice(rng) {
            Notation::Fixed
        } else {
            Notation::Exponential
        };
        Self::new(precision, notation, random_choice(rng))
    }

    /// Render `value` exactly as C `printf` would with this conversion.
    #[must_use]
    pub fn render(&self, value: f64) -> String {
        let precision = usize::from(self.precision);
        let body = match self.notation {
            Notation::Fixed => format!("{value:.precision$}"),
            Notation::Exponential => c_exponent(&format!("{value:.precision$e}")),
        };
        if self.plus_sign && !body.starts_with('-') {
            format!("+{body}")
        } else {
            body
        }
    }
}

impl Default for CFloatFormat {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Rewrite Rust's exponent suffix (`e-7`, `e0`) in C form (`e-07`, `e+00`).
fn c_exponent(rust: &str) -> String {
    match rust.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        // inf, NaN
        None => rust.to_owned(),
    }
}

impl fmt::Display for CFloatFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "%{}.{}{}",
            if self.plus_sign { "+" } else { "" },
            self.precision,
            self.notation.conversion()
        )
    }
}

impl FromStr for CFloatFormat {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |detail: &str| OracleError::InvalidFloatFormat {
            format: s.to_owned(),
            detail: detail.to_owned(),
        };

        let rest = s
            .strip_prefix('%')
            .ok_or_else(|| invalid("must start with '%'"))?;
        let (plus_sign, rest) = match rest.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, rest),
        };
        let mut chars = rest.chars();
        let notation = match chars.next_back() {
            Some('e') => Notation::Exponential,
            Some('f') => Notation::Fixed,
            _ => return Err(invalid("conversion must be 'e' or 'f'")),
        };
        let spec = chars.as_str();
        let precision = if spec.is_empty() {
            C_DEFAULT_PRECISION
        } else {
            let digits = spec
                .strip_prefix('.')
                .ok_or_else(|| invalid("only the '+' flag and a precision are supported"))?;
            if digits.is_empty() {
                0
            } else {
                digits
                    .parse::<u8>()
                    .map_err(|_| invalid("precision is not a small integer"))?
            }
        };
        if precision > MAX_PRECISION {
            return Err(invalid("precision too large"));
        }
        Ok(Self::new(precision, notation, plus_sign))
    }
}
