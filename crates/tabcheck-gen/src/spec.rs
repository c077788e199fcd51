//! Spec-driven single-feature generation.
//!
//! A [`FeatureSpec`] may pin any subset of its fields; [`FeatureSpec::resolve`]
//! fills the rest with values that keep the case internally consistent
//! (boolean ⇒ cardinality 2, categorical ⇒ at least 3). Pinning fields that
//! break that consistency is how negative cases are produced: a boolean with
//! five categories, a feature whose every value is missing, a zero-length line.
//!
//! Generation then runs in two more steps, [`random_data`] and
//! [`feature_string`], each a pure function of the resolved spec and the RNG.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tabcheck_error::{OracleError, Result};

use crate::feature::{FIELD_SEPARATOR, OUTPUT_MISSING_TOKEN};
use crate::random::{
    Alphabet, distinct_labels, random_choice, random_float_literal, random_ordered_codes,
    random_string,
};

/// Resolved lengths are drawn from `[0, MAX_LENGTH)`.
pub const MAX_LENGTH: usize = 100;

/// Upper bound (exclusive) for resolved categorical cardinality.
pub const MAX_CARDINALITY: u32 = 32;

/// Resolved categorical cardinality is at least this.
pub const MIN_CATEGORICAL_CARDINALITY: u32 = 3;

/// Longest generated row label.
pub const MAX_LABEL_LEN: usize = 32;

/// Integral continuous values are drawn from `[0, MAX_INT_VALUE]`.
pub const MAX_INT_VALUE: i64 = 1 << 23;

/// Digits in a generated decimal literal.
pub const FLOAT_LITERAL_DIGITS: usize = 6;

/// Length of generated category labels.
const CATEGORY_LABEL_LEN: usize = 5;

/// Statistical class of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatClass {
    Bool,
    Cat,
    Cont,
}

impl StatClass {
    pub const ALL: [Self; 3] = [Self::Bool, Self::Cat, Self::Cont];

    /// Type-annotation prefix placed before a row label.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Bool => "B:",
            Self::Cat => "C:",
            Self::Cont => "N:",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Cat => "cat",
            Self::Cont => "cont",
        }
    }

    const fn is_categorical(self) -> bool {
        matches!(self, Self::Bool | Self::Cat)
    }
}

impl fmt::Display for StatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatClass {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bool" | "b" => Ok(Self::Bool),
            "cat" | "c" => Ok(Self::Cat),
            "cont" | "n" => Ok(Self::Cont),
            _ => Err(OracleError::InvalidStatClass { tag: s.to_owned() }),
        }
    }
}

/// How values of a class are written on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    /// Random string labels (bool/cat).
    Str,
    /// Integers: codes for bool/cat, integral values for cont.
    Int,
    /// Decimal literals (cont).
    Fp,
}

impl Representation {
    /// Representations that make sense for `class`.
    #[must_use]
    pub const fn choices(class: StatClass) -> &'static [Self] {
        match class {
            StatClass::Bool | StatClass::Cat => &[Self::Str, Self::Int],
            StatClass::Cont => &[Self::Fp, Self::Int],
        }
    }

    #[must_use]
    pub fn valid_for(self, class: StatClass) -> bool {
        Self::choices(class).contains(&self)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Fp => "fp",
        }
    }
}

impl FromStr for Representation {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "str" => Ok(Self::Str),
            "int" => Ok(Self::Int),
            "fp" => Ok(Self::Fp),
            _ => Err(OracleError::InvalidRepresentation {
                tag: s.to_owned(),
                class: "any".to_owned(),
            }),
        }
    }
}

/// Generation contract with every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<StatClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rep: Option<Representation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labeled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefixed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub na: Option<Vec<String>>,
}

/// A [`FeatureSpec`] with every field decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSpec {
    pub class: StatClass,
    pub rep: Representation,
    /// `None` only for continuous features.
    pub card: Option<u32>,
    pub length: usize,
    pub missing: usize,
    pub labeled: bool,
    pub prefixed: bool,
    pub na: Vec<String>,
}

impl FeatureSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn class(mut self, class: StatClass) -> Self {
        self.class = Some(class);
        self
    }

    #[must_use]
    pub fn rep(mut self, rep: Representation) -> Self {
        self.rep = Some(rep);
        self
    }

    #[must_use]
    pub fn card(mut self, card: u32) -> Self {
        self.card = Some(card);
        self
    }

    #[must_use]
    pub fn length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    #[must_use]
    pub fn missing(mut self, missing: usize) -> Self {
        self.missing = Some(missing);
        self
    }

    #[must_use]
    pub fn labeled(mut self, labeled: bool) -> Self {
        self.labeled = Some(labeled);
        self
    }

    #[must_use]
    pub fn prefixed(mut self, prefixed: bool) -> Self {
        self.prefixed = Some(prefixed);
        self
    }

    #[must_use]
    pub fn na<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.na = Some(tokens.into_iter().map(Into::into).collect());
        self
    }

    /// Fill every unset field. Pinned fields are kept as given.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::InvalidRepresentation` when a pinned
    /// representation does not fit the class.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<ResolvedSpec> {
        let class = match self.class {
            Some(class) => class,
            None => StatClass::ALL[rng.gen_range(0..StatClass::ALL.len())],
        };
        let rep = match self.rep {
            Some(rep) if rep.valid_for(class) => rep,
            Some(rep) => {
                return Err(OracleError::InvalidRepresentation {
                    tag: rep.as_str().to_owned(),
                    class: class.to_string(),
                });
            }
            None => {
                let choices = Representation::choices(class);
                choices[rng.gen_range(0..choices.len())]
            }
        };
        let labeled = self.labeled.unwrap_or_else(|| random_choice(rng));
        let prefixed = self
            .prefixed
            .unwrap_or_else(|| labeled && random_choice(rng));
        let length = self.length.unwrap_or_else(|| rng.gen_range(0..MAX_LENGTH));
        let missing = self.missing.unwrap_or_else(|| {
            let half = length / 2;
            if half == 0 { 0 } else { rng.gen_range(0..half) }
        });
        let na = self
            .na
            .clone()
            .unwrap_or_else(|| vec![OUTPUT_MISSING_TOKEN.to_owned(), String::new()]);
        let card = match (self.card, class) {
            (Some(card), _) => Some(card),
            (None, StatClass::Cont) => None,
            (None, StatClass::Bool) => Some(2),
            (None, StatClass::Cat) => {
                Some(rng.gen_range(MIN_CATEGORICAL_CARDINALITY..MAX_CARDINALITY))
            }
        };
        let resolved = ResolvedSpec {
            class,
            rep,
            card,
            length,
            missing,
            labeled,
            prefixed,
            na,
        };
        debug!(spec = ?resolved, "feature spec resolved");
        Ok(resolved)
    }
}

/// A non-missing value produced by [`random_data`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreValue {
    /// First-sight ordered category code.
    Code(u32),
    /// Integral continuous value.
    Int(i64),
    /// Decimal literal such as `".81234"` or `"4021.77"`.
    Decimal(String),
}

impl CoreValue {
    /// The number a parser should recover from this value's token.
    ///
    /// Codes and integral values are exact (they never exceed 2^24).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Code(c) => Some(f64::from(*c)),
            Self::Int(i) => Some(*i as f64),
            Self::Decimal(d) => d.parse().ok(),
        }
    }
}

impl ResolvedSpec {
    fn check(&self) -> Result<()> {
        if self.missing > self.length {
            return Err(OracleError::spec(format!(
                "missing count {} exceeds length {}",
                self.missing, self.length
            )));
        }
        if self.class.is_categorical() && self.card.is_none() && self.missing < self.length {
            return Err(OracleError::spec(format!(
                "class {} requires a cardinality",
                self.class
            )));
        }
        Ok(())
    }
}

/// Generate `length` values, `missing` of them `None` at random positions.
///
/// Relative order of the non-missing values is preserved by the insertion.
///
/// # Errors
///
/// Returns `OracleError::InvalidSpec` if the spec cannot be generated and
/// `OracleError::LengthMismatch` if the result has the wrong length.
pub fn random_data<R: Rng + ?Sized>(rng: &mut R, spec: &ResolvedSpec) -> Result<Vec<Option<CoreValue>>> {
    spec.check()?;
    let n = spec.length - spec.missing;
    let mut data: Vec<Option<CoreValue>> = match spec.class {
        StatClass::Bool | StatClass::Cat => {
            random_ordered_codes(rng, n, spec.card.unwrap_or(0))?
                .into_iter()
                .map(|c| Some(CoreValue::Code(c)))
                .collect()
        }
        StatClass::Cont => (0..n)
            .map(|_| {
                Some(match spec.rep {
                    Representation::Int => CoreValue::Int(rng.gen_range(0..=MAX_INT_VALUE)),
                    _ => CoreValue::Decimal(random_float_literal(rng, FLOAT_LITERAL_DIGITS)),
                })
            })
            .collect(),
    };
    for _ in 0..spec.missing {
        let at = rng.gen_range(0..=data.len());
        data.insert(at, None);
    }
    if data.len() != spec.length {
        return Err(OracleError::LengthMismatch {
            expected: spec.length,
            actual: data.len(),
        });
    }
    Ok(data)
}

/// Serialize one feature line, terminated by `\n`.
///
/// Each missing value independently takes a random token from the spec's
/// allowed set. String-represented codes map to fresh distinct labels, one
/// per code, consistent across the line.
///
/// # Errors
///
/// Returns `OracleError::InvalidSpec` if the line has missing values but the
/// spec allows no missing token.
pub fn feature_string<R: Rng + ?Sized>(
    rng: &mut R,
    spec: &ResolvedSpec,
    data: &[Option<CoreValue>],
) -> Result<String> {
    let has_missing = data.iter().any(Option::is_none);
    if has_missing && spec.na.is_empty() {
        return Err(OracleError::spec("no missing-value token allowed"));
    }

    let labels = if spec.rep == Representation::Str {
        let max_code = data
            .iter()
            .flatten()
            .filter_map(|v| match v {
                CoreValue::Code(c) => usize::try_from(*c).ok(),
                _ => None,
            })
            .max();
        let count = max_code.map_or(0, |m| m + 1);
        distinct_labels(rng, count, CATEGORY_LABEL_LEN, OUTPUT_MISSING_TOKEN)
    } else {
        Vec::new()
    };

    let mut fields = Vec::with_capacity(data.len() + 1);
    if spec.labeled {
        let len = rng.gen_range(1..=MAX_LABEL_LEN);
        let mut head = random_string(rng, Alphabet::Alpha, len);
        if spec.prefixed {
            head.insert_str(0, spec.class.prefix());
        }
        fields.push(head);
    }
    for value in data {
        let token = match value {
            None => spec.na.choose(rng).cloned().unwrap_or_default(),
            Some(CoreValue::Code(c)) => usize::try_from(*c)
                .ok()
                .and_then(|c| labels.get(c).cloned())
                .unwrap_or_else(|| c.to_string()),
            Some(CoreValue::Int(i)) => i.to_string(),
            Some(CoreValue::Decimal(d)) => d.clone(),
        };
        fields.push(token);
    }
    let mut line = fields.join(FIELD_SEPARATOR);
    line.push('\n');
    Ok(line)
}

/// A fully generated spec-driven case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCase {
    pub spec: ResolvedSpec,
    pub data: Vec<Option<CoreValue>>,
    pub line: String,
}

/// Resolve, generate and serialize in one call.
///
/// # Errors
///
/// Propagates configuration and generation errors from the three phases.
pub fn generate_case<R: Rng + ?Sized>(rng: &mut R, spec: &FeatureSpec) -> Result<FeatureCase> {
    let spec = spec.resolve(rng)?;
    let data = random_data(rng, &spec)?;
    let line = feature_string(rng, &spec, &data)?;
    Ok(FeatureCase { spec, data, line })
}
