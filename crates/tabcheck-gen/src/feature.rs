//! Feature model: one row of a test matrix and its two renderings.
//!
//! A feature renders itself twice:
//!
//! 1. [`Feature::render_input`] gives the randomized formatting the parser consumes
//!    (per-feature float format, random labels, empty or `NA` missing cells).
//! 2. [`Feature::render_expected`] gives the canonical line a conforming parser
//!    must echo: metadata field, integer codes or canonical floats, `NA`.
//!
//! Both are pure functions of the stored state.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

use rand::Rng;

use tabcheck_error::{OracleError, Result};

use crate::cformat::CFloatFormat;
use crate::random::{distinct_labels, random_choice, random_ordered_codes};

/// Token the program under test prints for missing values.
pub const OUTPUT_MISSING_TOKEN: &str = "NA";

/// Field separator for input and output lines.
pub const FIELD_SEPARATOR: &str = "\t";

/// Continuous values are drawn from `[-bound, bound)`.
pub const DEFAULT_VALUE_BOUND: f64 = 1e9;

/// Upper bound on requested categorical cardinality.
pub const DEFAULT_MAX_CATEGORIES: u32 = 32;

/// Per-cell probability of a missing value.
pub const DEFAULT_PROB_MISSING: f64 = 0.1;

/// Length of generated category labels and row names.
pub const DEFAULT_LABEL_LEN: usize = 5;

/// How missing values appear in a feature's input rendering.
///
/// Chosen once per feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingMarker {
    /// Explicit `NA` token.
    Na,
    /// Nothing between adjacent separators.
    Empty,
}

impl MissingMarker {
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Na => OUTPUT_MISSING_TOKEN,
            Self::Empty => "",
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if random_choice(rng) { Self::Na } else { Self::Empty }
    }
}

/// Class tag in the metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassTag {
    /// `F`: continuous with at least one value.
    Float,
    /// `I`: categorical with at least one value.
    Integral,
    /// `?`: every value missing; the class cannot be inferred.
    Unknown,
}

impl ClassTag {
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Float => 'F',
            Self::Integral => 'I',
            Self::Unknown => '?',
        }
    }
}

/// The `<classTag>:<degeneracyFlag>:<cardinality>:<missingCount>` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Metadata {
    pub class_tag: ClassTag,
    pub degenerate: bool,
    pub cardinality: usize,
    pub missing: usize,
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.class_tag.as_char(),
            if self.degenerate { '!' } else { '-' },
            self.cardinality,
            self.missing
        )
    }
}

/// Knobs for random feature construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureOptions {
    pub value_bound: f64,
    pub max_categories: u32,
    pub prob_missing: f64,
    pub label_len: usize,
}

impl Default for FeatureOptions {
    fn default() -> Self {
        Self {
            value_bound: DEFAULT_VALUE_BOUND,
            max_categories: DEFAULT_MAX_CATEGORIES,
            prob_missing: DEFAULT_PROB_MISSING,
            label_len: DEFAULT_LABEL_LEN,
        }
    }
}

fn count_missing<T>(values: &[Option<T>]) -> usize {
    values.iter().filter(|v| v.is_none()).count()
}

/// Fewer than two present values, or all present values equal.
fn is_degenerate<T, I>(values: I) -> bool
where
    T: Eq + Hash,
    I: IntoIterator<Item = Option<T>>,
{
    let mut present = 0_usize;
    let mut distinct = HashSet::new();
    for value in values.into_iter().flatten() {
        present += 1;
        distinct.insert(value);
    }
    present < 2 || distinct.len() < 2
}

fn class_tag(missing: usize, len: usize, with_data: ClassTag) -> ClassTag {
    if missing < len {
        with_data
    } else {
        ClassTag::Unknown
    }
}

fn join_line<I>(name: Option<&str>, head: Option<String>, tokens: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let fields: Vec<String> = name
        .map(str::to_owned)
        .into_iter()
        .chain(head)
        .chain(tokens)
        .collect();
    fields.join(FIELD_SEPARATOR)
}

fn present_mask<R: Rng + ?Sized>(rng: &mut R, n: usize, prob_missing: f64) -> Vec<bool> {
    let p = prob_missing.clamp(0.0, 1.0);
    (0..n).map(|_| !rng.gen_bool(p)).collect()
}

// ── Continuous ──────────────────────────────────────────────────────────

/// Real-valued feature with its own randomized input format.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousFeature {
    name: Option<String>,
    marker: MissingMarker,
    values: Vec<Option<f64>>,
    format: CFloatFormat,
}

impl ContinuousFeature {
    #[must_use]
    pub fn new(values: Vec<Option<f64>>, format: CFloatFormat, marker: MissingMarker) -> Self {
        Self {
            name: None,
            marker,
            values,
            format,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// `n` values uniform in `[-bound, bound)`, each missing with
    /// probability `prob_missing`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, n: usize, bound: f64, prob_missing: f64) -> Self {
        let format = CFloatFormat::random(rng);
        let marker = MissingMarker::random(rng);
        let mask = present_mask(rng, n, prob_missing);
        let bound = bound.abs();
        let values = mask
            .into_iter()
            .map(|present| {
                if present && bound > 0.0 {
                    Some(rng.gen_range(-bound..bound))
                } else if present {
                    Some(0.0)
                } else {
                    None
                }
            })
            .collect();
        Self::new(values, format, marker)
    }

    #[must_use]
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    #[must_use]
    pub fn format(&self) -> CFloatFormat {
        self.format
    }

    #[must_use]
    pub fn marker(&self) -> MissingMarker {
        self.marker
    }

    /// Values as the parser holds them after reading the input rendering
    /// with single-precision `strtof`.
    #[must_use]
    pub fn parser_values(&self) -> Vec<Option<f32>> {
        self.values
            .iter()
            .map(|v| v.map(|v| parse_single(&self.format.render(v), v)))
            .collect()
    }

    fn metadata(&self) -> Metadata {
        let missing = count_missing(&self.values);
        Metadata {
            class_tag: class_tag(missing, self.values.len(), ClassTag::Float),
            degenerate: is_degenerate(
                self.parser_values()
                    .into_iter()
                    .map(|v| v.map(f32::to_bits)),
            ),
            cardinality: 0,
            missing,
        }
    }

    fn render_input(&self) -> String {
        let tokens = self.values.iter().map(|v| match v {
            Some(v) => self.format.render(*v),
            None => self.marker.token().to_owned(),
        });
        join_line(self.name.as_deref(), None, tokens)
    }

    fn render_expected(&self, canonical: &CFloatFormat) -> String {
        let tokens = self.parser_values().into_iter().map(|v| match v {
            Some(v) => canonical.render(f64::from(v)),
            None => OUTPUT_MISSING_TOKEN.to_owned(),
        });
        join_line(
            self.name.as_deref(),
            Some(self.metadata().to_string()),
            tokens,
        )
    }
}

/// Parse a rendered token the way `strtof` does.
#[allow(clippy::cast_possible_truncation)]
fn parse_single(token: &str, fallback: f64) -> f32 {
    token.parse::<f32>().unwrap_or(fallback as f32)
}

// ── Categorical ─────────────────────────────────────────────────────────

/// Label-mapped feature whose codes follow first-sight order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalFeature {
    name: Option<String>,
    marker: MissingMarker,
    codes: Vec<Option<u32>>,
    labels: Vec<String>,
    cardinality: usize,
}

impl CategoricalFeature {
    /// Build from explicit codes and labels (`labels[code]` is the input
    /// token for `code`).
    ///
    /// # Errors
    ///
    /// Returns `OracleError::InvalidSpec` if a code has no label, labels are
    /// not distinct, or a label would read as a missing value.
    pub fn new(codes: Vec<Option<u32>>, labels: Vec<String>, marker: MissingMarker) -> Result<Self> {
        if let Some(code) = codes
            .iter()
            .flatten()
            .find(|&&c| usize::try_from(c).map_or(true, |c| c >= labels.len()))
        {
            return Err(OracleError::spec(format!(
                "code {code} has no label ({} labels)",
                labels.len()
            )));
        }
        let unique: HashSet<&str> = labels.iter().map(String::as_str).collect();
        if unique.len() != labels.len() {
            return Err(OracleError::spec("category labels must be distinct"));
        }
        if labels
            .iter()
            .any(|l| l.is_empty() || l == OUTPUT_MISSING_TOKEN)
        {
            return Err(OracleError::spec(
                "category label would be read as a missing value",
            ));
        }
        let cardinality = codes.iter().flatten().collect::<HashSet<_>>().len();
        Ok(Self {
            name: None,
            marker,
            codes,
            labels,
            cardinality,
        })
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// `n` cells, each missing with probability `prob_missing`, the rest
    /// first-sight ordered codes below `k`. Only realized codes get labels.
    pub fn random<R: Rng + ?Sized>(
        rng: &mut R,
        n: usize,
        k: u32,
        prob_missing: f64,
        label_len: usize,
    ) -> Self {
        let marker = MissingMarker::random(rng);
        let mask = present_mask(rng, n, prob_missing);
        let present = mask.iter().filter(|p| **p).count();
        // k is clamped to 1, so code generation cannot fail.
        let mut drawn = random_ordered_codes(rng, present, k.max(1))
            .unwrap_or_default()
            .into_iter();
        let codes: Vec<Option<u32>> = mask
            .into_iter()
            .map(|p| if p { drawn.next() } else { None })
            .collect();
        let cardinality = codes.iter().flatten().collect::<HashSet<_>>().len();
        let labels = distinct_labels(rng, cardinality, label_len, OUTPUT_MISSING_TOKEN);
        Self {
            name: None,
            marker,
            codes,
            labels,
            cardinality,
        }
    }

    #[must_use]
    pub fn codes(&self) -> &[Option<u32>] {
        &self.codes
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn marker(&self) -> MissingMarker {
        self.marker
    }

    /// Distinct non-missing codes actually present.
    #[must_use]
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    fn metadata(&self) -> Metadata {
        let missing = count_missing(&self.codes);
        Metadata {
            class_tag: class_tag(missing, self.codes.len(), ClassTag::Integral),
            degenerate: is_degenerate(self.codes.iter().copied()),
            cardinality: self.cardinality,
            missing,
        }
    }

    fn label(&self, code: u32) -> &str {
        usize::try_from(code)
            .ok()
            .and_then(|c| self.labels.get(c))
            .map_or(OUTPUT_MISSING_TOKEN, String::as_str)
    }

    fn render_input(&self) -> String {
        let tokens = self.codes.iter().map(|c| match c {
            Some(c) => self.label(*c).to_owned(),
            None => self.marker.token().to_owned(),
        });
        join_line(self.name.as_deref(), None, tokens)
    }

    fn render_expected(&self) -> String {
        let tokens = self.codes.iter().map(|c| match c {
            Some(c) => c.to_string(),
            None => OUTPUT_MISSING_TOKEN.to_owned(),
        });
        join_line(
            self.name.as_deref(),
            Some(self.metadata().to_string()),
            tokens,
        )
    }
}

// ── Feature ─────────────────────────────────────────────────────────────

/// One row of a test matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Continuous(ContinuousFeature),
    Categorical(CategoricalFeature),
}

impl Feature {
    /// Random continuous or categorical feature of length `n`.
    pub fn random<R: Rng + ?Sized>(
        rng: &mut R,
        n: usize,
        name: Option<String>,
        options: &FeatureOptions,
    ) -> Self {
        let feature = if random_choice(rng) {
            Self::Continuous(ContinuousFeature::random(
                rng,
                n,
                options.value_bound,
                options.prob_missing,
            ))
        } else {
            let k = rng.gen_range(1..=options.max_categories.max(1));
            Self::Categorical(CategoricalFeature::random(
                rng,
                n,
                k,
                options.prob_missing,
                options.label_len,
            ))
        };
        match name {
            Some(name) => feature.with_name(name),
            None => feature,
        }
    }

    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        match self {
            Self::Continuous(f) => Self::Continuous(f.with_name(name)),
            Self::Categorical(f) => Self::Categorical(f.with_name(name)),
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Continuous(f) => f.name.as_deref(),
            Self::Categorical(f) => f.name.as_deref(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Continuous(f) => f.values.len(),
            Self::Categorical(f) => f.codes.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_continuous(&self) -> bool {
        matches!(self, Self::Continuous(_))
    }

    #[must_use]
    pub fn metadata(&self) -> Metadata {
        match self {
            Self::Continuous(f) => f.metadata(),
            Self::Categorical(f) => f.metadata(),
        }
    }

    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.metadata().missing
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.metadata().degenerate
    }

    /// Parser-facing line (no trailing newline).
    #[must_use]
    pub fn render_input(&self) -> String {
        match self {
            Self::Continuous(f) => f.render_input(),
            Self::Categorical(f) => f.render_input(),
        }
    }

    /// Oracle line (no trailing newline). Categorical features ignore the
    /// float format.
    #[must_use]
    pub fn render_expected(&self, canonical: &CFloatFormat) -> String {
        match self {
            Self::Continuous(f) => f.render_expected(canonical),
            Self::Categorical(f) => f.render_expected(),
        }
    }
}
