//! Matrix assembler: many features of one length, optional header and
//! row labels, rendered for the parser and for the oracle.

use rand::Rng;

use tabcheck_error::{OracleError, Result};

use crate::cformat::CFloatFormat;
use crate::feature::{FIELD_SEPARATOR, Feature, FeatureOptions};
use crate::random::{Alphabet, random_choice, random_string};

/// Placeholder written in the header's first field when row labels exist.
pub const HEADER_PLACEHOLDER: &str = "X";

/// Suffix that visually separates header names from a categorical first row.
const HEADER_SUFFIX: char = 'H';

/// A generated test matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomMatrix {
    features: Vec<Feature>,
    column_names: Option<Vec<String>>,
    has_row_labels: bool,
    /// First header field when both header and row labels are present.
    placeholder: String,
}

impl RandomMatrix {
    /// Random `rows` × `cols` matrix with default feature options.
    pub fn build<R: Rng + ?Sized>(rng: &mut R, rows: usize, cols: usize) -> Self {
        Self::build_with(rng, rows, cols, &FeatureOptions::default())
    }

    /// Random matrix. Header and row-label presence are decided once for the
    /// whole matrix; every row is an independent continuous or categorical
    /// feature of length `cols`.
    pub fn build_with<R: Rng + ?Sized>(
        rng: &mut R,
        rows: usize,
        cols: usize,
        options: &FeatureOptions,
    ) -> Self {
        let has_row_labels = random_choice(rng);
        let column_names = random_choice(rng).then(|| {
            (0..cols)
                .map(|_| {
                    let mut name = random_string(rng, Alphabet::Alpha, options.label_len);
                    name.push(HEADER_SUFFIX);
                    name
                })
                .collect()
        });
        let placeholder = if random_choice(rng) {
            HEADER_PLACEHOLDER.to_owned()
        } else {
            String::new()
        };
        let features = (0..rows)
            .map(|_| {
                let name = has_row_labels
                    .then(|| random_string(rng, Alphabet::Alpha, options.label_len));
                Feature::random(rng, cols, name, options)
            })
            .collect();
        Self {
            features,
            column_names,
            has_row_labels,
            placeholder,
        }
    }

    /// Assemble a matrix from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::InvalidSpec` if feature lengths differ, the header
    /// width differs from the feature length, or row-label presence is not
    /// uniform.
    pub fn from_parts(features: Vec<Feature>, column_names: Option<Vec<String>>) -> Result<Self> {
        let cols = features
            .first()
            .map_or_else(|| column_names.as_ref().map_or(0, Vec::len), Feature::len);
        if let Some(bad) = features.iter().position(|f| f.len() != cols) {
            return Err(OracleError::spec(format!(
                "feature {bad} has length {}, expected {cols}",
                features[bad].len()
            )));
        }
        if let Some(names) = &column_names {
            if names.len() != cols {
                return Err(OracleError::spec(format!(
                    "header has {} names for {cols} columns",
                    names.len()
                )));
            }
        }
        let labeled = features.iter().filter(|f| f.name().is_some()).count();
        if labeled != 0 && labeled != features.len() {
            return Err(OracleError::spec(
                "either every feature or no feature carries a row label",
            ));
        }
        Ok(Self {
            has_row_labels: labeled != 0,
            features,
            column_names,
            placeholder: HEADER_PLACEHOLDER.to_owned(),
        })
    }

    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.features
            .first()
            .map_or_else(|| self.column_names.as_ref().map_or(0, Vec::len), Feature::len)
    }

    #[must_use]
    pub fn has_header(&self) -> bool {
        self.column_names.is_some()
    }

    #[must_use]
    pub fn has_row_labels(&self) -> bool {
        self.has_row_labels
    }

    #[must_use]
    pub fn column_names(&self) -> Option<&[String]> {
        self.column_names.as_deref()
    }

    /// Parser input: optional header line, then one line per feature.
    #[must_use]
    pub fn render_input(&self) -> String {
        let mut out = String::new();
        if let Some(names) = &self.column_names {
            if self.has_row_labels {
                out.push_str(&self.placeholder);
                out.push_str(FIELD_SEPARATOR);
            }
            out.push_str(&names.join(FIELD_SEPARATOR));
            out.push('\n');
        }
        for feature in &self.features {
            out.push_str(&feature.render_input());
            out.push('\n');
        }
        out
    }

    /// Oracle output: one canonical line per feature. The header is never
    /// echoed by the program under test.
    #[must_use]
    pub fn render_expected(&self, canonical: &CFloatFormat) -> String {
        let mut out = String::new();
        for feature in &self.features {
            out.push_str(&feature.render_expected(canonical));
            out.push('\n');
        }
        out
    }
}
