//! Synthetic tabular data with independently computed expected parses.
//!
//! The generator produces features and matrices in two renderings: the
//! randomized text a type-inferring parser consumes, and the canonical text
//! a conforming parser must echo back. Nothing here looks at the parser's
//! internals; the expected rendering is re-derived from the generated values.

pub mod cformat;
pub mod feature;
pub mod matrix;
pub mod random;
pub mod seed;
pub mod spec;

pub use cformat::{CFloatFormat, DEFAULT_CANONICAL_FORMAT, Notation};
pub use feature::{
    CategoricalFeature, ClassTag, ContinuousFeature, Feature, FeatureOptions, Metadata,
    MissingMarker, OUTPUT_MISSING_TOKEN,
};
pub use matrix::RandomMatrix;
pub use seed::{DEFAULT_SEED, derive_iteration_seed, rng_from_seed};
pub use spec::{
    CoreValue, FeatureCase, FeatureSpec, Representation, ResolvedSpec, StatClass, feature_string,
    generate_case, random_data,
};
