//! Property tests over the generator: spec-driven lines and whole matrices.
//!
//! Checks only what is observable from the rendered text, the same view a
//! program under test gets.

use std::collections::HashSet;

use proptest::prelude::*;

use tabcheck_gen::{
    CFloatFormat, CoreValue, FeatureSpec, RandomMatrix, Representation, StatClass,
    derive_iteration_seed, generate_case, rng_from_seed,
};

// ── Strategies ───────────────────────────────────────────────────────────

fn any_class() -> impl Strategy<Value = StatClass> {
    prop_oneof![
        Just(StatClass::Bool),
        Just(StatClass::Cat),
        Just(StatClass::Cont),
    ]
}

fn is_first_sight<I: IntoIterator<Item = u32>>(codes: I) -> bool {
    let mut next = 0_u32;
    for code in codes {
        if code > next {
            return false;
        }
        if code == next {
            next += 1;
        }
    }
    true
}

// ── 1. Spec-driven feature lines ─────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_feature_line_shape(seed in any::<u64>(), class in any_class(), length in 0_usize..60) {
        let mut rng = rng_from_seed(seed);
        let case = generate_case(&mut rng, &FeatureSpec::new().class(class).length(length))
            .expect("unpinned representation always resolves");

        prop_assert!(case.line.ends_with('\n'));
        prop_assert_eq!(case.data.len(), length);

        let body = case.line.trim_end_matches('\n');
        let mut fields: Vec<&str> = body.split('\t').collect();
        if case.spec.labeled {
            let head = fields.remove(0);
            prop_assert!(!head.is_empty());
            if case.spec.prefixed {
                prop_assert!(head.starts_with(class.prefix()), "head={}", head);
            }
        } else if length == 0 {
            fields.clear();
        }
        prop_assert_eq!(fields.len(), length);

        let missing_tokens = fields.iter().filter(|t| case.spec.na.iter().any(|na| na == *t)).count();
        prop_assert_eq!(missing_tokens, case.spec.missing);
    }

    #[test]
    fn prop_codes_are_first_sight(seed in any::<u64>(), card in 1_u32..32, length in 0_usize..80) {
        let mut rng = rng_from_seed(seed);
        let spec = FeatureSpec::new()
            .class(StatClass::Cat)
            .rep(Representation::Str)
            .card(card)
            .length(length);
        let case = generate_case(&mut rng, &spec).expect("pinned categorical spec is valid");
        let codes: Vec<u32> = case
            .data
            .iter()
            .flatten()
            .map(|v| match v {
                CoreValue::Code(c) => *c,
                other => panic!("categorical spec produced {other:?}"),
            })
            .collect();
        prop_assert!(codes.iter().all(|c| *c < card));
        prop_assert!(is_first_sight(codes.iter().copied()));

        // Equal codes share a label and distinct codes get distinct labels.
        let body = case.line.trim_end_matches('\n');
        let mut fields: Vec<&str> = body.split('\t').collect();
        if case.spec.labeled {
            fields.remove(0);
        }
        let mut seen: Vec<Option<&str>> = vec![None; card as usize];
        for (value, token) in case.data.iter().zip(&fields) {
            if let Some(CoreValue::Code(c)) = value {
                let slot = &mut seen[*c as usize];
                prop_assert!(slot.is_none_or(|prev| prev == *token));
                *slot = Some(*token);
            }
        }
        let labels: HashSet<&str> = seen.iter().flatten().copied().collect();
        prop_assert_eq!(labels.len(), seen.iter().flatten().count());
    }
}

// ── 2. Matrices ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_expected_matches_input(seed in any::<u64>(), rows in 1_usize..6, cols in 1_usize..40) {
        let matrix = RandomMatrix::build(&mut rng_from_seed(seed), rows, cols);
        let input = matrix.render_input();
        let expected = matrix.render_expected(&CFloatFormat::canonical());

        let skip = usize::from(matrix.has_header());
        let label_cols = usize::from(matrix.has_row_labels());
        for (in_line, out_line) in input.lines().skip(skip).zip(expected.lines()) {
            let in_fields: Vec<&str> = in_line.split('\t').skip(label_cols).collect();
            let out_fields: Vec<&str> = out_line.split('\t').skip(label_cols).collect();
            prop_assert_eq!(in_fields.len() + 1, out_fields.len());

            let meta: Vec<&str> = out_fields[0].split(':').collect();
            prop_assert_eq!(meta.len(), 4);
            let values = &out_fields[1..];
            let missing = values.iter().filter(|v| **v == "NA").count();
            prop_assert_eq!(meta[3].parse::<usize>().unwrap(), missing);
            for (i, o) in in_fields.iter().zip(values) {
                prop_assert_eq!(i.is_empty() || *i == "NA", *o == "NA");
            }

            if meta[0] == "I" {
                let codes: Vec<u32> = values.iter().filter_map(|v| v.parse().ok()).collect();
                prop_assert!(is_first_sight(codes.iter().copied()));
                let distinct: HashSet<u32> = codes.into_iter().collect();
                prop_assert_eq!(meta[2].parse::<usize>().unwrap(), distinct.len());
            }
        }
    }
}

// ── 3. Reproducibility ───────────────────────────────────────────────────

#[test]
fn iteration_seed_replays_matrix() {
    let base = 0xABCD_EF01;
    for iteration in 0..20 {
        let seed = derive_iteration_seed(base, iteration);
        let a = RandomMatrix::build(&mut rng_from_seed(seed), 4, 25);
        let b = RandomMatrix::build(&mut rng_from_seed(seed), 4, 25);
        assert_eq!(a, b, "iteration {iteration} did not replay");
    }
}

#[test]
fn distinct_iterations_differ() {
    let base = 17;
    let renders: HashSet<String> = (0..10)
        .map(|i| {
            RandomMatrix::build(&mut rng_from_seed(derive_iteration_seed(base, i)), 3, 30)
                .render_input()
        })
        .collect();
    assert_eq!(renders.len(), 10);
}

// ── 4. Boundary scenarios ────────────────────────────────────────────────

#[test]
fn zero_length_unlabeled_feature_is_bare_newline() {
    let mut rng = rng_from_seed(1);
    let case = generate_case(
        &mut rng,
        &FeatureSpec::new().class(StatClass::Cont).length(0).labeled(false),
    )
    .unwrap();
    assert_eq!(case.line, "\n");
}

#[test]
fn all_missing_categorical_needs_no_cardinality() {
    let mut rng = rng_from_seed(2);
    let case = generate_case(
        &mut rng,
        &FeatureSpec::new()
            .class(StatClass::Cat)
            .rep(Representation::Int)
            .length(6)
            .missing(6)
            .labeled(false)
            .na(["NA"]),
    )
    .unwrap();
    assert_eq!(case.line, "NA\tNA\tNA\tNA\tNA\tNA\n");
}

#[test]
fn pinned_invalid_representation_is_rejected() {
    let mut rng = rng_from_seed(3);
    let err = generate_case(
        &mut rng,
        &FeatureSpec::new().class(StatClass::Cont).rep(Representation::Str),
    )
    .unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn single_row_single_column_matrix() {
    let matrix = RandomMatrix::build(&mut rng_from_seed(4), 1, 1);
    let expected = matrix.render_expected(&CFloatFormat::canonical());
    assert_eq!(expected.lines().count(), 1);
    // One value can never vary.
    assert!(matrix.features()[0].is_degenerate());
}
