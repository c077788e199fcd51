//! Seed derivation for reproducible runs.

use rand::SeedableRng;
use rand::rngs::StdRng;

/// Default base seed when neither the CLI nor the environment supplies one.
pub const DEFAULT_SEED: u64 = 0x7AB1_E5EE_D0C0_FFEE;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;
const MIX_CONST1: u64 = 0xBF58_476D_1CE4_E5B9;
const MIX_CONST2: u64 = 0x94D0_49BB_1331_11EB;

fn splitmix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(MIX_CONST1);
    z = (z ^ (z >> 27)).wrapping_mul(MIX_CONST2);
    z ^ (z >> 31)
}

/// Seed for iteration `index` of a run started from `base`.
///
/// Pure: a failing iteration can be regenerated from its reported seed alone.
#[must_use]
pub fn derive_iteration_seed(base: u64, index: u64) -> u64 {
    splitmix64(base.wrapping_add(index.wrapping_add(1).wrapping_mul(GOLDEN_GAMMA)))
}

/// Seeded generator used by every tabcheck component.
#[must_use]
pub fn rng_from_seed(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
