//! Seed-reproducible random sampling and shuffling.
//!
//! Shuffling document sets (for sampled evaluation or cross-validation
//! splits) must give identical permutations for identical seeds on every
//! platform. The standard library offers no shuffle, and distribution
//! adapters elsewhere do not pin down how many generator draws they make,
//! so the draw sequence is fixed here explicitly.

/// Uniform integer in `[0, upper_bound)` by rejection sampling.
///
/// Proposals above the largest multiple of `upper_bound` are discarded,
/// removing modulo bias. The generator's 64-bit range vastly exceeds any
/// practical bound, so rejections are rare.
///
/// # Panics
///
/// Panics if `upper_bound` is zero.
pub fn bounded_rand(rng: &mut fastrand::Rng, upper_bound: u64) -> u64 {
    assert_ne!(upper_bound, 0);
    let threshold = u64::MAX - (u64::MAX % upper_bound + 1) % upper_bound;
    loop {
        let proposal = rng.u64(..);
        if proposal <= threshold {
            return proposal % upper_bound;
        }
    }
}

/// Fisher-Yates shuffle driven by [`bounded_rand`], one draw per element
/// from the back of the slice forward.
pub fn shuffle<T>(items: &mut [T], rng: &mut fastrand::Rng) {
    let len = items.len();
    for i in 0..len {
        let j = bounded_rand(rng, (len - i) as u64) as usize;
        items.swap(len - 1 - i, j);
    }
}
