//! Difficulty-retarget parameters (§4.2). V1/V2 have distinct triples;
//! selection is a function of the block's major version (§4.2, §9 open
//! question: unify the override table by height rather than by ad-hoc
//! `if (configured != 0)` switches scattered in the source).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyParams {
    pub window_v1: usize,
    pub cut_v1: usize,
    pub target_seconds_v1: u64,

    pub window_v2: usize,
    pub cut_v2: usize,
    pub target_seconds_v2: u64,
}

impl Default for DifficultyParams {
    fn default() -> Self {
        Self {
            window_v1: 720,
            cut_v1: 60,
            target_seconds_v1: 120,

            window_v2: 720,
            cut_v2: 60,
            target_seconds_v2: 120,
        }
    }
}
