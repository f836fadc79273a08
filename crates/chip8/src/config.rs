use crate::{clock::DEFAULT_STEPS_PER_SECOND, processor::Quirks};

/// Settings a [`Chip8`](crate::Chip8) is created with.
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Instructions executed per second of elapsed time, clamped to `1..=1000`.
    pub steps_per_second: u32,
    pub quirks: Quirks,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            steps_per_second: DEFAULT_STEPS_PER_SECOND,
            quirks: Quirks::default(),
        }
    }
}
