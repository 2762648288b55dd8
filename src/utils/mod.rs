pub mod stats;

pub use stats::{mean, median, percentile, population_std, round2, round4, sample_std};
