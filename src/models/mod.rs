mod sample;

pub use sample::{ProcessCounts, RawSample, Sample};
