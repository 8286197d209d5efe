pub mod rate;

pub use rate::{beat_bpm, smooth_bpm, RateConfig, RateEstimator, RateEvent};
