pub mod ecg;
pub mod phase;

pub use ecg::{detect_segments, Segment, SegmentConfig, SegmentDetector, Segments};
pub use phase::{classify_phase, CardiacPhase, PhaseChange, PhaseTracker};
