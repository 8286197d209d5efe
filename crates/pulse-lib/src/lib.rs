pub mod animation;
pub mod buffer;
pub mod detectors;
pub mod io;
pub mod metrics;
pub mod plot;
pub mod signal;

pub use animation::{heart_pose, HeartPart, HeartPose, PartCommand, RenderSurface};
pub use buffer::{SampleBuffer, BUFFER_CAPACITY};
pub use detectors::*;
pub use metrics::*;
pub use signal::*;
