pub mod clock;
pub mod config;
pub mod record;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{read_config, PlaybackConfig};
pub use record::{write_frames_tsv, write_summary, FrameRow, SessionSummary};
pub use session::{FrameOutcome, FrameReport, Session};
