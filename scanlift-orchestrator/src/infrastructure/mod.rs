pub mod clock;
pub mod snapshot_writer;
pub mod timing;

pub use clock::{ManualClock, SystemClock};
pub use snapshot_writer::{SNAPSHOT_FILE, SnapshotError, SnapshotWriter};
pub use timing::{SessionTiming, TimingCollector, TimingSummary};
