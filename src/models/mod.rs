pub mod control;
pub mod download;
pub mod job;

pub use control::{ControlPattern, FoundControl, DOWNLOAD_CONTROL_PATTERNS};
pub use download::DownloadRecord;
pub use job::{Job, JobCounts, JobId, JobStatus};
