pub mod download_store;
pub mod janitor;
pub mod job_registry;

pub use download_store::{remove_dir_if_empty, remove_download_files, DownloadStore, Lookup};
pub use janitor::Janitor;
pub use job_registry::{Admission, JobRegistry};
