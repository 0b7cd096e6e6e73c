//! Utilities shared by the update and integration modules.
//!
//! - [`fs`] - atomic writes and permission helpers
//! - [`lock`] - the cross-process install lock
//! - [`progress`] - terminal progress bars

pub mod fs;
pub mod lock;
pub mod progress;

pub use fs::{atomic_write, ensure_dir};
pub use lock::InstallLock;
pub use progress::{ProgressBar, ProgressStyle};
