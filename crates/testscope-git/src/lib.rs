//! Changed-file discovery for Testscope using libgit2: staged, unstaged, and
//! revision-range diffs, with optional untracked files.

pub mod changes;
pub mod errors;

pub use changes::ChangeDetector;
pub use errors::{ChangeDetectionError, Result};
