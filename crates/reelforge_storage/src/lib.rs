//! Disk-backed scratch space for Reelforge.
//!
//! Nothing here outlives a request. Uploaded attachments are written as
//! [`TransientFile`]s that delete themselves when dropped, and every merge runs
//! in its own scratch directory that is removed on every exit path.
//!
//! # Layout
//!
//! ```text
//! {data_dir}/
//! ├── uploads/   transient attachment copies, {prefix}-{uuid}.{ext}
//! └── merge/     one merge-XXXX/ directory per in-flight merge
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod merge;
mod transient;

pub use merge::{MergePipeline, concat_manifest};
pub use transient::{TransientFile, TransientFileStore};
