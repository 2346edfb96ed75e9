//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TargetStatus`: the per-target fetch status stored in the record store
//! - `ErrorKind`: the stable taxonomy of fetch failures

mod error_kind;
mod target_status;

// Re-export main types
pub use error_kind::ErrorKind;
pub use target_status::TargetStatus;
