//! texsync - Git synchronization for web LaTeX editors
//!
//! Bridges browser-based LaTeX editors (Overleaf, TexPage) to ordinary
//! Git hosting: snapshots of the editor content are committed and
//! pushed through CORS-safe proxy routes, and remote changes are
//! diffed against the editor for one-file-at-a-time review.

pub mod error;
pub mod models;
pub mod services;

#[cfg(test)]
mod test_utils;

pub use error::{ErrorResponse, Result, SyncError};
pub use models::{Change, ChangeSet, ChangeStatus, SyncConfig, SyncStatus};
pub use services::{EditorHost, Platform, SyncController, SyncOptions};
