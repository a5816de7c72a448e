//! Service layer for texsync
//!
//! Transport, workspaces and reconciliation sit below the controller,
//! which orchestrates them into the push and pull pipelines.

pub mod arbiter;
pub mod bridge;
pub mod change_detector;
pub mod controller;
pub mod host;
pub mod identity;
pub mod reconcile;
pub mod snapshot;
pub mod transport;
pub mod workspace;

pub use arbiter::ConfirmPrompt;
pub use bridge::ReviewBridge;
pub use controller::{SyncController, SyncOptions};
pub use host::EditorHost;
pub use identity::{IdentityResolver, Platform};
pub use snapshot::SnapshotFetcher;
