//! `vsxreport-recon`: Cross-registry reconciliation of VS Code Marketplace
//! and Open VSX extension metadata.
//!
//! Pure engine crate: receives pre-loaded snapshots, returns joined and
//! derived rows. File access is limited to the JSON snapshot store and the
//! report writers; no network IO.

pub mod allow_list;
pub mod config;
pub mod derived;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod identity;
pub mod index;
pub mod license;
pub mod loader;
pub mod matcher;
pub mod model;
pub mod report;

pub use allow_list::AutoPublishSet;
pub use config::{ReconConfig, RetryPolicy};
pub use engine::{run, Reconciler};
pub use error::ReconError;
pub use index::{build_indexes, NamespaceIndex, NamespaceLookup};
pub use license::{LicenseEntry, LicenseMap};
pub use loader::{JsonSnapshotStore, SnapshotSource};
pub use model::{PrimaryRecord, ReconInput, ReconResult, ReconciledRow, SecondaryRecord};
