//! # Application deployment store
//!
//! A content-addressed object repository plus an on-disk hierarchy of
//! checked-out application and runtime trees, identified by four-part refs
//! (`<kind>/<name>/<arch>/<branch>`). Provides deploy/undeploy, active-version
//! selection, launcher rewriting for sandboxed execution, export aggregation,
//! garbage collection, override merging, and metadata-only remote fetches.

#![deny(missing_docs)]
#![deny(missing_debug_implementations)]

pub mod cancel;
pub mod error;
mod exports;
mod fetch;
mod gv;
mod keyfileext;
mod launcher;
pub mod logging;
mod metadata_fetch;
mod overrides;
mod path;
pub mod refs;
pub mod repo;
mod removed;
pub mod store;
mod task;
mod triggers;

pub use cancel::Cancellable;
pub use error::{Result, StoreError};
pub use fetch::build_client;
pub use metadata_fetch::fetch_metadata;
pub use overrides::{load_merged_override, override_path};
pub use refs::{Kind, Ref};
pub use repo::{ObjectRepo, OstreeRepo};
pub use store::{Deployment, Scope, Store};
