//! Condition waits for Cairn cluster lifecycle operations
//!
//! Cluster operations (install, backup, restore, uninstall) are carried out
//! by remote node agents; callers only see their progress through the
//! cluster API. This crate polls that API until a condition holds, telling
//! transient server faults apart from terminal ones and reporting the last
//! observed state when time runs out.
//!
//! - [`engine`]: the generic polling loop ([`Waiter::wait_for`])
//! - [`conditions`]: cluster and backup predicates plus [`ClusterWaits`]
//! - [`source`]: the [`ClusterSource`] seam and its kube-rs implementation
//! - [`error`]: wait outcomes ([`WaitError`], [`TimeoutError`])

#![deny(missing_docs)]

pub mod conditions;
pub mod engine;
pub mod error;
pub mod source;

pub use conditions::ClusterWaits;
pub use engine::{
    fetch_fn, Completed, Condition, Fetch, FetchErrorAction, FnFetch, NotFound, Snapshot,
    Verdict, WaitRequest, Waiter,
};
pub use error::{ConditionError, TimeoutError, WaitError};
pub use source::{ClusterSource, KubeClusterSource};
