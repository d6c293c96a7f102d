//! Concurrent bulk-deletion engine for the object storage broker.
//!
//! Before a bucket can be physically removed, every object (or, with
//! versioning, every version of every object) has to go. [`BucketWipe`]
//! drives a paginated listing against an [`ObjectClient`] while deleting
//! with bounded concurrency, aggregating per-object failures instead of
//! aborting, and staying stoppable at any point.

pub mod client;
pub mod engine;

pub use client::{
    ClientError, ClientResult, ObjectClient, ObjectListing, VersionEntry, VersionListing,
};
pub use engine::{BucketWipe, WipeConfig};
