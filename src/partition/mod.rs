//! Partition routing module
//!
//! Supports: single (default), static list, parent stream
//!
//! # Overview
//!
//! Partitions split a stream into sequential sub-queries. A parent router
//! reads its parent stream lazily and turns every usable parent record into a
//! child partition carrying a `parent_slice` back-reference, so chains of
//! parents compose to any depth.

mod routers;
mod types;

pub use routers::{ListRouter, ParentRouter, SinglePartition};
pub use types::{
    ParentSource, Partition, PartitionConfig, PartitionRouter, DEFAULT_PARTITION_ID,
    PARENT_SLICE_KEY,
};
