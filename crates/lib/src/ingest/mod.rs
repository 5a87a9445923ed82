//! # Discovery
//!
//! The source plugin contract and the loop that feeds discovered items into
//! the work queue.

pub mod discovery;

pub mod traits;

pub use discovery::{DiscoveryDriver, DiscoveryReport, SeedReport};
pub use traits::{DiscoveredItem, Discoverer};
