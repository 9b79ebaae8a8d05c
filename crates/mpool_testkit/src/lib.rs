//! # mpool testkit
//!
//! Test utilities for the mpool page cache.
//!
//! This crate provides:
//! - Recording stores and logs that capture I/O order in one event trace
//! - Fault injection for page writes, fsyncs and log flushes
//! - Pool fixtures and cache invariant checks
//! - Property-based test generators using proptest
//! - Concurrent writer/checkpoint stress harnesses
//!
//! ## Usage
//!
//! ```rust
//! use mpool_testkit::prelude::*;
//!
//! let fixture = PoolFixture::with_log(1, 16);
//! let (file, _store) = fixture.open("a.db");
//! fixture.dirty(&file, 0..3);
//!
//! let _ = fixture.pool.sync(None).unwrap();
//! assert_eq!(fixture.events.page_writes().len(), 3);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod recording;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::recording::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use recording::*;
pub use stress::*;
